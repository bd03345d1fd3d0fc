//! End-to-end federation flow tests over the in-memory backends.

use federation_engine::{
    AuthError, AuthMode, CallbackParams, MemoryAuthBackend, ProviderIdentity, RedirectInitiator,
    SessionCoordinator, SessionOutcome, SessionState, StaticProvider,
};
use portal_directory::{AdminRole, DirectoryStore, MemoryDirectoryStore};
use portal_storage::{FlowStore, MemoryStore};
use std::sync::Arc;
use url::Url;

struct Harness {
    flow: Arc<FlowStore>,
    directory: Arc<MemoryDirectoryStore>,
    backend: Arc<MemoryAuthBackend>,
    provider: Arc<StaticProvider>,
    coordinator: SessionCoordinator,
    initiator: RedirectInitiator,
}

fn harness() -> Harness {
    let flow = Arc::new(FlowStore::new(Box::new(MemoryStore::new())));
    let directory = Arc::new(MemoryDirectoryStore::new());
    let backend = Arc::new(MemoryAuthBackend::new());
    let provider = Arc::new(StaticProvider::new());

    let coordinator = SessionCoordinator::new(
        flow.clone(),
        directory.clone(),
        backend.clone(),
        provider.clone(),
    );
    let initiator = RedirectInitiator::new(
        flow.clone(),
        Url::parse("https://provider.test/oauth2/authorize").unwrap(),
        "portalClient",
        "http://localhost:8617/callback",
    );

    Harness {
        flow,
        directory,
        backend,
        provider,
        coordinator,
        initiator,
    }
}

fn jdoe() -> ProviderIdentity {
    ProviderIdentity {
        username: "jdoe".to_string(),
        email: Some("jdoe@acme.gov".to_string()),
        org_id: Some("org_1".to_string()),
        org_name: Some("Acme County".to_string()),
        full_name: Some("Jane Doe".to_string()),
    }
}

/// Run the redirect and return the state token the provider would echo back.
fn begin(harness: &Harness, mode: AuthMode) -> String {
    let url = harness.initiator.begin(mode, None).unwrap();
    url.query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

fn callback(code: &str, state: &str) -> CallbackParams {
    CallbackParams::from_query(&format!("code={}&state={}", code, state))
}

#[tokio::test]
async fn scenario_a_first_signup_provisions_tenant() {
    let h = harness();
    h.provider.insert("code-1", jdoe());

    let state = begin(&h, AuthMode::SignUp);
    let outcome = h
        .coordinator
        .complete_callback(&callback("code-1", &state))
        .await
        .unwrap();

    let SessionOutcome::SignedUp(tenant) = outcome else {
        panic!("expected a signup outcome");
    };
    assert_eq!(tenant.organization_id, "acme-county");

    let org = h
        .directory
        .get_organization("acme-county")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(org.name, "Acme County");
    assert_eq!(org.provider_org_id.as_deref(), Some("org_1"));

    let admin = h
        .directory
        .get_admin_record(&tenant.principal.uid)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(admin.role, AdminRole::OrgAdmin);
    assert_eq!(admin.organization_id.as_deref(), Some("acme-county"));
    assert!(!admin.disabled);

    assert_eq!(h.directory.user_profile_count(), 1);

    // Signal flags: in-flight cleared, welcome consumed exactly once
    assert!(!h.flow.signup_in_flight().unwrap());
    assert!(h.coordinator.take_first_run_welcome().unwrap());
    assert!(!h.coordinator.take_first_run_welcome().unwrap());

    // The freshly-created principal resolves to org admin
    let session = h.coordinator.resolve_session().await.unwrap();
    assert_eq!(session.label(), "org_admin");
}

#[tokio::test]
async fn scenario_b_repeat_sign_in_reuses_credential() {
    let h = harness();
    h.provider.insert("code-1", jdoe());
    h.provider.insert("code-2", jdoe());

    let state = begin(&h, AuthMode::SignUp);
    let outcome = h
        .coordinator
        .complete_callback(&callback("code-1", &state))
        .await
        .unwrap();
    let SessionOutcome::SignedUp(tenant) = outcome else {
        panic!("expected a signup outcome");
    };

    // Later visit: same identity, sign-in branch
    let state = begin(&h, AuthMode::SignIn);
    let outcome = h
        .coordinator
        .complete_callback(&callback("code-2", &state))
        .await
        .unwrap();

    let SessionOutcome::SignedIn(principal) = outcome else {
        panic!("expected a sign-in outcome");
    };
    // Same derivation, same credential, same principal. No second
    // admin record was created.
    assert_eq!(principal.uid, tenant.principal.uid);
    assert_eq!(h.backend.credential_count(), 1);
    assert_eq!(h.directory.admin_record_count(), 1);
}

#[tokio::test]
async fn scenario_c_second_identity_same_org_is_rejected() {
    let h = harness();
    h.provider.insert("code-1", jdoe());
    h.provider.insert(
        "code-2",
        ProviderIdentity {
            username: "rroe".to_string(),
            email: Some("rroe@acme.gov".to_string()),
            org_id: Some("org_1".to_string()),
            org_name: Some("Acme County".to_string()),
            full_name: None,
        },
    );

    let state = begin(&h, AuthMode::SignUp);
    h.coordinator
        .complete_callback(&callback("code-1", &state))
        .await
        .unwrap();
    assert_eq!(h.directory.organization_count(), 1);

    let state = begin(&h, AuthMode::SignUp);
    let err = h
        .coordinator
        .complete_callback(&callback("code-2", &state))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::IdentityConflict(_)));
    assert!(err.to_string().contains("sign in"));
    assert_eq!(h.directory.organization_count(), 1);
    assert!(!h.flow.signup_in_flight().unwrap());
}

#[tokio::test]
async fn scenario_d_state_mismatch_aborts_before_any_operation() {
    let h = harness();
    h.provider.insert("code-1", jdoe());

    let _state = begin(&h, AuthMode::SignUp);
    let err = h
        .coordinator
        .complete_callback(&callback("code-1", "forged-state"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::OAuthProtocol(_)));
    // No credential or document operation happened
    assert_eq!(h.backend.credential_count(), 0);
    assert_eq!(h.directory.organization_count(), 0);
    assert_eq!(h.directory.admin_record_count(), 0);
}

#[tokio::test]
async fn personal_account_signup_is_rejected_without_writes() {
    let h = harness();
    h.provider.insert(
        "code-1",
        ProviderIdentity {
            username: "solo".to_string(),
            email: Some("solo@example.com".to_string()),
            org_id: None,
            org_name: None,
            full_name: None,
        },
    );

    let state = begin(&h, AuthMode::SignUp);
    let err = h
        .coordinator
        .complete_callback(&callback("code-1", &state))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::IdentityConflict(_)));
    assert_eq!(h.backend.credential_count(), 0);
    assert_eq!(h.directory.organization_count(), 0);
}

#[tokio::test]
async fn colliding_sanitized_names_get_distinct_slugs() {
    let h = harness();
    h.provider.insert("code-1", jdoe());
    h.provider.insert(
        "code-2",
        ProviderIdentity {
            username: "msmith".to_string(),
            email: Some("msmith@acme.example".to_string()),
            // Different provider org, same display name
            org_id: Some("org_2".to_string()),
            org_name: Some("Acme County".to_string()),
            full_name: None,
        },
    );

    let state = begin(&h, AuthMode::SignUp);
    let first = h
        .coordinator
        .complete_callback(&callback("code-1", &state))
        .await
        .unwrap();
    let SessionOutcome::SignedUp(first) = first else {
        panic!("expected a signup outcome");
    };

    let state = begin(&h, AuthMode::SignUp);
    let second = h
        .coordinator
        .complete_callback(&callback("code-2", &state))
        .await
        .unwrap();
    let SessionOutcome::SignedUp(second) = second else {
        panic!("expected a signup outcome");
    };

    assert_eq!(first.organization_id, "acme-county");
    assert_ne!(second.organization_id, first.organization_id);
    assert!(second.organization_id.starts_with("acme-county-"));
    assert_eq!(h.directory.organization_count(), 2);
}

#[tokio::test]
async fn returning_user_without_record_is_not_auto_provisioned() {
    let h = harness();
    h.provider.insert("code-1", jdoe());

    // The credential exists (say, the admin record was deleted later)
    let state = begin(&h, AuthMode::SignUp);
    h.coordinator
        .complete_callback(&callback("code-1", &state))
        .await
        .unwrap();
    h.coordinator.take_first_run_welcome().unwrap();

    // Simulate admin-access revocation: the record is gone, the principal
    // remains
    let fresh_directory = Arc::new(MemoryDirectoryStore::new());
    let coordinator = SessionCoordinator::new(
        h.flow.clone(),
        fresh_directory,
        h.backend.clone(),
        h.provider.clone(),
    );

    h.provider.insert("code-2", jdoe());
    let state = begin(&h, AuthMode::SignIn);
    let outcome = coordinator
        .complete_callback(&callback("code-2", &state))
        .await
        .unwrap();
    assert!(matches!(outcome, SessionOutcome::SignedIn(_)));

    // Sign-in never provisions; the session lands in access denied
    let session = coordinator.resolve_session().await.unwrap();
    assert_eq!(session.label(), "access_denied");
}

#[tokio::test]
async fn provider_error_callback_fails_without_exchange() {
    let h = harness();

    let _state = begin(&h, AuthMode::SignIn);
    let params = CallbackParams::from_query("error=access_denied&error_description=declined");
    let err = h.coordinator.complete_callback(&params).await.unwrap_err();

    assert!(matches!(err, AuthError::OAuthProtocol(_)));
    assert!(err.to_string().contains("access_denied"));
}

#[tokio::test]
async fn resolve_session_before_any_sign_in_is_unauthenticated() {
    let h = harness();
    let session = h.coordinator.resolve_session().await.unwrap();
    assert!(matches!(session, SessionState::Unauthenticated));
}
