//! Credential bridge: deterministic secret derivation from provider identity.
//!
//! The auth backend only understands email+password, so "login with the
//! geoportal" is retrofitted by deriving a stable password-equivalent secret
//! from provider identity attributes. The derivation must be deterministic:
//! the same secret doubles as the password for every subsequent sign-in.
//! There is no server-side federation table.

use crate::ProviderIdentity;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hkdf::Hkdf;
use sha2::Sha256;

/// Domain-separation label for the bridge derivation.
const BRIDGE_INFO: &[u8] = b"tidewatch/credential-bridge/v1";

/// Derive the bridging secret for a provider account.
///
/// HKDF-SHA256 over the two inputs: `salt_material` as the salt, the
/// provider username as the input keying material, expanded to 32 bytes and
/// base64-encoded. One-way and pure: identical inputs always yield the
/// identical secret.
pub fn derive_secret(provider_username: &str, salt_material: &str) -> String {
    let hk = Hkdf::<Sha256>::new(
        Some(salt_material.as_bytes()),
        provider_username.as_bytes(),
    );
    let mut okm = [0u8; 32];
    hk.expand(BRIDGE_INFO, &mut okm)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    BASE64.encode(okm)
}

/// Email the bridged credential is established under.
///
/// The provider email when present; otherwise a synthetic, provider-scoped
/// address that can never collide with a real mailbox.
pub fn derived_email(identity: &ProviderIdentity) -> String {
    if let Some(email) = &identity.email {
        return email.clone();
    }
    match &identity.org_id {
        Some(org_id) => format!("{}@{}.tidewatch.invalid", identity.username, org_id),
        None => format!("{}@tidewatch.invalid", identity.username),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(email: Option<&str>, org_id: Option<&str>) -> ProviderIdentity {
        ProviderIdentity {
            username: "jdoe".to_string(),
            email: email.map(String::from),
            org_id: org_id.map(String::from),
            org_name: None,
            full_name: None,
        }
    }

    #[test]
    fn test_derive_secret_is_deterministic() {
        let a = derive_secret("jdoe", "jdoe@acme.gov");
        let b = derive_secret("jdoe", "jdoe@acme.gov");
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_secret_varies_with_inputs() {
        let base = derive_secret("jdoe", "jdoe@acme.gov");
        assert_ne!(base, derive_secret("jdoe", "other@acme.gov"));
        assert_ne!(base, derive_secret("other", "jdoe@acme.gov"));
    }

    #[test]
    fn test_derive_secret_is_not_the_inputs() {
        let secret = derive_secret("jdoe", "jdoe@acme.gov");
        assert!(!secret.contains("jdoe"));
        assert!(!secret.contains("acme"));
        // 32 bytes of OKM base64-encode to 44 characters
        assert_eq!(secret.len(), 44);
    }

    #[test]
    fn test_derived_email_fallback_chain() {
        assert_eq!(
            derived_email(&identity(Some("jdoe@acme.gov"), Some("org_1"))),
            "jdoe@acme.gov"
        );
        assert_eq!(
            derived_email(&identity(None, Some("org_1"))),
            "jdoe@org_1.tidewatch.invalid"
        );
        assert_eq!(derived_email(&identity(None, None)), "jdoe@tidewatch.invalid");
    }
}
