//! Storage key constants.

/// Storage keys used by the sign-in flow
pub struct StorageKeys;

impl StorageKeys {
    /// Anti-forgery token persisted before redirecting to the provider
    pub const OAUTH_STATE_TOKEN: &'static str = "oauth_state_token";

    /// Auth mode recorded at redirect time ("signin" or "signup")
    pub const OAUTH_MODE: &'static str = "oauth_mode";

    /// A signup is in flight (provisioning writes may not have landed yet)
    pub const SIGNUP_IN_FLIGHT: &'static str = "signup_in_flight";

    /// A signup just completed (consumed once for the first-run welcome)
    pub const SIGNUP_COMPLETED: &'static str = "signup_completed";

    /// Provider org id stashed for a deep-link signup
    pub const PENDING_PROVIDER_ORG: &'static str = "pending_provider_org";
}
