//! Authentication configuration.

/// Configuration for the account core.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// PEM-encoded Ed25519 private key for JWT signing.
    pub jwt_private_key_pem: String,
    /// PEM-encoded Ed25519 public key for JWT verification.
    pub jwt_public_key_pem: String,
    /// JWT issuer (`iss` claim).
    pub jwt_issuer: String,
    /// Access token lifetime in seconds (default: 900 = 15 minutes).
    pub access_token_lifetime_secs: u64,
    /// Refresh token lifetime in seconds (default: 2_592_000 = 30 days).
    pub refresh_token_lifetime_secs: u64,
    /// Email verification token lifetime in seconds (default: 24 hours).
    pub email_verification_lifetime_secs: u64,
    /// Password reset token lifetime in seconds (default: 1 hour).
    pub password_reset_lifetime_secs: u64,
    /// When set, new accounts get no session tokens until the email
    /// address is verified.
    pub require_email_verification: bool,
    /// Public base URL used to build verification, reset and join links.
    pub base_url: String,
    /// Optional pepper prepended to passwords before Argon2id hashing.
    pub pepper: Option<String>,
    /// First-run administrator for the default tenant. Both must be set
    /// for the bootstrap path to be available.
    pub bootstrap_admin_username: Option<String>,
    pub bootstrap_admin_password: Option<String>,
    /// Slug of the tenant the bootstrap administrator may be created in.
    pub default_tenant_slug: String,
    /// Invite lifetime when the creator does not pick one.
    pub default_invite_expiry_days: u32,
}

impl AuthConfig {
    /// Invite lifetime in days, clamped to 1..=30.
    pub fn invite_expiry_days(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_invite_expiry_days)
            .clamp(MIN_INVITE_DAYS, MAX_INVITE_DAYS)
    }

    pub(crate) fn bootstrap_credentials(&self) -> Option<(&str, &str)> {
        match (
            self.bootstrap_admin_username.as_deref(),
            self.bootstrap_admin_password.as_deref(),
        ) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        }
    }
}

const MIN_INVITE_DAYS: u32 = 1;
const MAX_INVITE_DAYS: u32 = 30;

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_private_key_pem: String::new(),
            jwt_public_key_pem: String::new(),
            jwt_issuer: "gatehouse".into(),
            access_token_lifetime_secs: 900,
            refresh_token_lifetime_secs: 2_592_000,
            email_verification_lifetime_secs: 86_400,
            password_reset_lifetime_secs: 3_600,
            require_email_verification: false,
            base_url: "http://localhost:3000".into(),
            pepper: None,
            bootstrap_admin_username: None,
            bootstrap_admin_password: None,
            default_tenant_slug: "default".into(),
            default_invite_expiry_days: 7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invite_expiry_is_clamped() {
        let config = AuthConfig::default();
        assert_eq!(config.invite_expiry_days(None), 7);
        assert_eq!(config.invite_expiry_days(Some(0)), 1);
        assert_eq!(config.invite_expiry_days(Some(90)), 30);
        assert_eq!(config.invite_expiry_days(Some(14)), 14);
    }

    #[test]
    fn bootstrap_needs_both_credentials() {
        let mut config = AuthConfig {
            bootstrap_admin_username: Some("admin".into()),
            ..Default::default()
        };
        assert!(config.bootstrap_credentials().is_none());

        config.bootstrap_admin_password = Some(String::new());
        assert!(config.bootstrap_credentials().is_none());

        config.bootstrap_admin_password = Some("s3cret".into());
        assert_eq!(config.bootstrap_credentials(), Some(("admin", "s3cret")));
    }
}
