//! Command-line and environment configuration.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use gatehouse_auth::AuthConfig;
use gatehouse_db::DbConfig;

#[derive(Debug, Parser)]
#[command(name = "gatehouse")]
#[command(about = "Gatehouse multi-tenant account service")]
#[command(version)]
pub struct Cli {
    /// SurrealDB WebSocket address
    #[arg(long, env = "GATEHOUSE_DB_URL", default_value = "127.0.0.1:8000")]
    pub db_url: String,

    #[arg(long, env = "GATEHOUSE_DB_NAMESPACE", default_value = "gatehouse")]
    pub db_namespace: String,

    #[arg(long, env = "GATEHOUSE_DB_DATABASE", default_value = "main")]
    pub db_database: String,

    #[arg(long, env = "GATEHOUSE_DB_USERNAME", default_value = "root")]
    pub db_username: String,

    #[arg(long, env = "GATEHOUSE_DB_PASSWORD", default_value = "root", hide_env_values = true)]
    pub db_password: String,

    /// PEM file holding the Ed25519 signing key
    #[arg(long, env = "GATEHOUSE_JWT_PRIVATE_KEY_FILE")]
    pub jwt_private_key_file: PathBuf,

    /// PEM file holding the Ed25519 verification key
    #[arg(long, env = "GATEHOUSE_JWT_PUBLIC_KEY_FILE")]
    pub jwt_public_key_file: PathBuf,

    #[arg(long, env = "GATEHOUSE_JWT_ISSUER", default_value = "gatehouse")]
    pub jwt_issuer: String,

    #[arg(long, env = "GATEHOUSE_ACCESS_TOKEN_TTL_SECS", default_value_t = 900)]
    pub access_token_ttl_secs: u64,

    #[arg(long, env = "GATEHOUSE_REFRESH_TOKEN_TTL_SECS", default_value_t = 2_592_000)]
    pub refresh_token_ttl_secs: u64,

    #[arg(long, env = "GATEHOUSE_EMAIL_VERIFICATION_TTL_SECS", default_value_t = 86_400)]
    pub email_verification_ttl_secs: u64,

    #[arg(long, env = "GATEHOUSE_PASSWORD_RESET_TTL_SECS", default_value_t = 3_600)]
    pub password_reset_ttl_secs: u64,

    /// Withhold session tokens until the account's email is verified
    #[arg(long, env = "GATEHOUSE_REQUIRE_EMAIL_VERIFICATION")]
    pub require_email_verification: bool,

    /// Public URL used in verification, reset and join links
    #[arg(long, env = "GATEHOUSE_BASE_URL", default_value = "http://localhost:3000")]
    pub base_url: String,

    #[arg(long, env = "GATEHOUSE_PASSWORD_PEPPER", hide_env_values = true)]
    pub pepper: Option<String>,

    /// First-run administrator for the default tenant
    #[arg(long, env = "GATEHOUSE_BOOTSTRAP_ADMIN_USERNAME")]
    pub bootstrap_admin_username: Option<String>,

    #[arg(long, env = "GATEHOUSE_BOOTSTRAP_ADMIN_PASSWORD", hide_env_values = true)]
    pub bootstrap_admin_password: Option<String>,

    #[arg(long, env = "GATEHOUSE_DEFAULT_TENANT_SLUG", default_value = "default")]
    pub default_tenant_slug: String,

    #[arg(long, env = "GATEHOUSE_DEFAULT_TENANT_NAME", default_value = "Default")]
    pub default_tenant_name: String,

    /// Invite lifetime when the creator does not choose one (1-30)
    #[arg(long, env = "GATEHOUSE_INVITE_EXPIRY_DAYS", default_value_t = 7)]
    pub invite_expiry_days: u32,

    /// How often expired sessions are purged
    #[arg(long, env = "GATEHOUSE_SESSION_SWEEP_SECS", default_value_t = 300)]
    pub session_sweep_secs: u64,
}

impl Cli {
    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            url: self.db_url.clone(),
            namespace: self.db_namespace.clone(),
            database: self.db_database.clone(),
            username: self.db_username.clone(),
            password: self.db_password.clone(),
        }
    }

    /// Build the auth configuration, reading the key pair from disk.
    pub async fn auth_config(&self) -> anyhow::Result<AuthConfig> {
        let jwt_private_key_pem = tokio::fs::read_to_string(&self.jwt_private_key_file)
            .await
            .with_context(|| format!("reading {}", self.jwt_private_key_file.display()))?;
        let jwt_public_key_pem = tokio::fs::read_to_string(&self.jwt_public_key_file)
            .await
            .with_context(|| format!("reading {}", self.jwt_public_key_file.display()))?;

        Ok(AuthConfig {
            jwt_private_key_pem,
            jwt_public_key_pem,
            jwt_issuer: self.jwt_issuer.clone(),
            access_token_lifetime_secs: self.access_token_ttl_secs,
            refresh_token_lifetime_secs: self.refresh_token_ttl_secs,
            email_verification_lifetime_secs: self.email_verification_ttl_secs,
            password_reset_lifetime_secs: self.password_reset_ttl_secs,
            require_email_verification: self.require_email_verification,
            base_url: self.base_url.clone(),
            pepper: self.pepper.clone(),
            bootstrap_admin_username: self.bootstrap_admin_username.clone(),
            bootstrap_admin_password: self.bootstrap_admin_password.clone(),
            default_tenant_slug: self.default_tenant_slug.clone(),
            default_invite_expiry_days: self.invite_expiry_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Cli {
        let mut args = vec![
            "gatehouse",
            "--jwt-private-key-file",
            "priv.pem",
            "--jwt-public-key-file",
            "pub.pem",
        ];
        args.extend_from_slice(extra);
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn defaults_match_library_defaults() {
        let cli = parse(&[]);
        let defaults = AuthConfig::default();
        assert_eq!(cli.access_token_ttl_secs, defaults.access_token_lifetime_secs);
        assert_eq!(cli.refresh_token_ttl_secs, defaults.refresh_token_lifetime_secs);
        assert_eq!(cli.default_tenant_slug, defaults.default_tenant_slug);
        assert!(!cli.require_email_verification);

        let db = cli.db_config();
        assert_eq!(db.namespace, DbConfig::default().namespace);
    }

    #[test]
    fn key_files_are_required() {
        assert!(Cli::try_parse_from(["gatehouse"]).is_err());
    }

    #[test]
    fn flags_override_defaults() {
        let cli = parse(&[
            "--require-email-verification",
            "--invite-expiry-days",
            "14",
            "--bootstrap-admin-username",
            "admin",
        ]);
        assert!(cli.require_email_verification);
        assert_eq!(cli.invite_expiry_days, 14);
        assert_eq!(cli.bootstrap_admin_username.as_deref(), Some("admin"));
    }
}
