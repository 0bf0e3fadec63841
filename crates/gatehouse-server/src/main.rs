//! Gatehouse server entry point.
//!
//! Connects to SurrealDB, applies migrations, makes sure the default
//! tenant exists, and purges expired sessions on a fixed interval until
//! interrupted. HTTP routing is provided by the embedding application.

mod cli;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use gatehouse_auth::{SessionManager, TenantDirectory, TokenCodec};
use gatehouse_core::repository::{SessionRepository, TenantRepository, UserRepository};
use gatehouse_db::DbManager;
use gatehouse_db::repository::{
    SurrealSessionRepository, SurrealTenantRepository, SurrealUserRepository,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gatehouse=info".parse()?))
        .json()
        .init();

    let cli = Cli::parse();
    info!("Starting Gatehouse...");

    let auth_config = cli.auth_config().await?;
    let codec = TokenCodec::new(&auth_config).context("loading JWT key pair")?;

    let db = DbManager::connect(&cli.db_config())
        .await
        .context("connecting to SurrealDB")?;
    gatehouse_db::run_migrations(db.client()).await?;

    let client = db.client().clone();
    let users = SurrealUserRepository::new(client.clone());
    let directory = TenantDirectory::new(SurrealTenantRepository::new(client.clone()), users.clone());
    let sessions = SessionManager::new(SurrealSessionRepository::new(client), users, codec);

    let tenant = directory
        .ensure(&cli.default_tenant_slug, &cli.default_tenant_name)
        .await?;
    info!(tenant_id = %tenant.id, slug = %tenant.slug, "default tenant ready");
    if cli.bootstrap_admin_username.is_some() && cli.bootstrap_admin_password.is_some() {
        info!(slug = %tenant.slug, "bootstrap administrator enabled while the tenant is empty");
    }

    let every = Duration::from_secs(cli.session_sweep_secs.max(1));
    let sweeper = tokio::spawn(sweep_sessions(directory, sessions, every));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    sweeper.abort();

    info!("Gatehouse stopped.");
    Ok(())
}

/// Purge expired sessions of every tenant, forever.
async fn sweep_sessions<T, U, S>(
    directory: TenantDirectory<T, U>,
    sessions: SessionManager<S, U>,
    every: Duration,
) where
    T: TenantRepository,
    U: UserRepository,
    S: SessionRepository,
{
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        let tenants = match directory.all().await {
            Ok(tenants) => tenants,
            Err(e) => {
                warn!(error = %e, "session sweep could not list tenants");
                continue;
            }
        };
        for tenant in tenants {
            match sessions.cleanup_expired(tenant.id).await {
                Ok(0) => {}
                Ok(removed) => info!(tenant_id = %tenant.id, removed, "expired sessions purged"),
                Err(e) => warn!(tenant_id = %tenant.id, error = %e, "session sweep failed"),
            }
        }
    }
}
