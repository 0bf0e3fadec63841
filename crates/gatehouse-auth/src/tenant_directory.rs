//! Tenant lookup and creation by slug.

use gatehouse_core::error::{GatehouseError, GatehouseResult};
use gatehouse_core::models::tenant::{CreateTenant, MembershipPolicy, Tenant, normalize_slug};
use gatehouse_core::repository::{Pagination, TenantRepository, UserRepository};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    Resolved(Tenant),
    NotFound,
}

#[derive(Debug, Clone)]
pub enum CreateTenantOutcome {
    Created(Tenant),
    SlugTaken,
}

/// Resolves human-readable slugs to tenants.
#[derive(Clone)]
pub struct TenantDirectory<T: TenantRepository, U: UserRepository> {
    tenants: T,
    users: U,
}

impl<T: TenantRepository, U: UserRepository> TenantDirectory<T, U> {
    pub fn new(tenants: T, users: U) -> Self {
        Self { tenants, users }
    }

    pub async fn resolve(&self, slug: &str) -> GatehouseResult<ResolveOutcome> {
        let slug = normalize_slug(slug);
        if slug.is_empty() {
            return Ok(ResolveOutcome::NotFound);
        }
        match self.tenants.get_by_slug(&slug).await {
            Ok(tenant) => Ok(ResolveOutcome::Resolved(tenant)),
            Err(e) if e.is_not_found() => Ok(ResolveOutcome::NotFound),
            Err(e) => Err(e),
        }
    }

    /// Create a tenant. A slug claimed by a concurrent caller between
    /// the pre-check and the insert is reported the same way as one that
    /// already existed.
    pub async fn create(
        &self,
        slug: &str,
        name: &str,
        policy: MembershipPolicy,
    ) -> GatehouseResult<CreateTenantOutcome> {
        let slug = normalize_slug(slug);
        if slug.is_empty() {
            return Err(GatehouseError::Validation {
                message: "tenant slug must not be empty".into(),
            });
        }

        if let ResolveOutcome::Resolved(_) = self.resolve(&slug).await? {
            return Ok(CreateTenantOutcome::SlugTaken);
        }

        let input = CreateTenant {
            slug,
            name: name.trim().to_string(),
            policy,
        };
        match self.tenants.create(input).await {
            Ok(tenant) => {
                info!(tenant_id = %tenant.id, slug = %tenant.slug, "tenant created");
                Ok(CreateTenantOutcome::Created(tenant))
            }
            Err(e) if e.is_conflict_on("slug") => Ok(CreateTenantOutcome::SlugTaken),
            Err(e) => Err(e),
        }
    }

    /// Get-or-create, used at startup for the default tenant.
    pub async fn ensure(&self, slug: &str, name: &str) -> GatehouseResult<Tenant> {
        if let ResolveOutcome::Resolved(tenant) = self.resolve(slug).await? {
            return Ok(tenant);
        }
        match self.create(slug, name, MembershipPolicy::InviteOnly).await? {
            CreateTenantOutcome::Created(tenant) => Ok(tenant),
            // Lost a creation race; the winner's row is the one we want.
            CreateTenantOutcome::SlugTaken => match self.resolve(slug).await? {
                ResolveOutcome::Resolved(tenant) => Ok(tenant),
                ResolveOutcome::NotFound => Err(GatehouseError::Internal(format!(
                    "tenant {slug} reported taken but not found"
                ))),
            },
        }
    }

    /// Every tenant, oldest first.
    pub async fn all(&self) -> GatehouseResult<Vec<Tenant>> {
        let mut tenants = Vec::new();
        loop {
            let page = self
                .tenants
                .list(Pagination {
                    offset: tenants.len() as u64,
                    limit: 100,
                })
                .await?;
            let fetched = page.items.len();
            tenants.extend(page.items);
            if fetched == 0 || tenants.len() as u64 >= page.total {
                return Ok(tenants);
            }
        }
    }

    pub async fn user_count(&self, tenant_id: Uuid) -> GatehouseResult<u64> {
        self.users.count(tenant_id).await
    }

    /// Remove a tenant that never got an owner (signup compensation).
    pub(crate) async fn discard(&self, tenant_id: Uuid) -> GatehouseResult<()> {
        self.tenants.delete(tenant_id).await
    }
}
