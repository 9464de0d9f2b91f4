//! Tenant scope resolution.
//!
//! A `Scope` is the resolved access boundary for one request: either
//! tenant-bound or super-admin (global view). It is derived once from the
//! authenticated principal and an explicit `IsolationPolicy`, then treated
//! as immutable for the rest of the request.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::TenantId;

/// Authenticated-principal descriptor, resolved by the external
/// authentication collaborator before the analytics core is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Unique user identifier.
    pub user_id: Uuid,
    /// The tenant this principal belongs to, if any.
    pub tenant_id: Option<TenantId>,
}

impl Principal {
    /// Create a principal bound to a tenant.
    pub fn new(user_id: Uuid, tenant_id: TenantId) -> Self {
        Self {
            user_id,
            tenant_id: Some(tenant_id),
        }
    }
}

/// Tenant isolation policy, injected at process start.
///
/// The widened scope is an explicit, logged opt-in; the default enforces
/// isolation. No role or flag on the principal can widen scope on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationPolicy {
    /// Every principal is bound to its own tenant.
    #[default]
    Enforced,
    /// All authenticated principals see all tenants' data.
    GlobalView,
}

impl IsolationPolicy {
    /// Parse a policy from its configuration string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "enforced" => Some(Self::Enforced),
            "global_view" => Some(Self::GlobalView),
            _ => None,
        }
    }
}

/// The resolved access boundary for one request.
///
/// Invariant: when `is_super_admin` is false, every query executed under
/// this scope carries a strict tenant equality predicate. A scope with no
/// tenant and no super-admin bit matches nothing (fails closed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    /// Whether this scope may see data across tenants.
    pub is_super_admin: bool,
    /// The tenant bind. `None` under super-admin means "all tenants";
    /// `None` under a tenant-bound scope matches nothing.
    pub tenant_id: Option<TenantId>,
}

impl Scope {
    /// Resolve the scope for a request.
    ///
    /// - No principal: fails closed with a tenant-bound scope that has no
    ///   tenant, so strict equality predicates match no rows.
    /// - `Enforced`: the principal is bound to its own tenant.
    /// - `GlobalView`: the principal sees everything; its own tenant id is
    ///   kept so per-tenant defaults (e.g. fallback seeds) still work.
    pub fn resolve(principal: Option<&Principal>, policy: IsolationPolicy) -> Self {
        let Some(principal) = principal else {
            return Self {
                is_super_admin: false,
                tenant_id: None,
            };
        };

        match policy {
            IsolationPolicy::Enforced => Self {
                is_super_admin: false,
                tenant_id: principal.tenant_id,
            },
            IsolationPolicy::GlobalView => {
                tracing::warn!(
                    user_id = %principal.user_id,
                    "tenant isolation disabled by policy: resolving super-admin scope"
                );
                Self {
                    is_super_admin: true,
                    tenant_id: principal.tenant_id,
                }
            }
        }
    }

    /// A tenant-bound scope, mostly useful in tests.
    pub fn tenant(tenant_id: TenantId) -> Self {
        Self {
            is_super_admin: false,
            tenant_id: Some(tenant_id),
        }
    }

    /// A super-admin scope carrying the principal's own tenant.
    pub fn super_admin(tenant_id: Option<TenantId>) -> Self {
        Self {
            is_super_admin: true,
            tenant_id,
        }
    }

    /// The tenant component used in cache keys: the tenant UUID, or "all"
    /// for an unbound super-admin view.
    pub fn cache_tenant_component(&self) -> String {
        match (self.is_super_admin, self.tenant_id) {
            (true, None) => "all".to_string(),
            (_, Some(id)) => id.to_string(),
            (false, None) => "none".to_string(),
        }
    }
}
