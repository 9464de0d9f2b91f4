//! Tenant-scoped cache keys.
//!
//! A `CacheKey` can only be built from a resolved `Scope`, so every cached
//! aggregate is tenant-isolated by construction: two tenants asking the
//! same question can never collide on a key.
//!
//! # Format
//!
//! `beacon:{entity}:{tenant}:{digest}` where `entity` is the aggregate's
//! stable name, `tenant` is the scope's tenant component (`all` for an
//! unbound super-admin view) and `digest` is the SHA-256 hex of the filter
//! set's canonical form. The readable prefix keeps keys greppable in a
//! cache dump; the digest keeps them bounded regardless of filter content.

use beacon_core::{AggregateKind, FilterSet, Scope};
use sha2::{Digest, Sha256};

/// A fully-qualified cache key for one aggregate under one scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    rendered: String,
}

impl CacheKey {
    /// Build the key for `entity` as seen by `scope` with `filters`.
    pub fn build(entity: AggregateKind, scope: &Scope, filters: &FilterSet) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(filters.canonical().as_bytes());
        let digest = hex::encode(hasher.finalize());

        Self {
            rendered: format!(
                "beacon:{}:{}:{}",
                entity.as_str(),
                scope.cache_tenant_component(),
                digest
            ),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{DateRange, Period};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_key_is_deterministic() {
        let tenant = Uuid::now_v7();
        let filters = FilterSet::new()
            .with_client(42)
            .with_date_range(DateRange::new(d(2024, 1, 1), d(2024, 1, 31)).unwrap());

        let a = CacheKey::build(AggregateKind::Nps, &Scope::tenant(tenant), &filters);
        let b = CacheKey::build(AggregateKind::Nps, &Scope::tenant(tenant), &filters);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_tenants_never_collide() {
        let filters = FilterSet::new().with_client(42);
        let a = CacheKey::build(AggregateKind::Nps, &Scope::tenant(Uuid::now_v7()), &filters);
        let b = CacheKey::build(AggregateKind::Nps, &Scope::tenant(Uuid::now_v7()), &filters);
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_is_sensitive_to_every_filter_field() {
        let tenant = Uuid::now_v7();
        let scope = Scope::tenant(tenant);
        let base = CacheKey::build(AggregateKind::Csat, &scope, &FilterSet::new());

        let variants = [
            FilterSet::new().with_client(1),
            FilterSet::new().with_stage("retention"),
            FilterSet::new().with_period(Period::Quarter),
            FilterSet::new()
                .with_date_range(DateRange::new(d(2024, 1, 1), d(2024, 1, 2)).unwrap()),
            FilterSet::new().with_tenant(Uuid::now_v7()),
        ];
        for filters in variants {
            assert_ne!(base, CacheKey::build(AggregateKind::Csat, &scope, &filters));
        }
    }

    #[test]
    fn test_key_is_sensitive_to_entity() {
        let scope = Scope::tenant(Uuid::now_v7());
        let filters = FilterSet::new();
        let nps = CacheKey::build(AggregateKind::Nps, &scope, &filters);
        let csat = CacheKey::build(AggregateKind::Csat, &scope, &filters);
        assert_ne!(nps, csat);
    }

    #[test]
    fn test_super_admin_view_has_distinct_namespace() {
        let filters = FilterSet::new();
        let global = CacheKey::build(AggregateKind::Nps, &Scope::super_admin(None), &filters);
        assert!(global.as_str().contains(":all:"));

        let bound = CacheKey::build(
            AggregateKind::Nps,
            &Scope::tenant(Uuid::now_v7()),
            &filters,
        );
        assert_ne!(global, bound);
    }

    #[test]
    fn test_key_shape() {
        let key = CacheKey::build(
            AggregateKind::RetentionCohort,
            &Scope::super_admin(None),
            &FilterSet::new(),
        );
        let parts: Vec<&str> = key.as_str().split(':').collect();
        assert_eq!(parts[0], "beacon");
        assert_eq!(parts[1], "retention_cohort");
        assert_eq!(parts[2], "all");
        // SHA-256 hex digest.
        assert_eq!(parts[3].len(), 64);
    }
}
