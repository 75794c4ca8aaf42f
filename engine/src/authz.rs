//! Authorization boundary.
//!
//! Every mutating operation asks the authorizer before touching the store.

use crate::{
    error::{Error, Result},
    store::StoreResult,
    ContainerId, Principal,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// Capability check supplied by the host application.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Whether `principal` may change the ordering of `container_id`.
    async fn can_write(&self, principal: &str, container_id: &str) -> StoreResult<bool>;
}

/// Grants everything. For single-user embeddings and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn can_write(&self, _principal: &str, _container_id: &str) -> StoreResult<bool> {
        Ok(true)
    }
}

/// Fixed table of `principal -> containers` grants.
#[derive(Debug, Clone, Default)]
pub struct StaticAcl {
    grants: HashMap<Principal, HashSet<ContainerId>>,
}

impl StaticAcl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `principal` to write `container_id`.
    pub fn grant(mut self, principal: impl Into<Principal>, container_id: impl Into<ContainerId>) -> Self {
        self.grants
            .entry(principal.into())
            .or_default()
            .insert(container_id.into());
        self
    }
}

#[async_trait]
impl Authorizer for StaticAcl {
    async fn can_write(&self, principal: &str, container_id: &str) -> StoreResult<bool> {
        Ok(self
            .grants
            .get(principal)
            .is_some_and(|containers| containers.contains(container_id)))
    }
}

pub(crate) async fn ensure_can_write(
    authz: &dyn Authorizer,
    principal: &str,
    container_id: &str,
) -> Result<()> {
    if authz.can_write(principal, container_id).await? {
        return Ok(());
    }
    tracing::warn!(principal, container = container_id, "write denied");
    Err(Error::Forbidden {
        principal: principal.to_string(),
        container: container_id.to_string(),
    })
}
