//! User directory lookup for role-based assignment
//!
//! Approval steps may name a role instead of a user; the engine asks
//! the directory for an active user holding that role. The host owns
//! the real directory (LDAP, database, whatever); `StaticDirectory`
//! covers tests and single-process deployments.

use async_trait::async_trait;
use greenlight_types::{Role, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Resolves roles to concrete users
#[async_trait]
pub trait Directory: Send + Sync {
    /// First active user holding `role`, if any
    async fn find_active_user_by_role(&self, role: Role) -> Option<UserId>;
}

/// Fixed role-to-user mapping
#[derive(Debug, Default)]
pub struct StaticDirectory {
    users: Arc<RwLock<HashMap<Role, UserId>>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the user resolved for `role`, replacing any previous one
    pub async fn assign(&self, role: Role, user: UserId) {
        let mut users = self.users.write().await;
        users.insert(role, user);
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn find_active_user_by_role(&self, role: Role) -> Option<UserId> {
        let users = self.users.read().await;
        users.get(&role).cloned()
    }
}
