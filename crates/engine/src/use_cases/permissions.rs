//! Permission resolver - answers capability questions for a principal.
//!
//! A principal holds a role when the authorization provider confirms the
//! role's required capability. Each permission kind is then checked against
//! each held role independently; one granted kind never implies another.

use std::collections::HashMap;
use std::sync::Arc;

use buildsys_domain::{Permission, PrincipalId, RoleDefinition};

use crate::infrastructure::ports::AuthorizationProvider;

pub struct PermissionResolver {
    roles: Vec<RoleDefinition>,
    auth: Arc<dyn AuthorizationProvider>,
}

impl PermissionResolver {
    /// Build a resolver over a fixed role set.
    ///
    /// Later definitions with an already-seen key replace the earlier one.
    pub fn new(roles: Vec<RoleDefinition>, auth: Arc<dyn AuthorizationProvider>) -> Self {
        let mut deduped: Vec<RoleDefinition> = Vec::with_capacity(roles.len());
        let mut by_key = HashMap::with_capacity(roles.len());
        for role in roles {
            match by_key.get(role.key()) {
                Some(&index) => {
                    tracing::warn!(
                        role = %role.key(),
                        "Duplicate role key, keeping the last definition"
                    );
                    deduped[index] = role;
                }
                None => {
                    by_key.insert(role.key().to_string(), deduped.len());
                    deduped.push(role);
                }
            }
        }
        Self {
            roles: deduped,
            auth,
        }
    }

    /// Every role whose required capability the principal currently holds.
    ///
    /// An unanswered capability check counts as "not held".
    pub async fn roles_for(&self, principal: &PrincipalId) -> Vec<&RoleDefinition> {
        let mut held = Vec::new();
        for role in &self.roles {
            if self.holds(principal, role).await {
                held.push(role);
            }
        }
        held
    }

    /// True as soon as any held role grants `permission`.
    pub async fn has(&self, principal: &PrincipalId, permission: Permission) -> bool {
        for role in &self.roles {
            // Skip the provider round-trip for roles that could not grant it anyway.
            if role.grants(permission) && self.holds(principal, role).await {
                return true;
            }
        }
        false
    }

    /// True if the principal holds at least one role.
    pub async fn has_any_role(&self, principal: &PrincipalId) -> bool {
        for role in &self.roles {
            if self.holds(principal, role).await {
                return true;
            }
        }
        false
    }

    async fn holds(&self, principal: &PrincipalId, role: &RoleDefinition) -> bool {
        match self
            .auth
            .principal_has_capability(principal, role.required_capability())
            .await
        {
            Ok(held) => held,
            Err(e) => {
                tracing::warn!(
                    principal = %principal,
                    capability = %role.required_capability(),
                    error = %e,
                    "Authorization provider failed, denying"
                );
                false
            }
        }
    }
}
