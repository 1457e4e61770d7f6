//! World listing - which worlds a principal may see or search.

use std::sync::Arc;

use buildsys_domain::{Permission, PrincipalId, WorldRecord};

use crate::stores::WorldRegistry;
use crate::use_cases::permissions::PermissionResolver;

/// Visible-world queries over the registry.
///
/// Visibility rule:
/// - `SeeAllWorlds` holders start from every world, everyone else from their own.
/// - Hidden worlds are shown to their owner and to `Hide` holders only.
/// - A non-empty search term keeps names containing it, ignoring ASCII case.
///
/// Results keep registry insertion order.
pub struct WorldListing {
    registry: Arc<WorldRegistry>,
    permissions: Arc<PermissionResolver>,
}

impl WorldListing {
    pub fn new(registry: Arc<WorldRegistry>, permissions: Arc<PermissionResolver>) -> Self {
        Self {
            registry,
            permissions,
        }
    }

    pub async fn list_for(&self, principal: &PrincipalId, term: &str) -> Vec<WorldRecord> {
        let see_all = self
            .permissions
            .has(principal, Permission::SeeAllWorlds)
            .await;
        let see_hidden = self.permissions.has(principal, Permission::Hide).await;
        let term = term.trim();

        self.registry
            .all()
            .await
            .into_iter()
            .filter(|world| {
                let owned = world.is_owned_by(principal);
                (see_all || owned)
                    && (!world.is_hidden() || owned || see_hidden)
                    && (term.is_empty() || world.name().contains_ignore_case(term))
            })
            .collect()
    }
}
