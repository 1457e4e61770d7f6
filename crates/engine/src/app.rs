//! Application state and composition.

use std::sync::Arc;
use std::time::Duration;

use buildsys_domain::RoleDefinition;

use crate::infrastructure::ports::{
    AuthorizationProvider, ClockPort, WorldStorageEngine, WorldStore,
};
use crate::stores::{IdleWorldTracker, WorldRegistry};
use crate::use_cases::{
    EvictionConfig, EvictionScheduler, PermissionResolver, ReconcileError, ReconcileReport,
    StartupReconciler, WorldLifecycle, WorldListing,
};

/// Port implementations the application is built from.
pub struct Ports {
    pub store: Arc<dyn WorldStore>,
    pub storage: Arc<dyn WorldStorageEngine>,
    pub auth: Arc<dyn AuthorizationProvider>,
    pub clock: Arc<dyn ClockPort>,
}

/// Main application state.
///
/// One registry and one idle tracker per instance; nothing is global, so
/// independent instances can coexist (tests build several).
pub struct App {
    pub registry: Arc<WorldRegistry>,
    pub tracker: Arc<IdleWorldTracker>,
    pub permissions: Arc<PermissionResolver>,
    pub listing: Arc<WorldListing>,
    pub worlds: WorldLifecycle,
    pub reconciler: StartupReconciler,
    pub eviction: Arc<EvictionScheduler>,
    pub clock: Arc<dyn ClockPort>,
}

impl App {
    pub fn new(
        ports: Ports,
        roles: Vec<RoleDefinition>,
        eviction: EvictionConfig,
        startup_timeout: Duration,
    ) -> Self {
        let registry = Arc::new(WorldRegistry::new());
        let tracker = Arc::new(IdleWorldTracker::new());
        let permissions = Arc::new(PermissionResolver::new(roles, ports.auth));
        let listing = Arc::new(WorldListing::new(
            Arc::clone(&registry),
            Arc::clone(&permissions),
        ));

        let worlds = WorldLifecycle::new(
            Arc::clone(&registry),
            Arc::clone(&tracker),
            Arc::clone(&permissions),
            Arc::clone(&listing),
            Arc::clone(&ports.store),
            Arc::clone(&ports.storage),
            Arc::clone(&ports.clock),
        );
        let reconciler = StartupReconciler::new(
            Arc::clone(&ports.store),
            Arc::clone(&ports.storage),
            Arc::clone(&registry),
            startup_timeout,
        );
        let eviction = Arc::new(EvictionScheduler::new(
            Arc::clone(&tracker),
            Arc::clone(&registry),
            ports.storage,
            Arc::clone(&ports.clock),
            eviction,
        ));

        Self {
            registry,
            tracker,
            permissions,
            listing,
            worlds,
            reconciler,
            eviction,
            clock: ports.clock,
        }
    }

    /// Run startup reconciliation and start idle tracking for worlds the
    /// storage engine already has loaded.
    pub async fn reconcile(&self) -> Result<ReconcileReport, ReconcileError> {
        let report = self.reconciler.run().await?;
        let now = self.clock.now();
        for world in &report.loaded {
            self.tracker.mark_empty(world, now);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::authorization::GrantsFileAuthorization;
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::ports::{
        MockAuthorizationProvider, MockWorldStorageEngine, MockWorldStore,
    };
    use crate::infrastructure::roles_file::parse_roles;
    use crate::infrastructure::world_storage::DirectoryWorldStorage;
    use crate::infrastructure::world_store::SqliteWorldStore;
    use buildsys_domain::{PrincipalId, WorldKind, WorldName, WorldRecord};
    use chrono::{TimeZone, Utc};
    use mockall::predicate::*;
    use std::path::Path;
    use tokio_util::sync::CancellationToken;

    const ROLES: &str = r#"{
        "builder": { "allowed-world-kinds": ["FLAT"] },
        "admin": { "see-all-worlds": true, "delete-worlds": true, "hide-worlds": true }
    }"#;

    const GRANTS: &str = r#"{ "bob": ["buildsystem.builder"], "alice": ["buildsystem.admin"] }"#;

    async fn app_in(dir: &Path, clock: Arc<ManualClock>) -> App {
        let grants_path = dir.join("grants.json");
        std::fs::write(&grants_path, GRANTS).unwrap();
        let db_path = dir.join("worlds.db");

        let ports = Ports {
            store: Arc::new(SqliteWorldStore::new(db_path.to_str().unwrap()).await.unwrap()),
            storage: Arc::new(DirectoryWorldStorage::new(dir.join("worlds")).await.unwrap()),
            auth: Arc::new(GrantsFileAuthorization::load(grants_path).await.unwrap()),
            clock,
        };
        App::new(
            ports,
            parse_roles(ROLES, "test").unwrap(),
            EvictionConfig::default(),
            Duration::from_secs(5),
        )
    }

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn restart_reconciles_against_disk() {
        let dir = tempfile::tempdir().unwrap();
        let bob = PrincipalId::new("bob").unwrap();
        {
            let app = app_in(dir.path(), Arc::new(ManualClock::new(t0()))).await;
            app.reconcile().await.unwrap();
            app.worlds.create(&bob, "keep", WorldKind::Flat).await.unwrap();
            app.worlds.create(&bob, "lose", WorldKind::Flat).await.unwrap();
        }
        std::fs::remove_dir_all(dir.path().join("worlds").join("lose")).unwrap();

        let app = app_in(dir.path(), Arc::new(ManualClock::new(t0()))).await;
        let report = app.reconcile().await.unwrap();

        assert_eq!(report.retained, vec![WorldName::new("keep").unwrap()]);
        assert_eq!(report.removed, vec![WorldName::new("lose").unwrap()]);
        let listed = app.worlds.list(&bob).await;
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].is_loaded());
    }

    #[tokio::test]
    async fn created_world_is_evicted_when_nobody_enters() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(t0()));
        let app = app_in(dir.path(), Arc::clone(&clock)).await;
        let bob = PrincipalId::new("bob").unwrap();
        let meadow = WorldName::new("meadow").unwrap();
        app.worlds.create(&bob, "meadow", WorldKind::Flat).await.unwrap();

        clock.advance(chrono::Duration::seconds(301));
        let report = app.eviction.sweep(&CancellationToken::new()).await;

        assert_eq!(report.evicted, vec![meadow.clone()]);
        assert!(!app.registry.find(&meadow).await.unwrap().is_loaded());

        // Entering loads it again.
        let entered = app.worlds.enter(&bob, &meadow).await.unwrap();
        assert!(entered.is_loaded());
    }

    #[tokio::test]
    async fn admin_deletes_builders_world() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path(), Arc::new(ManualClock::new(t0()))).await;
        let bob = PrincipalId::new("bob").unwrap();
        let alice = PrincipalId::new("alice").unwrap();
        app.worlds.create(&bob, "meadow", WorldKind::Flat).await.unwrap();

        app.worlds
            .delete(&alice, &WorldName::new("MEADOW").unwrap())
            .await
            .unwrap();

        assert!(app.registry.is_empty().await);
        assert!(!dir.path().join("worlds").join("meadow").exists());
        assert!(app.tracker.is_empty());
    }

    #[tokio::test]
    async fn world_loaded_at_startup_is_evicted_after_threshold() {
        let hot = WorldName::new("hot").unwrap();
        let clock = Arc::new(ManualClock::new(t0()));

        let mut store = MockWorldStore::new();
        store.expect_load_all().returning(|| {
            Ok(vec![WorldRecord::new(
                WorldName::new("hot").unwrap(),
                PrincipalId::new("bob").unwrap(),
                WorldKind::Flat,
                t0(),
            )])
        });
        let mut storage = MockWorldStorageEngine::new();
        storage
            .expect_list_world_names()
            .returning(|| Ok(vec!["hot".to_string()]));
        storage
            .expect_list_loaded_worlds()
            .returning(|| Ok(vec!["HOT".to_string()]));
        storage
            .expect_unload()
            .with(eq(hot.clone()))
            .times(1)
            .returning(|_| Ok(()));

        let app = App::new(
            Ports {
                store: Arc::new(store),
                storage: Arc::new(storage),
                auth: Arc::new(MockAuthorizationProvider::new()),
                clock: clock.clone(),
            },
            Vec::new(),
            EvictionConfig::default(),
            Duration::from_secs(5),
        );

        let report = app.reconcile().await.unwrap();
        assert_eq!(report.loaded, vec![hot.clone()]);
        assert_eq!(app.tracker.idle_since(&hot), Some(t0()));

        clock.advance(chrono::Duration::seconds(299));
        assert!(app.eviction.sweep(&CancellationToken::new()).await.evicted.is_empty());

        clock.advance(chrono::Duration::seconds(2));
        let swept = app.eviction.sweep(&CancellationToken::new()).await;
        assert_eq!(swept.evicted, vec![hot.clone()]);
        assert!(!app.registry.find(&hot).await.unwrap().is_loaded());
    }
}
