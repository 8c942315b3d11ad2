//! # Concurrent Publish Tests
//!
//! Races many publishers against one pack and checks the single-latest and
//! promote-once guarantees. Every scenario runs against the in-memory store;
//! the same scenarios run against Postgres when `PACKREG_TEST_DATABASE_URL`
//! points at a scratch database.

use std::sync::Arc;

use packreg_core::{PackSlug, PackStatus, SemVer, Tier};
use packreg_registry::{
    MemoryPackStore, NewPack, NewVersion, PackStore, PgPackStore, StoreError,
};

fn unique_slug(prefix: &str) -> PackSlug {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    PackSlug::parse(&format!("{prefix}-{}", &suffix[..12])).unwrap()
}

async fn draft(store: &Arc<dyn PackStore>) -> packreg_registry::Pack {
    store
        .create_pack(NewPack {
            slug: unique_slug("race"),
            name: "Race".into(),
            owner: "alice".into(),
            tier_required: Tier::Free,
        })
        .await
        .unwrap()
}

fn version(pack: &packreg_registry::Pack, v: &str) -> NewVersion {
    NewVersion {
        pack_id: pack.id,
        version: SemVer::parse(v).unwrap(),
        manifest: serde_json::json!({"v": v}),
        files: vec![],
    }
}

// ─── Scenarios ───────────────────────────────────────────────────────

async fn n_distinct_versions_leave_one_latest(store: Arc<dyn PackStore>, n: usize) {
    let pack = draft(&store).await;

    let handles: Vec<_> = (0..n)
        .map(|i| {
            let store = store.clone();
            let new = version(&pack, &format!("1.0.{i}"));
            tokio::spawn(async move { store.publish_version(new).await })
        })
        .collect();

    let mut promoted = 0;
    for h in handles {
        let outcome = h.await.unwrap().unwrap();
        if outcome.promoted {
            promoted += 1;
        }
    }
    assert_eq!(promoted, 1, "draft -> published must happen exactly once");

    let versions = store.list_versions(pack.id).await.unwrap();
    assert_eq!(versions.len(), n);
    assert_eq!(versions.iter().filter(|v| v.is_latest).count(), 1);

    let pack = store.pack_by_id(pack.id).await.unwrap().unwrap();
    assert_eq!(pack.status, PackStatus::Published);
}

async fn racing_first_publishes(store: Arc<dyn PackStore>) {
    let pack = draft(&store).await;
    let a = {
        let store = store.clone();
        let new = version(&pack, "1.0.0");
        tokio::spawn(async move { store.publish_version(new).await })
    };
    let b = {
        let store = store.clone();
        let new = version(&pack, "1.0.1");
        tokio::spawn(async move { store.publish_version(new).await })
    };
    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();

    assert!(a.promoted ^ b.promoted, "exactly one publish promotes");
    let latest = store.latest_version(pack.id).await.unwrap().unwrap();
    let committed_last = if a.promoted { &b } else { &a };
    assert_eq!(latest.id, committed_last.version.id);
}

async fn duplicate_race_has_one_winner(store: Arc<dyn PackStore>, n: usize) {
    let pack = draft(&store).await;
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let store = store.clone();
            let new = version(&pack, "1.0.0");
            tokio::spawn(async move { store.publish_version(new).await })
        })
        .collect();

    let mut ok = 0;
    let mut conflicts = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => ok += 1,
            Err(StoreError::VersionConflict { .. }) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(conflicts, n - 1);
    assert_eq!(store.list_versions(pack.id).await.unwrap().len(), 1);
}

async fn status_is_published_iff_a_version_exists(store: Arc<dyn PackStore>) {
    let pack = draft(&store).await;
    assert_eq!(pack.status, PackStatus::Draft);
    assert!(store.latest_version(pack.id).await.unwrap().is_none());

    store.publish_version(version(&pack, "0.1.0")).await.unwrap();
    let pack = store.pack_by_id(pack.id).await.unwrap().unwrap();
    assert_eq!(pack.status, PackStatus::Published);
}

// ─── In-memory ───────────────────────────────────────────────────────

fn memory() -> Arc<dyn PackStore> {
    Arc::new(MemoryPackStore::new())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_concurrent_distinct_versions() {
    n_distinct_versions_leave_one_latest(memory(), 32).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_racing_first_publishes() {
    for _ in 0..20 {
        racing_first_publishes(memory()).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_duplicate_race() {
    duplicate_race_has_one_winner(memory(), 8).await;
}

#[tokio::test]
async fn memory_status_follows_first_version() {
    status_is_published_iff_a_version_exists(memory()).await;
}

// ─── Postgres ────────────────────────────────────────────────────────

async fn postgres() -> Option<Arc<dyn PackStore>> {
    let url = std::env::var("PACKREG_TEST_DATABASE_URL").ok()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .connect(&url)
        .await
        .unwrap();
    packreg_registry::migrate(&pool).await.unwrap();
    Some(Arc::new(PgPackStore::new(pool)))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn postgres_concurrent_distinct_versions() {
    let Some(store) = postgres().await else {
        eprintln!("PACKREG_TEST_DATABASE_URL not set; skipping");
        return;
    };
    n_distinct_versions_leave_one_latest(store, 16).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn postgres_racing_first_publishes() {
    let Some(store) = postgres().await else {
        eprintln!("PACKREG_TEST_DATABASE_URL not set; skipping");
        return;
    };
    for _ in 0..5 {
        racing_first_publishes(store.clone()).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn postgres_duplicate_race() {
    let Some(store) = postgres().await else {
        eprintln!("PACKREG_TEST_DATABASE_URL not set; skipping");
        return;
    };
    duplicate_race_has_one_winner(store, 8).await;
}

#[tokio::test]
async fn postgres_status_follows_first_version() {
    let Some(store) = postgres().await else {
        eprintln!("PACKREG_TEST_DATABASE_URL not set; skipping");
        return;
    };
    status_is_published_iff_a_version_exists(store).await;
}
