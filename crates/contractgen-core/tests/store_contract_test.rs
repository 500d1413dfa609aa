//! Behaviour every ContractStore implementation must share
//!
//! Runs the same checks against the in-memory and SQLite stores.

use std::collections::BTreeSet;
use std::sync::Arc;

use contractgen_core::{ContractId, ContractStore, InMemoryContractStore, SqliteContractStore};

async fn stores() -> Vec<Arc<dyn ContractStore>> {
    let sqlite = SqliteContractStore::open_in_memory().unwrap();
    let stores: Vec<Arc<dyn ContractStore>> =
        vec![Arc::new(InMemoryContractStore::new()), Arc::new(sqlite)];
    for store in &stores {
        store.init().await.unwrap();
    }
    stores
}

#[tokio::test]
async fn save_list_scenario() {
    for store in stores().await {
        assert_eq!(store.save("A", "x").await.unwrap(), 1);
        assert_eq!(store.save("B", "y").await.unwrap(), 2);

        let listed: Vec<(ContractId, String, String)> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.id, r.title, r.content))
            .collect();

        assert_eq!(
            listed,
            vec![
                (1, "A".to_string(), "x".to_string()),
                (2, "B".to_string(), "y".to_string()),
            ],
            "store: {}",
            store.backend_tag()
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_saves_yield_consecutive_distinct_ids() {
    for store in stores().await {
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.save(&format!("C{}", i), "body").await })
            })
            .collect();

        let ids: BTreeSet<ContractId> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();
        assert_eq!(
            ids,
            (1..=32).collect::<BTreeSet<ContractId>>(),
            "store: {}",
            store.backend_tag()
        );
    }
}

#[tokio::test]
async fn saved_records_never_change() {
    for store in stores().await {
        let id = store.save("Lease", "Clause 1").await.unwrap();
        let before = store.get(id).await.unwrap().unwrap();

        for i in 0..5 {
            store.save(&format!("Other {}", i), "noise").await.unwrap();
        }
        store.init().await.unwrap();

        assert_eq!(store.get(id).await.unwrap().unwrap(), before);
    }
}

#[tokio::test]
async fn missing_id_is_absent_and_harmless() {
    for store in stores().await {
        store.save("A", "x").await.unwrap();

        assert!(store.get(0).await.unwrap().is_none());
        assert!(store.get(404).await.unwrap().is_none());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn list_rereads_current_state() {
    for store in stores().await {
        assert!(store.list().await.unwrap().is_empty());
        store.save("A", "x").await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 1);
        store.save("B", "y").await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 2);
    }
}
