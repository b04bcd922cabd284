use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    core::city::CityRecord,
    ports::city_store::{CityStore, LIST_ALL_LIMIT, StoreError, StoreResult},
};

/// Process-local store used for development runs and tests.
///
/// Mirrors the Elasticsearch adapter's contract: data operations fail with
/// [`StoreError::NotConnected`] outside the connect/close window, and listings
/// are ordered by city and capped at [`LIST_ALL_LIMIT`].
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<BTreeMap<String, u64>>,
    connected: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn ensure_connected(&self) -> StoreResult<()> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::NotConnected)
        }
    }
}

#[async_trait]
impl CityStore for InMemoryStore {
    async fn connect(&self) -> StoreResult<()> {
        self.connected.store(true, Ordering::Release);
        tracing::info!("In-memory store ready");
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        self.connected.store(false, Ordering::Release);
        tracing::info!("In-memory store closed");
        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn upsert(&self, record: &CityRecord) -> StoreResult<()> {
        self.ensure_connected()?;
        self.records
            .write()
            .await
            .insert(record.city.clone(), record.population);
        Ok(())
    }

    async fn get(&self, city: &str) -> StoreResult<Option<u64>> {
        self.ensure_connected()?;
        Ok(self.records.read().await.get(city).copied())
    }

    async fn list_all(&self) -> StoreResult<Vec<CityRecord>> {
        self.ensure_connected()?;
        Ok(self
            .records
            .read()
            .await
            .iter()
            .take(LIST_ALL_LIMIT)
            .map(|(city, population)| CityRecord::new(city.clone(), *population))
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn connected_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.connect().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_upsert_then_get() {
        let store = connected_store().await;
        store.upsert(&CityRecord::new("tokyo", 13_960_000)).await.unwrap();
        assert_eq!(store.get("tokyo").await.unwrap(), Some(13_960_000));
        assert_eq!(store.get("osaka").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_is_idempotent() {
        let store = connected_store().await;
        let record = CityRecord::new("lima", 10);
        store.upsert(&record).await.unwrap();
        store.upsert(&record).await.unwrap();
        assert_eq!(store.len().await, 1);

        store.upsert(&CityRecord::new("lima", 11)).await.unwrap();
        assert_eq!(store.get("lima").await.unwrap(), Some(11));
    }

    #[tokio::test]
    async fn test_list_all_sorted_and_empty() {
        let store = connected_store().await;
        assert!(store.list_all().await.unwrap().is_empty());

        for city in ["oslo", "bern", "rome"] {
            store.upsert(&CityRecord::new(city, 1)).await.unwrap();
        }
        let cities: Vec<_> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.city)
            .collect();
        assert_eq!(cities, vec!["bern", "oslo", "rome"]);
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let store = InMemoryStore::new();
        assert!(!store.health_check().await);
        assert!(matches!(store.get("x").await, Err(StoreError::NotConnected)));

        store.connect().await.unwrap();
        assert!(store.health_check().await);

        store.close().await.unwrap();
        assert!(!store.health_check().await);
        assert!(matches!(
            store.upsert(&CityRecord::new("x", 1)).await,
            Err(StoreError::NotConnected)
        ));
    }
}
