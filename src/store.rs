//! Audit record storage
//!
//! `AuditStore` is the seam between the query protocol and whatever holds
//! the records. The responder only ever calls `find_matching`; the other
//! operations cover the write side of the audit lifecycle.

use crate::error::{AuditError, Result};
use crate::types::{AuditQueryFilter, AuditRecord, SortField};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Trait for audit record backends
///
/// Implementations are assumed transactional per call. `save` assigns
/// `stored_at` exactly once; a record that already carries one keeps it.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist a record, returning it with `stored_at` assigned
    async fn save(&self, record: AuditRecord) -> Result<AuditRecord>;

    /// Look up a single record by id
    async fn find_by_id(&self, id: &str) -> Result<AuditRecord>;

    /// Find all records matching the filter, sorted and paginated
    async fn find_matching(&self, filter: &AuditQueryFilter) -> Result<Vec<AuditRecord>>;

    /// Delete a record by id
    async fn remove(&self, id: &str) -> Result<()>;
}

/// In-memory audit store for testing and single-process use
///
/// Holds records in insertion order behind an async lock. Sorting is
/// stable, so records with equal sort keys come back in insertion order.
#[derive(Default)]
pub struct MemoryAuditStore {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryAuditStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no records
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn save(&self, mut record: AuditRecord) -> Result<AuditRecord> {
        if record.stored_at.is_none() {
            record.stored_at = Some(chrono::Utc::now());
        }

        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => {
                // stored_at is assigned exactly once; keep the original
                record.stored_at = existing.stored_at;
                *existing = record.clone();
            }
            None => records.push(record.clone()),
        }

        tracing::debug!(record_id = %record.id, module = %record.module, "Audit record saved");
        Ok(record)
    }

    async fn find_by_id(&self, id: &str) -> Result<AuditRecord> {
        let records = self.records.read().await;
        records
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| AuditError::NotFound(id.to_string()))
    }

    async fn find_matching(&self, filter: &AuditQueryFilter) -> Result<Vec<AuditRecord>> {
        let records = self.records.read().await;
        let mut matching: Vec<AuditRecord> = records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        drop(records);

        sort_records(&mut matching, filter.sort);

        let paged: Vec<AuditRecord> = matching
            .into_iter()
            .skip(filter.offset)
            .take(filter.page_size.unwrap_or(usize::MAX))
            .collect();

        Ok(paged)
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != id);

        if records.len() == before {
            return Err(AuditError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

fn sort_records(records: &mut [AuditRecord], sort: SortField) {
    match sort {
        SortField::ByDate => records.sort_by_key(|r| r.stored_at),
        SortField::ByInitiator => records.sort_by_key(|r| r.initiator),
        SortField::ByModule => records.sort_by(|a, b| a.module.cmp(&b.module)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn record(initiator: i64, module: &str) -> AuditRecord {
        AuditRecord::new(initiator, module, "op.key", format!("{} op", module))
    }

    fn record_at(initiator: i64, module: &str, at: chrono::DateTime<Utc>) -> AuditRecord {
        AuditRecord {
            stored_at: Some(at),
            ..record(initiator, module)
        }
    }

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 17, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_save_assigns_stored_at_once() {
        let store = MemoryAuditStore::new();

        let saved = store.save(record(1, "login")).await.unwrap();
        let stored_at = saved.stored_at.expect("stored_at assigned on save");

        // Re-saving must not move the persistence timestamp
        let resaved = store.save(saved.clone()).await.unwrap();
        assert_eq!(resaved.stored_at, Some(stored_at));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_find_by_id_and_remove() {
        let store = MemoryAuditStore::new();
        let saved = store.save(record(1, "login")).await.unwrap();

        let found = store.find_by_id(&saved.id).await.unwrap();
        assert_eq!(found.id, saved.id);
        assert_eq!(found.module, "login");

        store.remove(&saved.id).await.unwrap();
        assert!(store.is_empty().await);
        assert!(matches!(
            store.find_by_id(&saved.id).await,
            Err(AuditError::NotFound(_))
        ));
        assert!(matches!(
            store.remove(&saved.id).await,
            Err(AuditError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_filter_returns_all() {
        let store = MemoryAuditStore::new();
        for i in 0..5 {
            store.save(record(i, "login")).await.unwrap();
        }

        let all = store
            .find_matching(&AuditQueryFilter::new())
            .await
            .unwrap();
        assert_eq!(all.len(), 5);
    }

    #[tokio::test]
    async fn test_find_matching_filters_by_module() {
        let store = MemoryAuditStore::new();
        store.save(record(1, "login")).await.unwrap();
        store.save(record(2, "billing")).await.unwrap();
        store.save(record(3, "login")).await.unwrap();

        let login = store
            .find_matching(&AuditQueryFilter::new().with_module("login"))
            .await
            .unwrap();
        assert_eq!(login.len(), 2);
        assert!(login.iter().all(|r| r.module == "login"));

        let none = store
            .find_matching(&AuditQueryFilter::new().with_module("mail"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_find_matching_sorts_by_date() {
        let store = MemoryAuditStore::new();
        store
            .save(record_at(1, "b", t0() + Duration::seconds(10)))
            .await
            .unwrap();
        store.save(record_at(2, "a", t0())).await.unwrap();
        store
            .save(record_at(3, "c", t0() + Duration::seconds(5)))
            .await
            .unwrap();

        let by_date = store
            .find_matching(&AuditQueryFilter::new())
            .await
            .unwrap();
        assert_eq!(
            by_date.iter().map(|r| r.initiator).collect::<Vec<_>>(),
            vec![2, 3, 1]
        );

        let by_module = store
            .find_matching(&AuditQueryFilter::new().sorted_by(SortField::ByModule))
            .await
            .unwrap();
        assert_eq!(
            by_module.iter().map(|r| r.module.as_str()).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );

        let by_initiator = store
            .find_matching(&AuditQueryFilter::new().sorted_by(SortField::ByInitiator))
            .await
            .unwrap();
        assert_eq!(
            by_initiator.iter().map(|r| r.initiator).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn test_find_matching_pagination_after_sort() {
        let store = MemoryAuditStore::new();
        for i in 0..10 {
            store
                .save(record_at(i, "login", t0() + Duration::seconds(i)))
                .await
                .unwrap();
        }

        let page = store
            .find_matching(&AuditQueryFilter::new().paged(3, 4))
            .await
            .unwrap();
        assert_eq!(
            page.iter().map(|r| r.initiator).collect::<Vec<_>>(),
            vec![3, 4, 5, 6]
        );

        // Offset past the end yields an empty page
        let past_end = store
            .find_matching(&AuditQueryFilter::new().paged(20, 5))
            .await
            .unwrap();
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn test_find_matching_time_window() {
        let store = MemoryAuditStore::new();
        store.save(record_at(5, "login", t0())).await.unwrap();
        store
            .save(record_at(5, "login", t0() + Duration::seconds(10)))
            .await
            .unwrap();

        let filter = AuditQueryFilter::new()
            .with_module("login")
            .with_initiator(5)
            .with_time_range(t0() - Duration::seconds(3), t0() + Duration::seconds(3));

        let hits = store.find_matching(&filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].stored_at, Some(t0()));
    }
}
