use chrono::{DateTime, Utc};
use scome_core::{CollectionPath, DocumentStore, FetchError, VisitAggregate};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalSource {
    Fresh,
    LastKnown,
    Default,
    Unavailable,
}

/// Figure handed to the admin dashboard together with where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitTotal {
    pub value: Option<u64>,
    pub source: TotalSource,
    pub aggregate: Option<VisitAggregate>,
}

impl VisitTotal {
    fn fresh(aggregate: VisitAggregate) -> Self {
        Self {
            value: Some(aggregate.total_count),
            source: TotalSource::Fresh,
            aggregate: Some(aggregate),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            value: None,
            source: TotalSource::Unavailable,
            aggregate: None,
        }
    }
}

/// Reads the visit collection back. Every call goes to the store; only the
/// last successful total is remembered, as a fallback.
pub struct VisitAggregator {
    store: Arc<dyn DocumentStore>,
    collection: CollectionPath,
    fallback_total: Option<u64>,
    last_known: Mutex<Option<u64>>,
}

impl VisitAggregator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collection: CollectionPath,
        fallback_total: Option<u64>,
    ) -> Self {
        Self {
            store,
            collection,
            fallback_total,
            last_known: Mutex::new(None),
        }
    }

    pub async fn fetch_total(&self) -> Result<u64, FetchError> {
        let documents = self.store.query_all(&self.collection).await?;
        let total = documents.len() as u64;
        self.remember(total);
        Ok(total)
    }

    pub async fn fetch_aggregate(&self, now: DateTime<Utc>) -> Result<VisitAggregate, FetchError> {
        let documents = self.store.query_all(&self.collection).await?;
        let aggregate = VisitAggregate::from_documents(&documents, now);
        self.remember(aggregate.total_count);
        Ok(aggregate)
    }

    /// One read; on failure degrades to the last known total, then to the
    /// configured default.
    pub async fn aggregate_or_fallback(&self, now: DateTime<Utc>) -> VisitTotal {
        match self.fetch_aggregate(now).await {
            Ok(aggregate) => {
                info!(
                    event = "visit_aggregate_fetched",
                    collection = %self.collection,
                    total = aggregate.total_count
                );
                VisitTotal::fresh(aggregate)
            }
            Err(err) => {
                warn!(event = "visit_aggregate_fallback", collection = %self.collection, error = %err);
                self.fallback()
            }
        }
    }

    pub fn last_known_total(&self) -> Option<u64> {
        self.last_known.lock().ok().and_then(|guard| *guard)
    }

    fn fallback(&self) -> VisitTotal {
        if let Some(total) = self.last_known_total() {
            return VisitTotal {
                value: Some(total),
                source: TotalSource::LastKnown,
                aggregate: None,
            };
        }
        match self.fallback_total {
            Some(total) => VisitTotal {
                value: Some(total),
                source: TotalSource::Default,
                aggregate: None,
            },
            None => VisitTotal::unavailable(),
        }
    }

    fn remember(&self, total: u64) {
        if let Ok(mut guard) = self.last_known.lock() {
            *guard = Some(total);
        }
    }
}
