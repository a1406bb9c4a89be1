use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{Document, FieldValue, StoreError, StoredDocument};

pub const TIMESTAMP_FIELD: &str = "timestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub timestamp: DateTime<Utc>,
}

impl VisitRecord {
    /// The document appended for a new visit; the store assigns the timestamp.
    pub fn pending_document() -> Document {
        Document::new().with_field(TIMESTAMP_FIELD, FieldValue::ServerTimestamp)
    }

    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self { timestamp }
    }

    pub fn to_document(self) -> Document {
        Document::new().with_field(TIMESTAMP_FIELD, FieldValue::Timestamp(self.timestamp))
    }

    pub fn from_document(document: &StoredDocument) -> Option<Self> {
        document
            .field(TIMESTAMP_FIELD)
            .and_then(FieldValue::as_timestamp)
            .map(Self::at)
    }
}

/// Figures shown on the admin dashboard, recomputed on every read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitAggregate {
    pub total_count: u64,
    pub last_24h: u64,
    pub latest_visit: Option<DateTime<Utc>>,
}

impl VisitAggregate {
    /// Every document counts toward the total; only readable timestamps feed
    /// the time-based figures.
    pub fn from_documents(documents: &[StoredDocument], now: DateTime<Utc>) -> Self {
        let window_start = now - Duration::hours(24);
        let mut aggregate = Self {
            total_count: documents.len() as u64,
            ..Self::default()
        };
        for record in documents.iter().filter_map(VisitRecord::from_document) {
            if record.timestamp > window_start && record.timestamp <= now {
                aggregate.last_24h += 1;
            }
            if aggregate
                .latest_visit
                .map_or(true, |latest| record.timestamp > latest)
            {
                aggregate.latest_visit = Some(record.timestamp);
            }
        }
        aggregate
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("visit write failed: {0}")]
pub struct WriteError(#[from] pub StoreError);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("visit fetch failed: {0}")]
pub struct FetchError(#[from] pub StoreError);
