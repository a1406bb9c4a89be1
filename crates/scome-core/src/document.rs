use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const PATH_SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("collection path is empty")]
    Empty,
    #[error("collection path segment {index} is empty")]
    EmptySegment { index: usize },
    #[error("collection path segment {index} contains '/': {segment}")]
    NestedSeparator { index: usize, segment: String },
    #[error("path with {segments} segments names a document, not a collection")]
    NotACollection { segments: usize },
}

/// Slash-separated path to a collection in the document store.
///
/// Collections sit at odd depths (`visits`, `artifacts/app/public/data/visits`);
/// even depths name documents and are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath {
    segments: Vec<String>,
}

impl CollectionPath {
    pub fn new<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(PathError::Empty);
        }
        for (index, segment) in segments.iter().enumerate() {
            if segment.trim().is_empty() {
                return Err(PathError::EmptySegment { index });
            }
            if segment.contains(PATH_SEPARATOR) {
                return Err(PathError::NestedSeparator {
                    index,
                    segment: segment.clone(),
                });
            }
        }
        if segments.len() % 2 == 0 {
            return Err(PathError::NotACollection {
                segments: segments.len(),
            });
        }
        Ok(Self { segments })
    }

    /// `artifacts/{app_namespace}/public/data/visits`
    pub fn visits(app_namespace: &str) -> Result<Self, PathError> {
        Self::new(["artifacts", app_namespace, "public", "data", "visits"])
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn collection_id(&self) -> &str {
        self.segments
            .last()
            .map(String::as_str)
            .unwrap_or_default()
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl FromStr for CollectionPath {
    type Err = PathError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim().trim_matches(PATH_SEPARATOR);
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }
        Self::new(trimmed.split(PATH_SEPARATOR))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Placeholder the store replaces with its own clock on append.
    ServerTimestamp,
    Timestamp(DateTime<Utc>),
    String(String),
    Integer(i64),
    Bool(bool),
}

impl FieldValue {
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub fields: BTreeMap<String, FieldValue>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Replaces every `ServerTimestamp` placeholder with `now`.
    pub fn resolve_server_timestamps(mut self, now: DateTime<Utc>) -> Self {
        for value in self.fields.values_mut() {
            if *value == FieldValue::ServerTimestamp {
                *value = FieldValue::Timestamp(now);
            }
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: RecordId,
    pub fields: BTreeMap<String, FieldValue>,
}

impl StoredDocument {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("document store backend error: {0}")]
    Backend(String),
}

/// Append-only document store boundary. This application never updates or
/// deletes documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn append(
        &self,
        collection: &CollectionPath,
        document: Document,
    ) -> Result<RecordId, StoreError>;

    async fn query_all(&self, collection: &CollectionPath)
        -> Result<Vec<StoredDocument>, StoreError>;
}
