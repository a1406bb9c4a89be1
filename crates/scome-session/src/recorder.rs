use scome_core::{
    CollectionPath, DocumentStore, Flag, Identity, RecordId, VisitRecord, WriteError,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::flags::LocalFlags;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded(RecordId),
    /// The write was attempted and failed; the session will not try again.
    Dropped(WriteError),
    AlreadyLogged,
    NoIdentity,
}

impl RecordOutcome {
    pub fn attempted(&self) -> bool {
        matches!(self, RecordOutcome::Recorded(_) | RecordOutcome::Dropped(_))
    }
}

/// Appends at most one visit per session.
pub struct VisitRecorder {
    store: Arc<dyn DocumentStore>,
    collection: CollectionPath,
    flags: LocalFlags,
    /// Set once an append has settled. Holds even when the flag store fails.
    attempted: Mutex<bool>,
}

impl VisitRecorder {
    pub fn new(store: Arc<dyn DocumentStore>, collection: CollectionPath, flags: LocalFlags) -> Self {
        Self {
            store,
            collection,
            flags,
            attempted: Mutex::new(false),
        }
    }

    /// The `visit_logged` flag is raised once the write settles, whatever
    /// its result, so a session never writes twice.
    pub async fn record_visit_once(&self, identity: Option<&Identity>) -> RecordOutcome {
        let Some(identity) = identity else {
            return RecordOutcome::NoIdentity;
        };

        let mut attempted = self.attempted.lock().await;
        if *attempted || self.flags.get_flag(Flag::VisitLogged) {
            debug!(event = "visit_already_logged", identity = %identity);
            return RecordOutcome::AlreadyLogged;
        }

        let result = self
            .store
            .append(&self.collection, VisitRecord::pending_document())
            .await;
        *attempted = true;

        if let Err(err) = self.flags.set_flag(Flag::VisitLogged, true) {
            warn!(event = "visit_flag_write_failed", error = %err);
        }

        match result {
            Ok(record_id) => {
                info!(
                    event = "visit_recorded",
                    collection = %self.collection,
                    record_id = %record_id,
                    identity = %identity
                );
                RecordOutcome::Recorded(record_id)
            }
            Err(err) => {
                let err = WriteError::from(err);
                warn!(event = "visit_write_dropped", collection = %self.collection, error = %err);
                RecordOutcome::Dropped(err)
            }
        }
    }
}
