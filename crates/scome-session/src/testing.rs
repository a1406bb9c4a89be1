use async_trait::async_trait;
use scome_core::{
    CollectionPath, Document, DocumentStore, FlagError, FlagStore, Identity, IdentityError,
    IdentityService, RecordId, StoreError, StoredDocument,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;

#[derive(Default)]
pub struct MemoryFlags {
    values: Mutex<BTreeMap<String, bool>>,
}

impl FlagStore for MemoryFlags {
    fn get(&self, key: &str) -> Result<Option<bool>, FlagError> {
        Ok(self.values.lock().expect("lock").get(key).copied())
    }

    fn set(&self, key: &str, value: bool) -> Result<(), FlagError> {
        self.values
            .lock()
            .expect("lock")
            .insert(key.to_string(), value);
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), FlagError> {
        self.values.lock().expect("lock").remove(key);
        Ok(())
    }
}

pub struct BrokenFlagStore;

impl FlagStore for BrokenFlagStore {
    fn get(&self, _key: &str) -> Result<Option<bool>, FlagError> {
        Err(FlagError::Unavailable("disk gone".to_string()))
    }

    fn set(&self, key: &str, _value: bool) -> Result<(), FlagError> {
        Err(FlagError::Write {
            key: key.to_string(),
            reason: "disk gone".to_string(),
        })
    }

    fn clear(&self, _key: &str) -> Result<(), FlagError> {
        Err(FlagError::Unavailable("disk gone".to_string()))
    }
}

/// Document store that counts calls and can be told to fail.
#[derive(Default)]
pub struct CountingStore {
    documents: Mutex<Vec<(CollectionPath, StoredDocument)>>,
    append_calls: AtomicUsize,
    query_calls: AtomicUsize,
    fail_appends: AtomicBool,
    fail_queries: AtomicBool,
}

impl CountingStore {
    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> usize {
        self.documents.lock().expect("lock").len()
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    async fn append(
        &self,
        collection: &CollectionPath,
        document: Document,
    ) -> Result<RecordId, StoreError> {
        let call = self.append_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated outage".to_string()));
        }
        let id = RecordId(format!("rec-{call}"));
        let resolved = document.resolve_server_timestamps(chrono::Utc::now());
        self.documents.lock().expect("lock").push((
            collection.clone(),
            StoredDocument {
                id: id.clone(),
                fields: resolved.fields,
            },
        ));
        Ok(id)
    }

    async fn query_all(
        &self,
        collection: &CollectionPath,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("simulated outage".to_string()));
        }
        Ok(self
            .documents
            .lock()
            .expect("lock")
            .iter()
            .filter(|(path, _)| path == collection)
            .map(|(_, document)| document.clone())
            .collect())
    }
}

/// Identity service whose emissions are driven by the test.
pub struct ScriptedIdentity {
    state: watch::Sender<Option<Identity>>,
    fail: AtomicBool,
    acquire_calls: AtomicUsize,
}

impl ScriptedIdentity {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state,
            fail: AtomicBool::new(false),
            acquire_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        let service = Self::new();
        service.fail.store(true, Ordering::SeqCst);
        service
    }

    pub fn emit(&self, identity: Option<Identity>) {
        self.state.send_replace(identity);
    }

    pub fn acquire_calls(&self) -> usize {
        self.acquire_calls.load(Ordering::SeqCst)
    }

    fn acquire(&self, identity: Identity) -> Result<Identity, IdentityError> {
        self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(IdentityError::Unavailable(
                "simulated network failure".to_string(),
            ));
        }
        self.emit(Some(identity.clone()));
        Ok(identity)
    }
}

#[async_trait]
impl IdentityService for ScriptedIdentity {
    async fn acquire_delegated(&self, token: &str) -> Result<Identity, IdentityError> {
        self.acquire(Identity::delegated(format!("uid-{token}")))
    }

    async fn acquire_anonymous(&self) -> Result<Identity, IdentityError> {
        self.acquire(Identity::anonymous("anon-1"))
    }

    fn on_auth_state_changed(&self) -> watch::Receiver<Option<Identity>> {
        self.state.subscribe()
    }
}
