use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use scome_core::{
    CollectionPath, Document, DocumentStore, FlagStore, GateState, HubConfig, Identity,
    IdentityError, IdentityService, RecordId, StoreError, StoredDocument, VisitRecord,
};
use scome_session::{
    LocalIdentityService, Session, SessionServices, TotalSource, VisitAggregator, SHARED_SECRET,
};
use scome_storage::{DeviceFlagStore, SessionFlagStore, SqliteDocumentStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::sync::watch;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Behaviour {
    SignIn,
    Reject,
    Hang,
}

struct ScriptedIdentityService {
    behaviour: Behaviour,
    state: watch::Sender<Option<Identity>>,
    calls: AtomicUsize,
}

impl ScriptedIdentityService {
    fn new(behaviour: Behaviour) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            behaviour,
            state,
            calls: AtomicUsize::new(0),
        }
    }

    fn emit(&self, identity: Option<Identity>) {
        self.state.send_replace(identity);
    }

    async fn acquire(&self, identity: Identity) -> Result<Identity, IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::SignIn => {
                self.emit(Some(identity.clone()));
                Ok(identity)
            }
            Behaviour::Reject => Err(IdentityError::Unavailable(
                "simulated network failure".to_string(),
            )),
            Behaviour::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl IdentityService for ScriptedIdentityService {
    async fn acquire_delegated(&self, token: &str) -> Result<Identity, IdentityError> {
        self.acquire(Identity::delegated(token)).await
    }

    async fn acquire_anonymous(&self) -> Result<Identity, IdentityError> {
        self.acquire(Identity::anonymous("anon-1")).await
    }

    fn on_auth_state_changed(&self) -> watch::Receiver<Option<Identity>> {
        self.state.subscribe()
    }
}

/// Accepts appends but never completes them.
struct StalledStore {
    appends: watch::Sender<usize>,
}

impl StalledStore {
    fn new() -> Self {
        let (appends, _) = watch::channel(0);
        Self { appends }
    }

    fn append_calls(&self) -> usize {
        *self.appends.borrow()
    }
}

#[async_trait]
impl DocumentStore for StalledStore {
    async fn append(
        &self,
        _collection: &CollectionPath,
        _document: Document,
    ) -> Result<RecordId, StoreError> {
        self.appends.send_modify(|count| *count += 1);
        std::future::pending().await
    }

    async fn query_all(
        &self,
        _collection: &CollectionPath,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        Ok(Vec::new())
    }
}

fn visits() -> CollectionPath {
    HubConfig::default().visits_collection().expect("path")
}

fn services(
    identity: Arc<dyn IdentityService>,
    documents: Arc<SqliteDocumentStore>,
    device_flags: Arc<dyn FlagStore>,
) -> SessionServices {
    SessionServices {
        identity,
        documents,
        device_flags,
        session_flags: Arc::new(SessionFlagStore::new()),
    }
}

#[tokio::test]
async fn repeated_identity_emissions_record_one_visit() {
    let identity = Arc::new(ScriptedIdentityService::new(Behaviour::SignIn));
    let documents = Arc::new(SqliteDocumentStore::open_in_memory().expect("docs"));
    let device = Arc::new(DeviceFlagStore::open_in_memory().expect("flags"));
    let mut session = Session::new(
        &HubConfig::default(),
        services(identity.clone(), documents.clone(), device),
    )
    .expect("session");

    session.start();
    session.settle().await;

    identity.emit(None);
    session.settle().await;
    identity.emit(Some(Identity::anonymous("anon-2")));
    session.settle().await;
    identity.emit(Some(Identity::delegated("core-team")));
    session.settle().await;

    assert_eq!(documents.documents(&visits()).expect("read").len(), 1);
    assert!(session.flags().visit_logged);
    session.shutdown();
}

#[tokio::test]
async fn identity_failure_leaves_visit_unlogged_until_a_later_emission() {
    let identity = Arc::new(ScriptedIdentityService::new(Behaviour::Reject));
    let documents = Arc::new(SqliteDocumentStore::open_in_memory().expect("docs"));
    let device = Arc::new(DeviceFlagStore::open_in_memory().expect("flags"));
    let mut session = Session::new(
        &HubConfig::default(),
        services(identity.clone(), documents.clone(), device),
    )
    .expect("session");

    session.start();
    assert_eq!(session.settle().await, None);
    assert_eq!(identity.calls.load(Ordering::SeqCst), 1);
    assert!(!session.flags().visit_logged);
    assert!(documents.documents(&visits()).expect("read").is_empty());

    identity.emit(Some(Identity::anonymous("late-anon")));
    assert_eq!(
        session.settle().await,
        Some(Identity::anonymous("late-anon"))
    );
    assert!(session.flags().visit_logged);
    assert_eq!(documents.documents(&visits()).expect("read").len(), 1);
    assert_eq!(identity.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stalled_visit_write_leaves_flag_unset_and_is_not_repeated() {
    let identity = Arc::new(ScriptedIdentityService::new(Behaviour::SignIn));
    let store = Arc::new(StalledStore::new());
    let mut session = Session::new(
        &HubConfig::default(),
        SessionServices {
            identity: identity.clone(),
            documents: store.clone(),
            device_flags: Arc::new(DeviceFlagStore::open_in_memory().expect("flags")),
            session_flags: Arc::new(SessionFlagStore::new()),
        },
    )
    .expect("session");

    session.start();
    let mut appends = store.appends.subscribe();
    appends
        .wait_for(|count| *count >= 1)
        .await
        .expect("first append started");

    identity.emit(Some(Identity::anonymous("anon-2")));
    identity.emit(Some(Identity::delegated("core-team")));
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert_eq!(store.append_calls(), 1);
    assert!(!session.flags().visit_logged);
    session.shutdown();
}

#[tokio::test]
async fn onboarding_is_shown_once_per_device_without_network() {
    let db_file = NamedTempFile::new().expect("temp db");
    let documents = Arc::new(SqliteDocumentStore::open_in_memory().expect("docs"));

    {
        let identity = Arc::new(ScriptedIdentityService::new(Behaviour::Hang));
        let device = Arc::new(DeviceFlagStore::open(db_file.path()).expect("flags"));
        let mut session = Session::new(
            &HubConfig::default(),
            services(identity, documents.clone(), device),
        )
        .expect("session");

        assert!(session.start().show_onboarding);
        assert!(session.presentation().show_onboarding);

        session.acknowledge_onboarding().expect("ack");
        assert!(!session.presentation().show_onboarding);
        session.shutdown();
    }

    let device = Arc::new(DeviceFlagStore::open(db_file.path()).expect("reopen flags"));
    assert_eq!(device.get("onboarding_seen").expect("get"), Some(true));

    let identity = Arc::new(ScriptedIdentityService::new(Behaviour::Hang));
    let mut restarted = Session::new(
        &HubConfig::default(),
        services(identity, documents.clone(), device),
    )
    .expect("session");
    assert!(!restarted.start().show_onboarding);
    assert!(!restarted.flags().visit_logged);
    assert!(documents.documents(&visits()).expect("read").is_empty());
    restarted.shutdown();
}

#[tokio::test]
async fn fetch_total_counts_three_distinct_visits() {
    let documents = Arc::new(SqliteDocumentStore::open_in_memory().expect("docs"));
    for hour in [9, 10, 11] {
        let ts = Utc
            .with_ymd_and_hms(2025, 12, 3, hour, 0, 0)
            .single()
            .expect("valid timestamp");
        documents
            .append(&visits(), VisitRecord::at(ts).to_document())
            .await
            .expect("append");
    }

    let aggregator = VisitAggregator::new(documents, visits(), None);
    assert_eq!(aggregator.fetch_total().await.expect("fetch"), 3);
}

#[tokio::test]
async fn sessions_on_one_device_each_count_once_and_unlock_the_dashboard() {
    let dir = tempfile::tempdir().expect("temp dir");
    let documents = Arc::new(
        SqliteDocumentStore::open(dir.path().join("documents.sqlite")).expect("docs"),
    );
    let flags_path = dir.path().join("device.sqlite");
    let config = HubConfig::default().with_fallback_visit_total(Some(142));

    for _ in 0..2 {
        let identity = Arc::new(LocalIdentityService::new(&config.service.api_key));
        let device = Arc::new(DeviceFlagStore::open(&flags_path).expect("flags"));
        let mut session =
            Session::new(&config, services(identity, documents.clone(), device)).expect("session");
        session.start();
        session.settle().await.expect("identity");
        session.shutdown();
    }

    let identity = Arc::new(LocalIdentityService::new(&config.service.api_key));
    let device = Arc::new(DeviceFlagStore::open(&flags_path).expect("flags"));
    let mut session =
        Session::new(&config, services(identity, documents.clone(), device)).expect("session");
    session.start();
    session.settle().await.expect("identity");

    session.open_admin_view();
    assert!(session.submit_passphrase("not it").await.is_err());
    assert_eq!(session.gate_state(), GateState::Locked);

    let total = session
        .submit_passphrase(SHARED_SECRET)
        .await
        .expect("unlock");
    assert_eq!(total.source, TotalSource::Fresh);
    assert_eq!(total.value, Some(3));
    assert_eq!(session.presentation().gate_state, GateState::Unlocked);

    session.close_admin_view();
    assert_eq!(session.gate_state(), GateState::Locked);
    assert!(!session.presentation().admin_open);
}
