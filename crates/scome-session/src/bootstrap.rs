use scome_core::{
    DocumentStore, Flag, FlagError, FlagStore, GateDenied, GateState, HubConfig, Identity,
    IdentityError, IdentityService, PathError, PresentationState, SessionFlags, Tab,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::admin::AdminView;
use crate::aggregator::{VisitAggregator, VisitTotal};
use crate::flags::LocalFlags;
use crate::gate::AccessGate;
use crate::identity::{IdentityAdapter, Subscription};
use crate::recorder::VisitRecorder;

/// Service handles injected into a session.
#[derive(Clone)]
pub struct SessionServices {
    pub identity: Arc<dyn IdentityService>,
    pub documents: Arc<dyn DocumentStore>,
    pub device_flags: Arc<dyn FlagStore>,
    pub session_flags: Arc<dyn FlagStore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupState {
    pub show_onboarding: bool,
}

/// Last identity emission the visit listener finished handling.
type HandledEmission = Option<Option<Identity>>;

/// Owns one session: identity acquisition, onboarding gating, visit
/// recording and the admin view.
pub struct Session {
    identity: Arc<IdentityAdapter>,
    flags: LocalFlags,
    recorder: Arc<VisitRecorder>,
    aggregator: Arc<VisitAggregator>,
    admin_secret: String,
    show_onboarding: bool,
    active_tab: Tab,
    admin: Option<AdminView>,
    started: bool,
    subscription: Option<Subscription>,
    acquisition: Option<JoinHandle<Result<Identity, IdentityError>>>,
    handled_tx: Arc<watch::Sender<HandledEmission>>,
}

impl Session {
    pub fn new(config: &HubConfig, services: SessionServices) -> Result<Self, PathError> {
        let collection = config.visits_collection()?;
        let flags = LocalFlags::new(services.device_flags, services.session_flags);
        let recorder = VisitRecorder::new(
            Arc::clone(&services.documents),
            collection.clone(),
            flags.clone(),
        );
        let aggregator = VisitAggregator::new(
            services.documents,
            collection,
            config.fallback_visit_total,
        );
        let (handled_tx, _) = watch::channel(None);

        Ok(Self {
            identity: Arc::new(IdentityAdapter::new(
                services.identity,
                config.delegated_token.clone(),
            )),
            flags,
            recorder: Arc::new(recorder),
            aggregator: Arc::new(aggregator),
            admin_secret: crate::gate::SHARED_SECRET.to_string(),
            show_onboarding: false,
            active_tab: Tab::default(),
            admin: None,
            started: false,
            subscription: None,
            acquisition: None,
            handled_tx: Arc::new(handled_tx),
        })
    }

    #[cfg(test)]
    fn with_admin_secret(mut self, secret: impl Into<String>) -> Self {
        self.admin_secret = secret.into();
        self
    }

    /// Decides onboarding from the durable flag before anything touches the
    /// network, then wires the visit listener and fires identity acquisition.
    /// Must be called from within a tokio runtime. Later calls only report
    /// the current state.
    pub fn start(&mut self) -> StartupState {
        if self.started {
            return StartupState {
                show_onboarding: self.show_onboarding,
            };
        }
        self.started = true;

        self.show_onboarding = !self.flags.get_flag(Flag::OnboardingSeen);
        debug!(event = "session_start", show_onboarding = self.show_onboarding);

        let recorder = Arc::clone(&self.recorder);
        let handled_tx = Arc::clone(&self.handled_tx);
        self.subscription = Some(self.identity.subscribe(move |identity| {
            let recorder = Arc::clone(&recorder);
            let handled_tx = Arc::clone(&handled_tx);
            async move {
                let outcome = recorder.record_visit_once(identity.as_ref()).await;
                debug!(event = "identity_emission_handled", outcome = ?outcome);
                handled_tx.send_replace(Some(identity));
            }
        }));

        let adapter = Arc::clone(&self.identity);
        self.acquisition = Some(tokio::spawn(async move {
            let result = adapter.acquire().await;
            match &result {
                Ok(identity) => info!(event = "identity_acquired", identity = %identity),
                Err(err) => warn!(event = "identity_acquire_failed", error = %err),
            }
            result
        }));

        StartupState {
            show_onboarding: self.show_onboarding,
        }
    }

    /// Waits for the acquisition attempt to finish and for the visit listener
    /// to catch up with the identity it produced. A hung identity or store
    /// call makes this wait forever.
    pub async fn settle(&mut self) -> Option<Identity> {
        if let Some(task) = self.acquisition.take() {
            if let Err(err) = task.await {
                warn!(event = "identity_task_aborted", error = %err);
            }
        }

        let target = self.identity.current();
        if self.subscription.is_none() {
            return target;
        }
        let mut handled = self.handled_tx.subscribe();
        let _ = handled
            .wait_for(|seen| seen.as_ref() == Some(&target))
            .await;
        target
    }

    pub fn identity(&self) -> Option<Identity> {
        self.identity.current()
    }

    pub fn flags(&self) -> SessionFlags {
        self.flags.snapshot()
    }

    /// One-way for the device: the flag is never lowered by the session.
    pub fn acknowledge_onboarding(&mut self) -> Result<(), FlagError> {
        self.flags.set_flag(Flag::OnboardingSeen, true)?;
        self.show_onboarding = false;
        info!(event = "onboarding_acknowledged");
        Ok(())
    }

    pub fn select_tab(&mut self, tab: Tab) {
        debug!(event = "tab_selected", tab = %tab, label = tab.label());
        self.active_tab = tab;
    }

    /// Every opening starts from a locked gate.
    pub fn open_admin_view(&mut self) {
        if self.admin.is_none() {
            self.admin = Some(AdminView::new(
                AccessGate::new(self.admin_secret.clone()),
                Arc::clone(&self.aggregator),
            ));
        }
    }

    pub async fn submit_passphrase(&mut self, passphrase: &str) -> Result<VisitTotal, GateDenied> {
        self.open_admin_view();
        match self.admin.as_mut() {
            Some(view) => view.submit_passphrase(passphrase).await,
            None => Err(GateDenied),
        }
    }

    pub fn close_admin_view(&mut self) {
        if let Some(mut view) = self.admin.take() {
            view.close();
        }
    }

    pub fn admin_view(&self) -> Option<&AdminView> {
        self.admin.as_ref()
    }

    pub fn gate_state(&self) -> GateState {
        self.admin
            .as_ref()
            .map(AdminView::gate_state)
            .unwrap_or_default()
    }

    pub fn presentation(&self) -> PresentationState {
        PresentationState {
            show_onboarding: self.show_onboarding,
            active_tab: self.active_tab,
            admin_open: self.admin.is_some(),
            gate_state: self.gate_state(),
            visit_total: self.admin.as_ref().and_then(AdminView::visit_total),
            gate_message: self
                .admin
                .as_ref()
                .and_then(AdminView::message)
                .map(str::to_string),
        }
    }

    /// Drops the identity subscription. A pending acquisition keeps running
    /// detached and its result is discarded.
    pub fn shutdown(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        drop(self.acquisition.take());
        debug!(event = "session_shutdown");
    }
}
