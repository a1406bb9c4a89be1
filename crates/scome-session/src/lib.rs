//! Session runtime for the SCOME hub: acquires an identity, records one visit
//! per session, gates onboarding on a durable device flag and puts the visit
//! dashboard behind the core-team passphrase.

pub mod admin;
pub mod aggregator;
pub mod bootstrap;
pub mod flags;
pub mod gate;
pub mod identity;
pub mod recorder;

#[cfg(test)]
mod testing;

pub use admin::AdminView;
pub use aggregator::{TotalSource, VisitAggregator, VisitTotal};
pub use bootstrap::{Session, SessionServices, StartupState};
pub use flags::LocalFlags;
pub use gate::{AccessGate, GateTransition, SHARED_SECRET};
pub use identity::{IdentityAdapter, LocalIdentityService, Subscription};
pub use recorder::{RecordOutcome, VisitRecorder};
