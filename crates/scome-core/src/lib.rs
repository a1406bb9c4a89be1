//! Contracts shared by the SCOME hub session runtime: identities, the
//! document-store seam, visit records, local flags and the state handed to
//! the presentation layer.

pub mod config;
pub mod document;
pub mod flags;
pub mod identity;
pub mod view;
pub mod visit;

pub use config::{ConfigError, HubConfig, ServiceConfig, DEFAULT_APP_NAMESPACE};
pub use document::{
    CollectionPath, Document, DocumentStore, FieldValue, PathError, RecordId, StoreError,
    StoredDocument,
};
pub use flags::{Flag, FlagError, FlagScope, FlagStore, SessionFlags};
pub use identity::{
    issue_delegated_token, verify_delegated_token, Identity, IdentityError, IdentityService,
};
pub use view::{GateDenied, GateState, PresentationState, Tab};
pub use visit::{FetchError, VisitAggregate, VisitRecord, WriteError};

use sha2::{Digest, Sha256};

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut output = String::with_capacity(digest.len() * 2);
    for byte in digest {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}
