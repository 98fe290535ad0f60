//! # Docbridge Store
//!
//! Persistence abstraction for the docbridge connector. Each persistence
//! concern (lanes, messages, evidences, transport steps, PMode sets,
//! keystores, routing rules) is a separate async trait, so service crates
//! depend only on the capabilities they use.
//!
//! The primary implementation is [`SqliteStore`] (rusqlite, bundled),
//! with [`MemoryStore`] for tests. Both implement every trait;
//! [`ConnectorStore`] bundles them for the facade.
//!
//! ## Design Notes
//!
//! - The message aggregate is stored as one JSON snapshot; related
//!   confirmations are kept in the evidence table only and rebuilt on load.
//! - Transport steps are keyed by (message id, link partner, attempt);
//!   creating a step is insert-only, while folding in status updates is
//!   an upsert that replaces the history wholesale.
//! - Activating a PMode set deactivates the lane's previous active set in
//!   the same transaction.

pub mod error;
pub mod memory;
pub mod migration;
pub mod payload;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use payload::{FsLargeFileStorage, MemoryLargeFileStorage};
pub use sqlite::SqliteStore;
pub use traits::{
    ConnectorStore, EvidenceStore, KeystoreStore, LaneStore, LargeFileStorage, MessageStore,
    PModeSetStore, RoutingRuleStore, TransportStepStore,
};
