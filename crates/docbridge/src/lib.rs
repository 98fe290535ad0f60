//! # Docbridge
//!
//! Unified facade over the docbridge document-exchange connector: one
//! [`Connector`] handle bundling the lane registry, PMode configuration
//! lifecycle, message submission, transport steps, evidence correlation
//! and routing, all backed by a shared store.
//!
//! ```no_run
//! use docbridge::{Connector, ConnectorConfig};
//! use docbridge_store::MemoryStore;
//!
//! # async fn demo() {
//! let connector = Connector::new(MemoryStore::new(), ConnectorConfig::default());
//! let lane = connector.lanes().get_default().await.unwrap();
//! # let _ = lane;
//! # }
//! ```
//!
//! ## Key Types
//!
//! - [`Connector`] - The facade; submission and transport status entry points
//! - [`ConnectorConfig`] - Default link partner and routing rule evaluator
//! - [`ConnectorError`] - Aggregate error across all sub-services

//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `docbridge::core` - Domain model (Message, TransportStep, PModeSet, ...)
//! - `docbridge::store` - Storage abstraction, SQLite and in-memory backends
//! - `docbridge::config` - Lane registry, PMode lifecycle, keystores
//! - `docbridge::transport` - Transport steps, evidence, routing

pub mod connector;
pub mod error;

// Re-export component crates
pub use docbridge_config as config;
pub use docbridge_core as core;
pub use docbridge_store as store;
pub use docbridge_transport as transport;

// Re-export main types for convenience
pub use connector::{Connector, ConnectorConfig};
pub use error::{ConnectorError, Result};

// Re-export commonly used core types
pub use docbridge_core::{
    BusinessDomain, Confirmation, ConnectorMessageId, EvidenceType, LaneId, LinkPartnerName,
    Message, MessageDetails, MessageDirection, PModeSet, TransportId, TransportState,
    TransportStep,
};
