//! # Docbridge Transport
//!
//! Transport-side services of the docbridge connector: the transport
//! step machine with sequential attempt assignment, evidence correlation
//! against persisted business messages, and routing rule resolution.
//!
//! ## Key Types
//!
//! - [`TransportStepService`] - Opens delivery attempts and folds status updates
//! - [`EvidenceService`] - Correlates confirmations with business messages
//! - [`RoutingService`] - Picks the link partner for outbound messages
//! - [`RoutingRuleEvaluator`] - Seam for interpreting rule match clauses

pub mod error;
pub mod evidence;
pub mod routing;
pub mod steps;

pub use error::{Result, TransportError};
pub use evidence::EvidenceService;
pub use routing::{RoutingRuleEvaluator, RoutingService};
pub use steps::TransportStepService;
