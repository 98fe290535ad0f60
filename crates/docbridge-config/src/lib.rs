//! # Docbridge Config
//!
//! Configuration services for the docbridge connector: the lane registry
//! with default-lane bootstrap, the versioned PMode set lifecycle, trust
//! store management and the PMode document import seam.
//!
//! ## Key Types
//!
//! - [`LaneRegistry`] - Lane lookup with idempotent default-lane bootstrap
//! - [`PModeService`] - Activation, catalog mutation and import of PMode sets
//! - [`KeystoreService`] - Uploaded trust stores, addressed by uuid
//! - [`PModeImportParser`] - Seam for the uploaded document format

pub mod error;
pub mod import;
pub mod keystore;
pub mod lanes;
pub mod pmode;

pub use error::{ConfigError, Result};
pub use import::{ImportedPModes, PModeImportParser};
pub use keystore::KeystoreService;
pub use lanes::LaneRegistry;
pub use pmode::PModeService;
