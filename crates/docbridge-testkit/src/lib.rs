//! # Docbridge Testkit
//!
//! Testing utilities for the docbridge connector.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: A ready-made connector over an in-memory store with an
//!   active configuration catalog, plus message and confirmation makers
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! Quickly set up test scenarios:
//!
//! ```rust,ignore
//! use docbridge_testkit::fixtures::{business_message, TestFixture};
//!
//! let fixture = TestFixture::ready().await;
//! let step = fixture
//!     .connector
//!     .submit_message(&fixture.lane, business_message("msg1"))
//!     .await?;
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use docbridge_testkit::generators::{step_from_params, StepParams};
//!
//! proptest! {
//!     #[test]
//!     fn transport_id_is_deterministic(params: StepParams) {
//!         let s1 = step_from_params(&params);
//!         let s2 = step_from_params(&params);
//!         prop_assert_eq!(s1.transport_id(), s2.transport_id());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    business_message, catalog_details, catalog_set, delivery_confirmation, evidence_message,
    fixture_keystore, TestFixture, FIXTURE_STORE_UUID,
};
pub use generators::{step_from_params, StepParams};
