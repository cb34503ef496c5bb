//! # KSI Testkit
//!
//! Testing utilities for the KSI crates.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: An in-memory KSI deployment wired into a [`ksi::Ksi`] client
//! - **Generators**: Proptest strategies for hashes, links, chains and outcomes
//! - **Golden vectors**: Publication codes with known encodings
//!
//! ## Test Fixtures
//!
//! ```rust
//! use ksi_testkit::fixtures::{document_hashes, TestInfrastructure};
//!
//! let infra = TestInfrastructure::new();
//! let ksi = infra.ksi();
//! let signature = ksi.sign(&document_hashes(1)[0]).unwrap();
//! infra.publish_after(60);
//! let extended = ksi.extend(&signature).unwrap();
//! assert!(extended.is_extended());
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use ksi_testkit::generators::publication_data;
//!
//! proptest! {
//!     #[test]
//!     fn code_round_trips(data in publication_data()) {
//!         prop_assert_eq!(data.format().parse::<ksi::PublicationData>().unwrap(), data);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{document_hashes, init_tracing, TestInfrastructure, START_TIME};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
