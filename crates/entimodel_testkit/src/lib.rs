//! # EntiModel Testkit
//!
//! Test utilities for EntiModel.
//!
//! This crate provides:
//! - Temporary projects with a model file and a fixed uid seed
//! - Schema builders for common shapes
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use entimodel_testkit::prelude::*;
//!
//! #[test]
//! fn survives_a_second_run() {
//!     let project = TestProject::new();
//!     project.run(&task_schema()).unwrap();
//!     assert!(project.run(&task_schema()).unwrap().report.is_empty());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
