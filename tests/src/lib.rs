//! # Tessera Test Suite
//!
//! Unified test crate containing the cross-facet flows the per-crate unit
//! tests cannot cover alone.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── dispatch_flows.rs   # Cut protocol, routing, guard, atomicity
//!     └── platform_flows.rs   # Business flows spanning several facets
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p tessera-tests
//!
//! # By category
//! cargo test -p tessera-tests integration::dispatch_flows::
//! cargo test -p tessera-tests integration::platform_flows::
//! ```

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
