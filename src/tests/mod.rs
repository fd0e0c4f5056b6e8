//! Crate-level test suites that span several modules.

mod property;
