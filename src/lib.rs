//! qust operator library
//!
//! Renders `Qliksense` custom resources into kustomize overlay patches under
//! `<manifestsRoot>/.operator` and manages the ejson and application key
//! material those patches reference.
//!
//! ## Quick Start
//!
//! ```rust
//! use qust_operator::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod ejson;
pub mod error;
pub mod keys;
pub mod observability;
pub mod prelude;
pub mod qust;
pub mod resolver;
pub mod state;
