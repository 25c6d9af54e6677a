//! # Custom Resource Definitions
//!
//! CRD types for the qust operator.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `Qliksense` resource, its spec and the name/value entries
//! - `keys.rs` - key rotation policy

mod keys;
mod spec;

pub use keys::KeysAction;
pub use spec::{CrSpec, NameValue, NameValues, Qliksense, SecretKeyRef, ValueFrom};
