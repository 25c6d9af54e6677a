//! # Controller
//!
//! Orchestration of a render pass: the key lifecycle and the pipeline that
//! runs every patch renderer around it.

pub mod key_lifecycle;
pub mod pipeline;

pub use key_lifecycle::{FinalizeOutcome, KeyLifecycle, KeySource, ResolvedEjsonKeys};
pub use pipeline::{render_all_patches, RenderSummary};
