//! Core engine: dedup store, alert evaluation, the per-cycle pipeline and
//! the session lifecycle controller that drives it.

pub mod store;
pub mod evaluator;
pub mod pipeline;
pub mod controller;
