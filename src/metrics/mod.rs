//! Numeric fitness and design metrics over signature matrices.
//!
//! Everything in this layer is fail-soft: malformed or degenerate input
//! never panics and never raises. Functions return zeroed result structs
//! with populated `errors`/`warnings` arrays so a single bad framework does
//! not abort a batch evaluation. Callers must treat a 0.0 score paired with
//! a non-empty diagnostics array as "uncomputable", not as a low score.

pub mod fitness;
pub mod orthogonal;

mod stats;
