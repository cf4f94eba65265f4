#![forbid(unsafe_code)]

//! # discernus
//!
//! Validation and fitness scoring for discourse-analysis frameworks.
//!
//! A framework positions rhetorical anchors on a map and groups them into
//! bipolar axes; an experiment binds a framework to a model roster and a
//! corpus. This crate validates both documents fail-fast, scores corpus
//! documents against the framework's anchors through an LLM gateway, and
//! measures how well the resulting signature geometry uses its territory:
//! coverage, anchor independence, cartographic resolution, and a composite
//! graded fitness score. Structural validators raise typed errors; metric
//! computations never fail, degrading to zeroed results with attached
//! errors and warnings instead.

pub mod document;
pub mod error;
pub mod experiment;
pub mod framework;
pub mod gateway;
pub mod metrics;
pub mod prompts;
pub mod registry;
pub mod runner;

mod value;

pub use document::{extract_appendix, parse_document, DocumentError};
pub use error::ValidationError;
pub use experiment::{validate_experiment, NormalizedExperiment};
pub use framework::{validate_framework, Anchor, AxisSpec, NormalizedFramework};
pub use gateway::{CallMetadata, GatewayError, OpenRouterGateway, RetryingGateway, ScoringGateway};
pub use metrics::fitness::{framework_fitness_score, FitnessGrade, FitnessScore};
pub use registry::{validate_hybrid_architecture, HybridArchitectureReport};
pub use runner::{CorpusDocument, ExperimentReport, ExperimentRunner, RunnerConfig, RunnerError};
