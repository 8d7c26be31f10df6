//! Core domain types and traits for hoover, the registry artifact cleaner.
//!
//! This crate contains:
//! - Artifact metadata as fetched from a registry
//! - Retention policy and the policy evaluator
//! - Repository scoping rules
//! - The registry client contract
//! - Run results and per-artifact decision records

pub mod artifact;
pub mod decision;
pub mod error;
pub mod filter;
pub mod id;
pub mod policy;
pub mod registry;
pub mod result;

pub use artifact::Artifact;
pub use decision::{AgeBasis, Decision, DecisionKind};
pub use error::{Error, Result};
pub use filter::RepositoryFilter;
pub use id::RunId;
pub use policy::{MissingAgePolicy, Policy, TagPattern, evaluate};
pub use registry::{RegistryClient, Repository};
pub use result::{ActionOutcome, DecisionRecord, RepositoryFailure, RunResult, RunStats};
