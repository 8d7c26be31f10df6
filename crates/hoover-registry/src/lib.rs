//! Registry backends for hoover.
//!
//! Provides implementations of [`hoover_core::RegistryClient`]:
//! - Harbor v2 REST API

pub mod harbor;
pub mod wire;

pub use harbor::{HarborClient, HarborConfig};
pub use hoover_core::registry::{RegistryClient, Repository};
