//! Builders to construct schedulers and registries from configuration.

pub mod pool_builder;

pub use pool_builder::{build_registry, build_scheduler};
