//! Scheduling of coupled components.
pub mod composition;
pub mod config;
pub mod metadata;
pub mod topology;
pub mod validation;

pub use composition::{Composition, Link};
pub use config::CompositionConfig;
pub use validation::GraphValidator;
