//! Slot payloads and their descriptors.
pub mod domain;
pub mod info;
pub mod kernel;
pub mod mask;
pub mod units;
pub mod value;

pub use domain::{Domain, DomainRef, DomainTransform, NoDomain, UniformGrid};
pub use info::Info;
pub use mask::Mask;
pub use units::Unit;
pub use value::{Shape, Value};
