//! Generic reusable components.
pub mod callback;
pub mod debug;
pub mod generators;

pub use callback::CallbackComponent;
pub use debug::{DebugConsumer, Record, Records};
pub use generators::{Generator, StaticSource};
