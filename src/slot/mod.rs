//! Slot protocol: inputs, outputs and the graph linking them.
pub mod input;
pub mod output;
pub mod registry;
pub mod types;

pub use input::{Conversion, InputSlot};
pub use output::{OutputSlot, PullFn};
pub use registry::{Slot, SlotGraph};
pub use types::{ComponentId, InputSpec, Notification, OutputSpec, SlotId, SlotKind};
