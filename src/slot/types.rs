use crate::time::SimTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of a slot (input, output or adapter) in the [`SlotGraph`](super::SlotGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SlotId(pub u32);

impl SlotId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// Handle of a component: its declaration index in the composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ComponentId(pub u32);

impl ComponentId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotKind {
    Input,
    Output,
    Adapter,
}

/// Declaration options of an input slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputSpec {
    /// Caches the first pulled value and never pulls again.
    pub is_static: bool,
    /// Forwards source changes to the owning component.
    pub notifying: bool,
}

impl InputSpec {
    pub fn new() -> Self { Self::default() }
    pub fn static_() -> Self { Self { is_static: true, ..Self::default() } }
    pub fn notifying() -> Self { Self { notifying: true, ..Self::default() } }
}

/// Declaration options of an output slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputSpec {
    /// Accepts exactly one push and serves it for every time.
    pub is_static: bool,
}

impl OutputSpec {
    pub fn new() -> Self { Self::default() }
    pub fn static_() -> Self { Self { is_static: true } }
}

/// A source change addressed to a component input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub component: ComponentId,
    pub input: SlotId,
    pub time: SimTime,
}
