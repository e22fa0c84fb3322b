//! Component contract consumed by the composition.
//!
//! A component never owns its slots: they live in the composition's
//! [`SlotGraph`](crate::slot::SlotGraph) and are reached through a
//! [`Context`] handed to every phase call.
pub mod context;

pub use context::{ComponentIo, Context, RunEnv};

use crate::error::Result;
use crate::time::SimTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentStatus {
    Created,
    Initialized,
    Connecting,
    ConnectingIdle,
    Connected,
    Validated,
    Updated,
    Finished,
    Finalized,
    Failed,
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentStatus::Created => "CREATED",
            ComponentStatus::Initialized => "INITIALIZED",
            ComponentStatus::Connecting => "CONNECTING",
            ComponentStatus::ConnectingIdle => "CONNECTING_IDLE",
            ComponentStatus::Connected => "CONNECTED",
            ComponentStatus::Validated => "VALIDATED",
            ComponentStatus::Updated => "UPDATED",
            ComponentStatus::Finished => "FINISHED",
            ComponentStatus::Finalized => "FINALIZED",
            ComponentStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

impl ComponentStatus {
    /// The further advanced of two connect outcomes of the same round.
    pub fn max_connect_progress(self, other: Self) -> Self {
        let rank = |s: Self| match s {
            ComponentStatus::Connected => 2,
            ComponentStatus::Connecting => 1,
            _ => 0,
        };
        if rank(other) > rank(self) { other } else { self }
    }
}

/// Phase interface of a coupled component.
///
/// Implementors set their own status in every phase call; the composition
/// checks it against the states allowed for that phase.
pub trait Component {
    fn name(&self) -> &str;
    fn status(&self) -> ComponentStatus;

    /// Declares slots through `cx`. The slot maps are frozen afterwards.
    fn initialize(&mut self, cx: &mut Context) -> Result<()>;
    /// One connect attempt. Called until the status is `Connected`.
    fn connect(&mut self, cx: &mut Context, start: Option<SimTime>) -> Result<()>;
    fn validate(&mut self, cx: &mut Context) -> Result<()>;
    fn update(&mut self, cx: &mut Context) -> Result<()>;
    fn finalize(&mut self, cx: &mut Context) -> Result<()>;

    /// Called for notifying inputs after their source pushed new data.
    fn source_changed(&mut self, _cx: &mut Context, _input: &str, _time: SimTime) -> Result<()> {
        Ok(())
    }

    /// Current simulation time; `None` for push-driven components.
    fn time(&self) -> Option<SimTime> { None }
    fn next_time(&self) -> Option<SimTime> { None }

    fn is_time_component(&self) -> bool { self.time().is_some() }

    fn metadata(&self) -> serde_json::Value { serde_json::Value::Null }
}
