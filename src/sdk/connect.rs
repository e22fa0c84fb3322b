//! Connect-phase view handed to [`Model::connect`](super::Model::connect).
use crate::component::{ComponentStatus, Context};
use crate::data::{Info, Value};
use crate::error::Result;
use crate::negotiate::{Negotiator, Offer};
use crate::time::SimTime;

pub struct ConnectCx<'c, 'g> {
    pub cx: &'c mut Context<'g>,
    negotiator: &'c mut Negotiator,
    start: Option<SimTime>,
}

impl<'c, 'g> ConnectCx<'c, 'g> {
    pub(crate) fn new(cx: &'c mut Context<'g>, negotiator: &'c mut Negotiator, start: Option<SimTime>) -> Self {
        Self { cx, negotiator, start }
    }

    /// Time used for connect-phase pushes and pulls.
    pub fn start(&self) -> Option<SimTime> { self.start }

    /// Runs one negotiation round with what the model can offer now.
    pub fn try_connect(&mut self, offer: Offer) -> Result<ComponentStatus> {
        self.negotiator.connect(self.cx.graph, self.start, offer)
    }

    pub fn in_info(&self, input: &str) -> Option<&Info> { self.negotiator.in_info(input) }
    pub fn in_data(&self, input: &str) -> Option<&Value> { self.negotiator.in_data(input) }
    pub fn out_info(&self, output: &str) -> Option<&Info> { self.negotiator.out_info(output) }
}
