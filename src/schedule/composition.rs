//! The composition: owns all components and the slot graph, and drives the
//! run phases initialize -> connect -> validate -> run -> finalize.
//!
//! Every phase call is followed by a status check and by draining the
//! notification queue of the slot graph into `source_changed` calls.

use super::config::CompositionConfig;
use super::topology::{cycles_among, dependency_graph, upstream_dependencies};
use super::validation::GraphValidator;
use crate::adapter::AdapterKind;
use crate::component::{Component, ComponentIo, ComponentStatus, Context, RunEnv};
use crate::error::{CouplingError, Result};
use crate::slot::{ComponentId, SlotGraph, SlotId};
use crate::time::SimTime;
use tracing::{debug, debug_span, error, info, info_span, trace, warn, Span};

use ComponentStatus::*;

pub(super) struct Entry {
    pub(super) component: Box<dyn Component>,
    pub(super) io: ComponentIo,
    pub(super) updates: usize,
}

pub struct Composition {
    pub(super) config: CompositionConfig,
    pub(super) graph: SlotGraph,
    pub(super) env: RunEnv,
    pub(super) entries: Vec<Entry>,
    initialized: bool,
    connected: bool,
    span: Span,
}

/// Left-to-right wiring helper returned by [`Composition::link`].
pub struct Link<'a> {
    graph: &'a mut SlotGraph,
    at: SlotId,
}

impl<'a> Link<'a> {
    /// Chains the current slot to `target` and continues from `target`.
    pub fn to(self, target: SlotId) -> Result<Link<'a>> {
        let at = self.graph.chain(self.at, target)?;
        Ok(Link { graph: self.graph, at })
    }

    pub fn id(&self) -> SlotId { self.at }
}

impl Composition {
    pub fn new(components: Vec<Box<dyn Component>>) -> Result<Self> {
        Self::with_config(components, CompositionConfig::default())
    }

    pub fn with_config(components: Vec<Box<dyn Component>>, config: CompositionConfig) -> Result<Self> {
        let mut graph = SlotGraph::new();
        let mut entries: Vec<Entry> = Vec::with_capacity(components.len());
        for component in components {
            if entries.iter().any(|e| e.component.name() == component.name()) {
                return Err(CouplingError::Config(format!("duplicate component name '{}'", component.name())));
            }
            graph.register_component(component.name());
            entries.push(Entry { component, io: ComponentIo::new(), updates: 0 });
        }
        let span = info_span!("composition", name = %config.name);
        let env = RunEnv { name: config.name.clone(), start: None, end: None };
        Ok(Self { config, graph, env, entries, initialized: false, connected: false, span })
    }

    // --- Access ---

    pub fn graph(&self) -> &SlotGraph { &self.graph }
    pub fn env(&self) -> &RunEnv { &self.env }
    pub fn is_connected(&self) -> bool { self.connected }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.entries
            .iter()
            .position(|e| e.component.name() == name)
            .ok_or_else(|| CouplingError::Config(format!("no component named '{}'", name)))
    }

    pub fn component(&self, name: &str) -> Result<&dyn Component> {
        Ok(self.entries[self.index_of(name)?].component.as_ref())
    }

    pub fn status(&self, name: &str) -> Result<ComponentStatus> { Ok(self.component(name)?.status()) }

    /// Number of scheduler-driven `update` calls of a component.
    pub fn update_count(&self, name: &str) -> Result<usize> { Ok(self.entries[self.index_of(name)?].updates) }

    // --- Wiring ---

    pub fn output(&self, component: &str, name: &str) -> Result<SlotId> {
        let entry = &self.entries[self.index_of(component)?];
        entry.io.outputs.get(name).copied().ok_or_else(|| {
            CouplingError::Config(format!("component '{}' has no output '{}'", component, name))
        })
    }

    pub fn input(&self, component: &str, name: &str) -> Result<SlotId> {
        let entry = &self.entries[self.index_of(component)?];
        entry.io.inputs.get(name).copied().ok_or_else(|| {
            CouplingError::Config(format!("component '{}' has no input '{}'", component, name))
        })
    }

    pub fn adapter(&mut self, name: &str, kind: AdapterKind) -> SlotId { self.graph.add_adapter(name, kind) }

    /// Adds an adapter that is ignored by dependency resolution and deadlock reporting.
    pub fn adapter_without_dependency(&mut self, name: &str, kind: AdapterKind) -> Result<SlotId> {
        let id = self.graph.add_adapter(name, kind);
        self.graph.set_breaks_dependency(id)?;
        Ok(id)
    }

    /// Adds an adapter that may feed only a single chain of consumers.
    pub fn single_consumer_adapter(&mut self, name: &str, kind: AdapterKind) -> Result<SlotId> {
        let id = self.graph.add_adapter(name, kind);
        self.graph.set_no_branch(id)?;
        Ok(id)
    }

    pub fn link(&mut self, from: SlotId) -> Link<'_> { Link { graph: &mut self.graph, at: from } }

    // --- Phase plumbing ---

    fn check_status(&self, idx: usize, expected: &[ComponentStatus]) -> Result<()> {
        let component = &self.entries[idx].component;
        let actual = component.status();
        if expected.contains(&actual) {
            return Ok(());
        }
        Err(CouplingError::Status { component: component.name().to_string(), actual, expected: expected.to_vec() })
    }

    /// Runs one phase call of component `idx` and delivers resulting notifications.
    fn call<F>(&mut self, idx: usize, phase: &'static str, f: F) -> Result<()>
    where
        F: FnOnce(&mut dyn Component, &mut Context) -> Result<()>,
    {
        {
            let entry = &mut self.entries[idx];
            let _span = debug_span!("component", name = %entry.component.name(), phase).entered();
            let mut cx = Context::new(&mut self.graph, &self.env, ComponentId::new(idx), &mut entry.io);
            f(entry.component.as_mut(), &mut cx)?;
        }
        self.drain_notifications()
    }

    fn drain_notifications(&mut self) -> Result<()> {
        while let Some(n) = self.graph.pop_notification() {
            let idx = n.component.index();
            let input = self.graph.input(n.input)?.name.clone();
            trace!(component = %self.graph.component_name(n.component), %input, time = %n.time, "source changed");

            let Some(entry) = self.entries.get_mut(idx) else { continue };
            let mut cx = Context::new(&mut self.graph, &self.env, n.component, &mut entry.io);
            entry.component.source_changed(&mut cx, &input, n.time)?;
        }
        Ok(())
    }

    fn time_indices(&self) -> Vec<usize> {
        (0..self.entries.len()).filter(|&i| self.entries[i].component.is_time_component()).collect()
    }

    // --- Phases ---

    pub fn initialize(&mut self) -> Result<()> {
        let _guard = self.span.clone().entered();
        info!("initialize components");

        for idx in 0..self.entries.len() {
            self.check_status(idx, &[Created])?;
            self.call(idx, "initialize", |c, cx| c.initialize(cx))?;
            self.entries[idx].io.freeze();
            self.check_status(idx, &[Initialized])?;
        }
        self.initialized = true;
        Ok(())
    }

    pub fn connect(&mut self, start: Option<SimTime>) -> Result<()> {
        if self.connected {
            return Err(CouplingError::Status {
                component: self.config.name.clone(),
                actual: Connected,
                expected: vec![Initialized],
            });
        }
        if !self.initialized {
            self.initialize()?;
        }
        let _guard = self.span.clone().entered();
        self.env.start = start;

        let result = self.connect_phases(start);
        if result.is_err() {
            self.teardown();
        }
        result
    }

    fn connect_phases(&mut self, start: Option<SimTime>) -> Result<()> {
        // 1. Graph rules.
        if let Err(errors) = GraphValidator::new(&self.graph, &self.ios()).validate() {
            for e in &errors {
                error!(error = %e, "graph validation");
            }
            if let Some(first) = errors.into_iter().next() {
                return Err(first);
            }
        }

        // 2. Iterative connect.
        info!("connect components");
        let mut rounds = 0usize;
        loop {
            let pending: Vec<usize> =
                (0..self.entries.len()).filter(|&i| self.entries[i].component.status() != Connected).collect();
            if pending.is_empty() {
                break;
            }
            if let Some(max) = self.config.max_connect_rounds {
                if rounds >= max {
                    return Err(CouplingError::Config(format!("connect did not converge within {} rounds", max)));
                }
            }

            let mut any_progress = false;
            for idx in pending {
                self.call(idx, "connect", |c, cx| c.connect(cx, start))?;
                self.check_status(idx, &[Connecting, ConnectingIdle, Connected])?;
                any_progress |= self.entries[idx].component.status() != ConnectingIdle;
            }
            rounds += 1;
            debug!(round = rounds, "connect round done");

            if !any_progress {
                return Err(self.deadlock_error());
            }
        }

        // 3. Per-component validation.
        info!(rounds, "validate components");
        for idx in 0..self.entries.len() {
            self.call(idx, "validate", |c, cx| c.validate(cx))?;
            self.check_status(idx, &[Validated])?;
        }
        self.connected = true;
        Ok(())
    }

    fn ios(&self) -> Vec<ComponentIo> { self.entries.iter().map(|e| e.io.clone()).collect() }

    fn deadlock_error(&self) -> CouplingError {
        let stuck: Vec<ComponentId> = (0..self.entries.len())
            .filter(|&i| self.entries[i].component.status() != Connected)
            .map(ComponentId::new)
            .collect();
        let dg = dependency_graph(&self.graph, &self.ios());
        let name = |id: &ComponentId| self.entries[id.index()].component.name().to_string();

        let cycles: Vec<Vec<String>> =
            cycles_among(&dg, &stuck).iter().map(|c| c.iter().map(name).collect()).collect();
        let components: Vec<String> = stuck.iter().map(name).collect();
        CouplingError::Deadlock { components, cycles }
    }

    /// Runs until every time component reached `end`, then finalizes.
    pub fn run(&mut self, end: Option<SimTime>) -> Result<()> {
        if !self.connected {
            self.connect(None)?;
        }
        let _guard = self.span.clone().entered();

        let time_comps = self.time_indices();
        match (time_comps.is_empty(), end) {
            (false, None) => {
                return Err(CouplingError::Config("an end time is required with time components".into()));
            }
            (true, Some(_)) => {
                return Err(CouplingError::Config("an end time is not allowed without time components".into()));
            }
            _ => {}
        }
        self.env.end = end;

        info!(end = ?end.map(SimTime::as_f64), "run");
        let result = match end {
            Some(end) => self.run_loop(&time_comps, end),
            None => Ok(()),
        };
        if let Err(e) = result {
            self.teardown();
            return Err(e);
        }
        self.finalize()
    }

    fn run_loop(&mut self, time_comps: &[usize], end: SimTime) -> Result<()> {
        loop {
            // Earliest time first; ties keep declaration order.
            let mut next: Option<(usize, SimTime)> = None;
            for &idx in time_comps {
                let comp = &self.entries[idx].component;
                if comp.status() == Finished {
                    continue;
                }
                let Some(t) = comp.time() else { continue };
                if next.map_or(true, |(_, best)| t < best) {
                    next = Some((idx, t));
                }
            }
            let Some((idx, time)) = next else { break };
            if time >= end {
                break;
            }

            if self.config.resolve_dependencies {
                let mut chain = Vec::new();
                self.update_recursive(idx, &mut chain, None)?;
            } else {
                self.update(idx)?;
            }
        }
        Ok(())
    }

    fn update(&mut self, idx: usize) -> Result<()> {
        self.call(idx, "update", |c, cx| c.update(cx))?;
        self.check_status(idx, &[Updated, Finished, Validated])?;
        self.entries[idx].updates += 1;
        Ok(())
    }

    /// Updates the first lagging upstream time component of `idx`, or `idx` itself.
    /// Returns whether some component was updated.
    fn update_recursive(&mut self, idx: usize, chain: &mut Vec<usize>, target: Option<SimTime>) -> Result<bool> {
        if chain.contains(&idx) {
            let mut names: Vec<String> =
                chain.iter().map(|&i| self.entries[i].component.name().to_string()).collect();
            names.push(self.entries[idx].component.name().to_string());
            return Err(CouplingError::CircularCoupling { chain: names });
        }
        chain.push(idx);

        let is_time = self.entries[idx].component.is_time_component();
        let target = if is_time { self.entries[idx].component.next_time() } else { target };

        for dep in upstream_dependencies(&self.graph, &self.entries[idx].io) {
            let owner = dep.owner.index();
            if self.entries[owner].component.is_time_component() {
                let produced = self.graph.output(dep.output)?.last_time();
                let lagging = match (target, produced) {
                    (Some(t), Some(p)) => p < t,
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                if lagging {
                    return self.update_recursive(owner, chain, None);
                }
            } else if self.update_recursive(owner, chain, target)? {
                return Ok(true);
            }
        }
        chain.pop();

        if !is_time {
            return Ok(false);
        }
        if self.entries[idx].component.status() == Finished {
            return Err(CouplingError::time(
                self.entries[idx].component.name(),
                "can't update a dependency that is already finished",
            ));
        }
        self.update(idx)?;
        Ok(true)
    }

    pub fn finalize(&mut self) -> Result<()> {
        let _guard = self.span.clone().entered();
        info!("finalize components");

        for idx in 0..self.entries.len() {
            self.check_status(idx, &[Validated, Updated, Finished])?;
            self.call(idx, "finalize", |c, cx| c.finalize(cx))?;
            self.check_status(idx, &[Finalized])?;
        }
        self.graph.clear_adapters();
        self.warn_unupdated();
        Ok(())
    }

    /// Finalizes whatever can still be finalized, logging failures.
    fn teardown(&mut self) {
        warn!("run aborted, finalizing components");
        for idx in 0..self.entries.len() {
            let status = self.entries[idx].component.status();
            if matches!(status, Created | Finalized | Failed) {
                continue;
            }
            if let Err(e) = self.call(idx, "finalize", |c, cx| c.finalize(cx)) {
                warn!(component = %self.entries[idx].component.name(), error = %e, "teardown failed");
            }
        }
        self.graph.clear_adapters();
    }

    fn warn_unupdated(&self) {
        if !self.config.warn_unupdated {
            return;
        }
        for entry in &self.entries {
            if entry.component.is_time_component() && entry.updates == 0 {
                warn!(component = %entry.component.name(), "time component was never updated");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Info, NoDomain, Value};
    use crate::modules::{CallbackComponent, DebugConsumer, Generator, Record};
    use crate::negotiate::Offer;
    use crate::sdk::{ConnectCx, Model, ModelComponent};
    use crate::slot::{InputSpec, OutputSpec};
    use indexmap::IndexMap;
    use rstest::rstest;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    fn info() -> Info { Info::new(None, Some(Arc::new(NoDomain))) }

    type UpdateLog = Rc<RefCell<Vec<(SimTime, usize)>>>;

    /// Time component without slots that logs its updates.
    struct Clock {
        index: usize,
        time: SimTime,
        step: f64,
        log: UpdateLog,
    }

    impl Model for Clock {
        fn initialize(&mut self, _cx: &mut Context) -> Result<()> { Ok(()) }

        fn update(&mut self, _cx: &mut Context) -> Result<()> {
            self.log.borrow_mut().push((self.time, self.index));
            self.time = self.time + self.step;
            Ok(())
        }

        fn time(&self) -> Option<SimTime> { Some(self.time) }
        fn next_time(&self) -> Option<SimTime> { Some(self.time + self.step) }
    }

    /// Time component pulling `In` at its current time and pushing `In + 1` to `Out`.
    struct Relay {
        time: SimTime,
    }

    impl Model for Relay {
        fn initialize(&mut self, cx: &mut Context) -> Result<()> {
            cx.add_input("In", InputSpec::new())?;
            cx.add_output("Out", OutputSpec::new())?;
            Ok(())
        }

        fn connect(&mut self, cx: &mut ConnectCx) -> Result<ComponentStatus> {
            cx.try_connect(
                Offer::new()
                    .exchange_info("In", Info::new(None, None))
                    .push_info("Out", info().with_time(self.time))
                    .push_data("Out", 0.0),
            )
        }

        fn update(&mut self, cx: &mut Context) -> Result<()> {
            let value = cx.pull("In", self.time)?;
            self.time = self.time + 1.0;
            let next = value.as_scalar().unwrap_or(0.0) + 1.0;
            cx.push("Out", next, self.time)
        }

        fn time(&self) -> Option<SimTime> { Some(self.time) }
        fn next_time(&self) -> Option<SimTime> { Some(self.time + 1.0) }
    }

    /// Component without a time step whose output is computed on pull.
    struct Field;

    impl Model for Field {
        fn initialize(&mut self, cx: &mut Context) -> Result<()> {
            cx.add_callback_output("Out", |t| Ok(Value::Scalar(10.0 * t.as_f64())))?;
            Ok(())
        }

        fn connect(&mut self, cx: &mut ConnectCx) -> Result<ComponentStatus> {
            cx.try_connect(Offer::new().push_info("Out", info().with_time(SimTime::ZERO)))
        }
    }

    fn records(r: &crate::modules::Records) -> Vec<(f64, f64)> {
        r.lock().unwrap().iter().map(|Record { time, value, .. }| (time.as_f64(), value.as_scalar().unwrap())).collect()
    }

    #[rstest]
    #[case(10.0, 10 + 5 + 4)]
    #[case(7.5, 8 + 4 + 3)]
    #[case(6.0, 6 + 3 + 2)]
    fn test_earliest_time_first(#[case] end: f64, #[case] expected: usize) {
        let log: UpdateLog = Rc::new(RefCell::new(Vec::new()));
        let comps: Vec<Box<dyn Component>> = [1.0, 2.0, 3.0]
            .iter()
            .enumerate()
            .map(|(index, &step)| {
                let clock = Clock { index, time: SimTime::ZERO, step, log: Rc::clone(&log) };
                ModelComponent::boxed(&format!("Step{}", step), clock)
            })
            .collect();
        let mut comp = Composition::new(comps).unwrap();
        comp.run(Some(SimTime(end))).unwrap();

        let log = log.borrow();
        assert_eq!(log.len(), expected);
        // Non-decreasing time, ties in declaration order.
        assert!(log.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(&log[..3], &[(SimTime::ZERO, 0), (SimTime::ZERO, 1), (SimTime::ZERO, 2)]);
        assert_eq!(comp.status("Step1").unwrap(), ComponentStatus::Finalized);
    }

    #[test]
    fn test_mutual_dependency_deadlocks() {
        let mirror = || {
            CallbackComponent::new(|inputs: &IndexMap<String, Value>, _| {
                Ok(IndexMap::from([("Out".to_string(), inputs["In"].clone())]))
            })
            .input("In", Info::new(None, None))
            .output("Out", "In")
        };
        let comps = vec![ModelComponent::boxed("A", mirror()), ModelComponent::boxed("B", mirror())];
        let mut comp = Composition::new(comps).unwrap();
        comp.initialize().unwrap();
        let (a_out, b_in) = (comp.output("A", "Out").unwrap(), comp.input("B", "In").unwrap());
        let (b_out, a_in) = (comp.output("B", "Out").unwrap(), comp.input("A", "In").unwrap());
        comp.link(a_out).to(b_in).unwrap();
        comp.link(b_out).to(a_in).unwrap();

        let err = comp.connect(Some(SimTime::ZERO)).unwrap_err();
        assert_eq!(
            err,
            CouplingError::Deadlock {
                components: vec!["A".into(), "B".into()],
                cycles: vec![vec!["A".into(), "B".into()]],
            }
        );
    }

    #[test]
    fn test_callback_forwards_initial_and_pushed_data() {
        let gen = Generator::new(SimTime::ZERO, 1.0).output("Out", info(), |t| Value::Scalar(t.as_f64()));
        let double = CallbackComponent::new(|inputs: &IndexMap<String, Value>, _| {
            Ok(IndexMap::from([("Out".to_string(), inputs["In"].scaled(2.0))]))
        })
        .input("In", Info::new(None, None))
        .output("Out", "In");
        let sink = DebugConsumer::push_driven().input("In", Info::new(None, None));
        let records_handle = sink.records();

        let comps = vec![
            ModelComponent::boxed("Gen", gen),
            ModelComponent::boxed("Double", double),
            ModelComponent::boxed("Sink", sink),
        ];
        let mut comp = Composition::new(comps).unwrap();
        comp.initialize().unwrap();
        let out = comp.output("Gen", "Out").unwrap();
        let mid_in = comp.input("Double", "In").unwrap();
        let mid_out = comp.output("Double", "Out").unwrap();
        let sink_in = comp.input("Sink", "In").unwrap();
        comp.link(out).to(mid_in).unwrap();
        comp.link(mid_out).to(sink_in).unwrap();

        comp.connect(Some(SimTime::ZERO)).unwrap();
        comp.run(Some(SimTime(2.0))).unwrap();
        assert_eq!(records(&records_handle), vec![(0.0, 0.0), (1.0, 2.0), (2.0, 4.0)]);
    }

    #[test]
    fn test_consumer_pulls_callback_output() {
        let sink = DebugConsumer::stepped(SimTime::ZERO, 1.0).input("In", Info::new(None, None));
        let records_handle = sink.records();
        let mut comp =
            Composition::new(vec![ModelComponent::boxed("Field", Field), ModelComponent::boxed("Sink", sink)]).unwrap();
        comp.initialize().unwrap();
        let (out, inp) = (comp.output("Field", "Out").unwrap(), comp.input("Sink", "In").unwrap());
        comp.link(out).to(inp).unwrap();

        comp.run(Some(SimTime(2.0))).unwrap();
        assert_eq!(records(&records_handle), vec![(0.0, 0.0), (1.0, 10.0), (2.0, 20.0)]);
        assert_eq!(comp.update_count("Field").unwrap(), 0);
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn test_single_consumer_branching_fails_connect(#[case] flagged_scale: bool) {
        let gen = Generator::new(SimTime::ZERO, 1.0).output("Out", info(), |_| Value::Scalar(1.0));
        let sink = DebugConsumer::stepped(SimTime::ZERO, 1.0)
            .input("A", Info::new(None, None))
            .input("B", Info::new(None, None));
        let mut comp =
            Composition::new(vec![ModelComponent::boxed("Gen", gen), ModelComponent::boxed("Sink", sink)]).unwrap();
        comp.initialize().unwrap();
        let out = comp.output("Gen", "Out").unwrap();
        let (a, b) = (comp.input("Sink", "A").unwrap(), comp.input("Sink", "B").unwrap());
        let ada = if flagged_scale {
            comp.single_consumer_adapter("Single", AdapterKind::scale(1.0)).unwrap()
        } else {
            comp.adapter("Single", AdapterKind::linear())
        };
        comp.link(out).to(ada).unwrap().to(a).unwrap();
        comp.link(ada).to(b).unwrap();

        let err = comp.connect(None).unwrap_err();
        assert!(matches!(err, CouplingError::Branching { ref at, .. } if at == "Single"));
    }

    #[test]
    fn test_day_counter_through_next_adapter() {
        let gen = Generator::new(SimTime::ZERO, 1.0).output("Day", info(), |t| Value::Scalar(t.as_f64().floor()));
        let exact = DebugConsumer::stepped(SimTime::ZERO, 1.0).input("In", Info::new(None, None));
        let half = DebugConsumer::stepped(SimTime(0.5), 1.0).input("In", Info::new(None, None)).without_initial_pull();
        let (exact_rec, half_rec) = (exact.records(), half.records());

        let mut comp = Composition::new(vec![
            ModelComponent::boxed("Gen", gen),
            ModelComponent::boxed("Exact", exact),
            ModelComponent::boxed("Half", half),
        ])
        .unwrap();
        comp.initialize().unwrap();
        let day = comp.output("Gen", "Day").unwrap();
        let (exact_in, half_in) = (comp.input("Exact", "In").unwrap(), comp.input("Half", "In").unwrap());
        let next_a = comp.adapter("NextA", AdapterKind::next());
        let next_b = comp.adapter("NextB", AdapterKind::next());
        comp.link(day).to(next_a).unwrap().to(exact_in).unwrap();
        comp.link(day).to(next_b).unwrap().to(half_in).unwrap();

        comp.run(Some(SimTime(3.0))).unwrap();

        assert_eq!(records(&exact_rec), vec![(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]);
        assert_eq!(records(&half_rec), vec![(1.5, 2.0), (2.5, 3.0), (3.5, 4.0)]);
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_circular_coupling(#[case] break_link: bool) {
        let comps = vec![
            ModelComponent::boxed("A", Relay { time: SimTime::ZERO }),
            ModelComponent::boxed("B", Relay { time: SimTime::ZERO }),
        ];
        let mut comp = Composition::new(comps).unwrap();
        comp.initialize().unwrap();
        let (a_out, b_in) = (comp.output("A", "Out").unwrap(), comp.input("B", "In").unwrap());
        let (b_out, a_in) = (comp.output("B", "Out").unwrap(), comp.input("A", "In").unwrap());
        comp.link(a_out).to(b_in).unwrap();
        let back = if break_link {
            comp.adapter_without_dependency("Delay", AdapterKind::scale(1.0)).unwrap()
        } else {
            comp.adapter("Same", AdapterKind::scale(1.0))
        };
        comp.link(b_out).to(back).unwrap().to(a_in).unwrap();

        let result = comp.run(Some(SimTime(3.0)));
        if break_link {
            result.unwrap();
            assert_eq!(comp.update_count("A").unwrap(), 3);
            assert_eq!(comp.update_count("B").unwrap(), 3);
        } else {
            assert_eq!(
                result.unwrap_err(),
                CouplingError::CircularCoupling { chain: vec!["A".into(), "B".into(), "A".into()] }
            );
        }
    }

    #[test]
    fn test_phase_contract() {
        let gen = Generator::new(SimTime::ZERO, 1.0).output("Out", info(), |_| Value::Scalar(0.0));
        let mut comp = Composition::new(vec![ModelComponent::boxed("Gen", gen)]).unwrap();
        comp.connect(None).unwrap();
        assert!(matches!(comp.connect(None), Err(CouplingError::Status { .. })));
        assert!(matches!(comp.run(None), Err(CouplingError::Config(_))));

        let dup = vec![
            ModelComponent::boxed("X", Generator::new(SimTime::ZERO, 1.0)),
            ModelComponent::boxed("X", Generator::new(SimTime::ZERO, 1.0)),
        ];
        assert!(Composition::new(dup).is_err());
    }

    #[test]
    fn test_metadata_export() {
        let gen = Generator::new(SimTime::ZERO, 1.0).output("Out", info(), |t| Value::Scalar(t.as_f64()));
        let sink = DebugConsumer::stepped(SimTime::ZERO, 1.0).input("In", Info::new(None, None));
        let mut comp =
            Composition::new(vec![ModelComponent::boxed("Gen", gen), ModelComponent::boxed("Sink", sink)]).unwrap();
        comp.initialize().unwrap();
        let out = comp.output("Gen", "Out").unwrap();
        let inp = comp.input("Sink", "In").unwrap();
        let ada = comp.adapter("Linear", AdapterKind::linear());
        comp.link(out).to(ada).unwrap().to(inp).unwrap();
        comp.run(Some(SimTime(2.0))).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("composition.json");
        comp.save_metadata(&path).unwrap();
        let meta: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(meta["name"], "coupling");
        assert_eq!(meta["components"]["Gen"]["updates"], 2);
        assert_eq!(meta["components"]["Sink"]["status"], "FINALIZED");
        assert_eq!(meta["adapters"]["Linear"]["kind"], "LinearTime");
        assert_eq!(meta["adapters"]["Linear"]["no_branch"], true);
        assert_eq!(meta["links"].as_array().unwrap().len(), 2);
        assert_eq!(meta["time_frame"]["end"], 2.0);
    }
}
