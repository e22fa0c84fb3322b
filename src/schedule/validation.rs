//! Static checks of the wired slot graph, run before connecting.
use crate::component::ComponentIo;
use crate::error::CouplingError;
use crate::slot::{Slot, SlotGraph, SlotId};
use tracing::warn;

/// Runs every graph rule over all component slots and collects the errors.
pub struct GraphValidator<'a> {
    graph: &'a SlotGraph,
    ios: &'a [ComponentIo],
}

impl<'a> GraphValidator<'a> {
    pub fn new(graph: &'a SlotGraph, ios: &'a [ComponentIo]) -> Self { Self { graph, ios } }

    pub fn validate(&self) -> Result<(), Vec<CouplingError>> {
        let mut errors = Vec::new();

        for io in self.ios {
            for &input in io.inputs.values() {
                if let Some(err) = self.check_connected(input).or_else(|| self.check_static(input)) {
                    errors.push(err);
                }
            }
            for &output in io.outputs.values() {
                if let Err(err) = self.check_branching(output, output, false) {
                    errors.push(err);
                }
            }
        }
        self.warn_dead_adapters();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn component_of(&self, id: SlotId) -> String {
        self.graph.owner_of(id).map_or("", |c| self.graph.component_name(c)).to_string()
    }

    fn slot_name(&self, id: SlotId) -> String {
        self.graph.slot(id).map_or("?", |s| s.name()).to_string()
    }

    fn check_connected(&self, input: SlotId) -> Option<CouplingError> {
        match self.graph.resolve_source(input) {
            Some(_) => None,
            None => Some(CouplingError::UnconnectedInput {
                component: self.component_of(input),
                input: self.slot_name(input),
            }),
        }
    }

    fn check_static(&self, input: SlotId) -> Option<CouplingError> {
        let inp = self.graph.input(input).ok()?;
        if !inp.spec.is_static {
            return None;
        }
        let source = self.graph.resolve_source(input)?;
        let out = self.graph.output(source).ok()?;
        (!out.spec.is_static).then(|| {
            CouplingError::Config(format!(
                "static input '{}' is fed by the non-static output '{}'",
                self.graph.label(input),
                self.graph.label(source)
            ))
        })
    }

    /// Walks the adapter tree below `id`; after a single-consumer adapter
    /// every node must have at most one target.
    fn check_branching(&self, origin: SlotId, id: SlotId, no_branch: bool) -> Result<(), CouplingError> {
        let targets = self.graph.targets_of(id);
        if no_branch && targets.len() > 1 {
            return Err(CouplingError::Branching {
                component: self.component_of(origin),
                output: self.slot_name(origin),
                at: self.slot_name(id),
            });
        }
        for &target in targets {
            if let Ok(adapter) = self.graph.adapter(target) {
                self.check_branching(origin, target, no_branch || adapter.no_branch)?;
            }
        }
        Ok(())
    }

    fn warn_dead_adapters(&self) {
        for (id, slot) in self.graph.slots() {
            if let Slot::Adapter(adapter) = slot {
                if adapter.targets.is_empty() {
                    warn!(adapter = %self.graph.label(id), "adapter has no targets");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterKind;
    use crate::slot::{ComponentId, InputSpec, OutputSpec};

    struct Setup {
        graph: SlotGraph,
        ios: Vec<ComponentIo>,
    }

    impl Setup {
        fn new() -> Self { Self { graph: SlotGraph::new(), ios: Vec::new() } }

        fn component(&mut self, name: &str) -> ComponentId {
            self.ios.push(ComponentIo::new());
            self.graph.register_component(name)
        }

        fn output(&mut self, c: ComponentId, name: &str, spec: OutputSpec) -> SlotId {
            let id = self.graph.add_output(Some(c), name, spec);
            self.ios[c.index()].outputs.insert(name.into(), id);
            id
        }

        fn input(&mut self, c: ComponentId, name: &str, spec: InputSpec) -> SlotId {
            let id = self.graph.add_input(Some(c), name, spec);
            self.ios[c.index()].inputs.insert(name.into(), id);
            id
        }

        fn validate(&self) -> Result<(), Vec<CouplingError>> { GraphValidator::new(&self.graph, &self.ios).validate() }
    }

    #[test]
    fn test_unconnected_input_through_adapter() {
        let mut s = Setup::new();
        let c = s.component("Sink");
        let inp = s.input(c, "In", InputSpec::new());
        let ada = s.graph.add_adapter("Scale", AdapterKind::scale(2.0));
        s.graph.chain(ada, inp).unwrap();

        let errors = s.validate().unwrap_err();
        assert_eq!(errors, vec![CouplingError::UnconnectedInput { component: "Sink".into(), input: "In".into() }]);
    }

    #[test]
    fn test_time_adapter_branching() {
        let mut s = Setup::new();
        let src = s.component("Src");
        let dst = s.component("Dst");
        let out = s.output(src, "Out", OutputSpec::new());
        let a = s.input(dst, "A", InputSpec::new());
        let lin = s.graph.add_adapter("Linear", AdapterKind::linear());
        s.graph.chain(out, lin).unwrap();
        s.graph.chain(lin, a).unwrap();
        assert!(s.validate().is_ok());

        let b = s.input(dst, "B", InputSpec::new());
        s.graph.chain(lin, b).unwrap();
        let errors = s.validate().unwrap_err();
        assert_eq!(
            errors,
            vec![CouplingError::Branching { component: "Src".into(), output: "Out".into(), at: "Linear".into() }]
        );
    }

    #[test]
    fn test_stateless_adapter_may_branch() {
        let mut s = Setup::new();
        let src = s.component("Src");
        let dst = s.component("Dst");
        let out = s.output(src, "Out", OutputSpec::new());
        let a = s.input(dst, "A", InputSpec::new());
        let b = s.input(dst, "B", InputSpec::new());
        let scale = s.graph.add_adapter("Scale", AdapterKind::scale(2.0));
        s.graph.chain(out, scale).unwrap();
        s.graph.chain(scale, a).unwrap();
        s.graph.chain(scale, b).unwrap();
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_static_input_needs_static_output() {
        let mut s = Setup::new();
        let src = s.component("Src");
        let dst = s.component("Dst");
        let out = s.output(src, "Out", OutputSpec::new());
        let inp = s.input(dst, "In", InputSpec::static_());
        s.graph.chain(out, inp).unwrap();
        assert!(matches!(s.validate().unwrap_err()[0], CouplingError::Config(_)));
    }

    #[test]
    fn test_flagged_stateless_adapter_rejects_branching() {
        let mut s = Setup::new();
        let src = s.component("Src");
        let dst = s.component("Dst");
        let out = s.output(src, "Out", OutputSpec::new());
        let a = s.input(dst, "A", InputSpec::new());
        let b = s.input(dst, "B", InputSpec::new());
        let cb = s.graph.add_adapter("Running", AdapterKind::callback(|v, _| Ok(v)));
        s.graph.chain(out, cb).unwrap();
        s.graph.chain(cb, a).unwrap();
        s.graph.chain(cb, b).unwrap();
        assert!(s.validate().is_ok());

        s.graph.set_no_branch(cb).unwrap();
        let errors = s.validate().unwrap_err();
        assert_eq!(
            errors,
            vec![CouplingError::Branching { component: "Src".into(), output: "Out".into(), at: "Running".into() }]
        );
        assert!(s.graph.set_no_branch(out).is_err());
    }
}
