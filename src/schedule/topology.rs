//! Component-level dependency structure derived from the slot graph.
use crate::component::ComponentIo;
use crate::slot::{ComponentId, SlotGraph, SlotId};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

/// Directed graph `upstream -> downstream` over components.
///
/// Links through dependency-breaking adapters are left out. Node `i` is
/// component `i` in declaration order.
pub fn dependency_graph(graph: &SlotGraph, ios: &[ComponentIo]) -> DiGraph<ComponentId, ()> {
    let mut dg = DiGraph::with_capacity(ios.len(), ios.len());
    for i in 0..ios.len() {
        dg.add_node(ComponentId::new(i));
    }
    for (i, io) in ios.iter().enumerate() {
        for &input in io.inputs.values() {
            let Some((output, broken)) = graph.upstream_output(input) else { continue };
            if broken {
                continue;
            }
            if let Some(owner) = graph.owner_of(output) {
                dg.update_edge(NodeIndex::new(owner.index()), NodeIndex::new(i), ());
            }
        }
    }
    dg
}

/// Dependency cycles among `subset`, each in declaration order.
pub fn cycles_among(dg: &DiGraph<ComponentId, ()>, subset: &[ComponentId]) -> Vec<Vec<ComponentId>> {
    let keep = |id: ComponentId| subset.contains(&id);
    let sub = dg.filter_map(|_, &id| keep(id).then_some(id), |_, _| Some(()));

    let mut cycles: Vec<Vec<ComponentId>> = tarjan_scc(&sub)
        .into_iter()
        .filter(|scc| scc.len() > 1 || sub.contains_edge(scc[0], scc[0]))
        .map(|scc| {
            let mut ids: Vec<ComponentId> = scc.into_iter().map(|n| sub[n]).collect();
            ids.sort();
            ids
        })
        .collect();
    cycles.sort();
    cycles
}

/// A component the scheduler may have to update first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dependency {
    pub output: SlotId,
    pub owner: ComponentId,
}

/// Upstream outputs of `io` that schedule-relevant links depend on.
///
/// Skips links through dependency-breaking adapters, static and callback
/// outputs, and outputs without an owning component.
pub fn upstream_dependencies(graph: &SlotGraph, io: &ComponentIo) -> Vec<Dependency> {
    let mut deps: Vec<Dependency> = Vec::new();
    for &input in io.inputs.values() {
        let Some((output, broken)) = graph.upstream_output(input) else { continue };
        if broken {
            continue;
        }
        let Ok(out) = graph.output(output) else { continue };
        if out.spec.is_static || out.is_callback() {
            continue;
        }
        if let Some(owner) = out.owner {
            if !deps.iter().any(|d| d.output == output) {
                deps.push(Dependency { output, owner });
            }
        }
    }
    deps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterKind;
    use crate::slot::{InputSpec, OutputSpec};

    /// A <-> B, with B -> C.
    fn setup(break_back_link: bool) -> (SlotGraph, Vec<ComponentIo>) {
        let mut g = SlotGraph::new();
        let mut ios = vec![ComponentIo::new(), ComponentIo::new(), ComponentIo::new()];
        let ids: Vec<ComponentId> = ["A", "B", "C"].iter().map(|n| g.register_component(n)).collect();

        let a_out = g.add_output(Some(ids[0]), "Out", OutputSpec::new());
        let a_in = g.add_input(Some(ids[0]), "In", InputSpec::new());
        let b_out = g.add_output(Some(ids[1]), "Out", OutputSpec::new());
        let b_in = g.add_input(Some(ids[1]), "In", InputSpec::new());
        let c_in = g.add_input(Some(ids[2]), "In", InputSpec::new());
        ios[0].outputs.insert("Out".into(), a_out);
        ios[0].inputs.insert("In".into(), a_in);
        ios[1].outputs.insert("Out".into(), b_out);
        ios[1].inputs.insert("In".into(), b_in);
        ios[2].inputs.insert("In".into(), c_in);

        g.chain(a_out, b_in).unwrap();
        let ada = g.add_adapter("Scale", AdapterKind::scale(1.0));
        if break_back_link {
            g.set_breaks_dependency(ada).unwrap();
        }
        g.chain(b_out, ada).unwrap();
        g.chain(ada, a_in).unwrap();
        (g, ios)
    }

    #[test]
    fn test_cycle_found_among_subset() {
        let (g, ios) = setup(false);
        let dg = dependency_graph(&g, &ios);
        let all: Vec<ComponentId> = (0..3).map(ComponentId::new).collect();
        assert_eq!(cycles_among(&dg, &all), vec![vec![ComponentId(0), ComponentId(1)]]);
        assert!(cycles_among(&dg, &[ComponentId(0), ComponentId(2)]).is_empty());
    }

    #[test]
    fn test_breaking_adapter_removes_edge() {
        let (g, ios) = setup(true);
        let dg = dependency_graph(&g, &ios);
        let all: Vec<ComponentId> = (0..3).map(ComponentId::new).collect();
        assert!(cycles_among(&dg, &all).is_empty());

        assert!(upstream_dependencies(&g, &ios[0]).is_empty());
        let deps = upstream_dependencies(&g, &ios[1]);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].owner, ComponentId(0));
    }
}
