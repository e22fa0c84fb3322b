//! JSON description of a wired composition.
use super::composition::Composition;
use crate::error::Result;
use crate::slot::Slot;
use serde_json::{json, Map, Value};
use std::path::Path;

impl Composition {
    /// Components, adapters, links and time frame as a JSON document.
    pub fn metadata(&self) -> Value {
        let mut components = Map::new();
        for entry in &self.entries {
            let c = &entry.component;
            components.insert(
                c.name().to_string(),
                json!({
                    "status": c.status(),
                    "time": c.time(),
                    "inputs": entry.io.inputs.keys().collect::<Vec<_>>(),
                    "outputs": entry.io.outputs.keys().collect::<Vec<_>>(),
                    "updates": entry.updates,
                    "meta": c.metadata(),
                }),
            );
        }

        let mut adapters = Map::new();
        let mut links = Vec::new();
        for (id, slot) in self.graph.slots() {
            if let Slot::Adapter(adapter) = slot {
                adapters.insert(
                    self.graph.label(id),
                    json!({
                        "kind": adapter.kind.label(),
                        "breaks_dependency": adapter.breaks_dependency,
                        "no_branch": adapter.no_branch,
                    }),
                );
            }
            for &target in self.graph.targets_of(id) {
                links.push(json!({ "from": self.graph.label(id), "to": self.graph.label(target) }));
            }
        }

        json!({
            "name": self.config.name,
            "time_frame": { "start": self.env.start, "end": self.env.end },
            "components": components,
            "adapters": adapters,
            "links": links,
        })
    }

    pub fn save_metadata(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.metadata())?;
        std::fs::write(path, text)?;
        Ok(())
    }
}
