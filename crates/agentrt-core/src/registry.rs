// Action Registry (Component A, spec §4.1).
//
// Grounded on `python_action_registry.py`'s `PythonActionRegistry`: the
// `(tags, explicit_names)` construction that scans a module-level tool
// catalogue once, the terminator side-reference captured during that scan
// regardless of whether the terminator itself matched the tag/name filter,
// `register_terminate_tool`, and `register_tool_by_name`. The catalogue
// itself replaces the decorator-populated global dict with a builder
// (spec §9's reshaping note), producing process-wide read-mostly state
// (spec §5) plus a derived `tools_by_tag` index.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::error::{AgentError, Result};
use crate::tool::ToolDescriptor;

/// A mapping `name -> Tool Descriptor`, the unit the loop dispatches
/// against. Replaced atomically, never mutated in place (spec §3's
/// "Registry Snapshot").
pub type RegistrySnapshot = Arc<HashMap<String, Arc<ToolDescriptor>>>;

/// Process-wide, read-mostly set of invokable built-in tools, populated
/// once at startup and never mutated afterward (spec §5).
#[derive(Default)]
pub struct BuiltinCatalogue {
    tools: HashMap<String, Arc<ToolDescriptor>>,
    by_tag: HashMap<String, Vec<Arc<ToolDescriptor>>>,
}

impl BuiltinCatalogue {
    pub fn builder() -> BuiltinCatalogueBuilder {
        BuiltinCatalogueBuilder::new()
    }

    pub fn get(&self, name: &str) -> Option<Arc<ToolDescriptor>> {
        self.tools.get(name).cloned()
    }

    pub fn terminator(&self) -> Option<Arc<ToolDescriptor>> {
        self.tools.values().find(|t| t.name == "terminate" && t.terminal).cloned()
    }

    /// Derived index over `tags`, matching spec §9's
    /// "Expose `tools_by_tag` as a derived index."
    pub fn tools_by_tag(&self, tag: &str) -> &[Arc<ToolDescriptor>] {
        self.by_tag.get(tag).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<ToolDescriptor>)> {
        self.tools.iter()
    }
}

#[derive(Default)]
pub struct BuiltinCatalogueBuilder {
    tools: HashMap<String, Arc<ToolDescriptor>>,
}

impl BuiltinCatalogueBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, descriptor: ToolDescriptor) -> Self {
        self.tools.insert(descriptor.name.clone(), Arc::new(descriptor));
        self
    }

    pub fn build(self) -> BuiltinCatalogue {
        let mut by_tag: HashMap<String, Vec<Arc<ToolDescriptor>>> = HashMap::new();
        for descriptor in self.tools.values() {
            for tag in &descriptor.tags {
                by_tag.entry(tag.clone()).or_default().push(descriptor.clone());
            }
        }
        BuiltinCatalogue {
            tools: self.tools,
            by_tag,
        }
    }
}

/// A session's view into the built-in catalogue plus any remote-op /
/// custom descriptors registered on top of it. Single-writer from the
/// loop's thread of control; snapshot replacement is observed atomically
/// by tool dispatch (spec §4.1 invariant).
pub struct ActionRegistry {
    snapshot: RwLock<RegistrySnapshot>,
    /// Captured once during construction, even if the terminator itself
    /// did not match the tag/name filter -- `register_terminate` draws
    /// from this, not from the live snapshot.
    terminator: Option<Arc<ToolDescriptor>>,
}

impl ActionRegistry {
    /// Scans `catalogue` once: a descriptor is included iff its name is in
    /// `explicit_names` or at least one of its tags intersects `tags`.
    pub fn from_catalogue(catalogue: &BuiltinCatalogue, tags: &[String], explicit_names: &[String]) -> Self {
        let tag_set: HashSet<&str> = tags.iter().map(|s| s.as_str()).collect();
        let name_set: HashSet<&str> = explicit_names.iter().map(|s| s.as_str()).collect();

        let mut selected = HashMap::new();
        for (name, descriptor) in catalogue.iter() {
            let matches_name = name_set.contains(name.as_str());
            let matches_tag = descriptor.tags.iter().any(|t| tag_set.contains(t.as_str()));
            if matches_name || matches_tag {
                selected.insert(name.clone(), descriptor.clone());
            }
        }

        Self {
            snapshot: RwLock::new(Arc::new(selected)),
            terminator: catalogue.terminator(),
        }
    }

    pub fn empty() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(HashMap::new())),
            terminator: None,
        }
    }

    /// Inserts or replaces a descriptor by name. Publishes a new snapshot
    /// rather than mutating the shared one (spec §3 Ownership).
    pub fn register(&self, descriptor: ToolDescriptor) {
        let mut guard = self.snapshot.write().expect("registry lock poisoned");
        let mut next = (**guard).clone();
        next.insert(descriptor.name.clone(), Arc::new(descriptor));
        *guard = Arc::new(next);
    }

    /// Looks up `name` in the built-in catalogue and registers that
    /// descriptor. Returns whether the name existed.
    pub fn register_by_name(&self, catalogue: &BuiltinCatalogue, name: &str) -> bool {
        match catalogue.get(name) {
            Some(descriptor) => {
                let mut guard = self.snapshot.write().expect("registry lock poisoned");
                let mut next = (**guard).clone();
                next.insert(name.to_string(), descriptor);
                *guard = Arc::new(next);
                true
            }
            None => false,
        }
    }

    /// Guarantees the terminal tool is present in the live snapshot.
    /// Fails with `RegistryStateError` if the catalogue this registry was
    /// built from had no terminator at all.
    pub fn register_terminate(&self) -> Result<()> {
        match &self.terminator {
            Some(descriptor) => {
                let mut guard = self.snapshot.write().expect("registry lock poisoned");
                let mut next = (**guard).clone();
                next.insert(descriptor.name.clone(), descriptor.clone());
                *guard = Arc::new(next);
                Ok(())
            }
            None => Err(AgentError::registry_state(
                "terminate tool not found in built-in catalogue",
            )),
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<ToolDescriptor>> {
        self.snapshot
            .read()
            .expect("registry lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| AgentError::unknown_tool(name))
    }

    /// Atomically replaces the snapshot with the subset named by `names`,
    /// always unioned with the terminator if one was ever registered.
    pub fn replace_with(&self, names: &HashSet<String>) {
        let mut guard = self.snapshot.write().expect("registry lock poisoned");
        let current = guard.clone();
        let mut next = HashMap::new();
        for name in names {
            if let Some(descriptor) = current.get(name) {
                next.insert(name.clone(), descriptor.clone());
            }
        }
        if let Some(terminator) = &self.terminator {
            next.entry(terminator.name.clone()).or_insert_with(|| terminator.clone());
        }
        *guard = Arc::new(next);
    }

    /// A consistent, cheaply-cloned view of the current snapshot. The loop
    /// reads this once per iteration so `get` observes the same snapshot
    /// for the whole iteration even if another thread replaces it mid-flight
    /// (spec §8 property 4).
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.snapshot.read().expect("registry lock poisoned").clone()
    }

    pub fn has_terminator(&self) -> bool {
        self.terminator.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::tool_fn;
    use serde_json::json;

    fn terminate_descriptor() -> ToolDescriptor {
        ToolDescriptor::new(
            "terminate",
            "ends the session",
            json!({"type": "object", "properties": {"message": {"type": "string"}}}),
            true,
            [],
            tool_fn(|_ctx, args| async move { Ok(args) }),
        )
    }

    fn tagged_descriptor(name: &str, tag: &str) -> ToolDescriptor {
        ToolDescriptor::new(
            name,
            "a tool",
            json!({}),
            false,
            [tag.to_string()],
            tool_fn(|_ctx, args| async move { Ok(args) }),
        )
    }

    #[test]
    fn construction_selects_by_name_or_tag() {
        let catalogue = BuiltinCatalogue::builder()
            .register(terminate_descriptor())
            .register(tagged_descriptor("search", "web"))
            .register(tagged_descriptor("calc", "math"))
            .build();

        let registry = ActionRegistry::from_catalogue(
            &catalogue,
            &["web".to_string()],
            &["calc".to_string()],
        );

        assert!(registry.get("search").is_ok());
        assert!(registry.get("calc").is_ok());
        assert!(registry.get("terminate").is_err());
    }

    #[test]
    fn terminator_side_reference_is_captured_even_if_unselected() {
        let catalogue = BuiltinCatalogue::builder().register(terminate_descriptor()).build();
        let registry = ActionRegistry::from_catalogue(&catalogue, &[], &[]);
        assert!(registry.get("terminate").is_err());
        registry.register_terminate().unwrap();
        assert!(registry.get("terminate").is_ok());
    }

    #[test]
    fn register_terminate_fails_without_catalogue_terminator() {
        let catalogue = BuiltinCatalogue::builder().register(tagged_descriptor("x", "y")).build();
        let registry = ActionRegistry::from_catalogue(&catalogue, &[], &[]);
        assert!(registry.register_terminate().is_err());
    }

    #[test]
    fn replace_with_always_keeps_terminator() {
        let catalogue = BuiltinCatalogue::builder()
            .register(terminate_descriptor())
            .register(tagged_descriptor("search", "web"))
            .register(tagged_descriptor("calc", "math"))
            .build();
        let registry = ActionRegistry::from_catalogue(
            &catalogue,
            &["web".to_string(), "math".to_string()],
            &[],
        );
        registry.register_terminate().unwrap();

        let mut keep = HashSet::new();
        keep.insert("search".to_string());
        registry.replace_with(&keep);

        assert!(registry.get("search").is_ok());
        assert!(registry.get("calc").is_err());
        assert!(registry.get("terminate").is_ok());
    }

    #[test]
    fn tools_by_tag_is_a_derived_index() {
        let catalogue = BuiltinCatalogue::builder()
            .register(tagged_descriptor("search", "web"))
            .register(tagged_descriptor("fetch", "web"))
            .build();
        assert_eq!(catalogue.tools_by_tag("web").len(), 2);
        assert_eq!(catalogue.tools_by_tag("nonexistent").len(), 0);
    }
}
