//! Direct-lookup symbol table used by languages without bespoke resolution

use std::collections::HashMap;

use arbor_core::NodeType;

use super::{ResolveContext, SymbolTable, synthetic_id};

#[derive(Default)]
pub struct GenericSymbols {
    defs: HashMap<String, String>,
    imports: HashMap<String, String>,
}

impl GenericSymbols {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SymbolTable for GenericSymbols {
    fn register(&mut self, name: &str, id: &str, _kind: NodeType) {
        self.defs.insert(name.to_string(), id.to_string());
    }

    fn register_import(&mut self, alias: &str, target: &str) {
        self.imports.insert(alias.to_string(), target.to_string());
    }

    fn resolve(&self, name: &str, ctx: &ResolveContext<'_>) -> (String, bool) {
        if let Some(id) = self.defs.get(name) {
            return (id.clone(), true);
        }
        if let Some(target) = self.imports.get(name) {
            return (format!("external::{target}"), false);
        }
        (synthetic_id(name, ctx.file_path), false)
    }
}
