//! Formato portable de un stack y su import con resolución de colisiones.

use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::{Stack, StackDefinition, StackStore};
use crate::constants::STACKFLOW_VERSION;
use crate::errors::StackError;
use crate::model::{ComponentKind, Configuration};

/// Intentos máximos de renombrado antes de rendirse ante un resolver que no
/// converge.
const MAX_RENAME_ATTEMPTS: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub name: String,
    pub flavor: String,
    pub kind: ComponentKind,
    pub configuration: Configuration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackExport {
    pub version: String,
    pub stack_name: String,
    pub components: Vec<ComponentDescriptor>,
}

/// Decide el nombre alternativo cuando `taken` ya existe. `None` aborta.
///
/// `what` describe el recurso (`"stack"`, `"orchestrator component"`). Una
/// implementación interactiva preguntaría al usuario.
pub trait NameResolver {
    fn rename(&self, what: &str, taken: &str) -> Option<String>;
}

/// `name` -> `name-1` -> `name-2` ...
#[derive(Debug, Default, Clone, Copy)]
pub struct SuffixResolver;

impl NameResolver for SuffixResolver {
    fn rename(&self, _what: &str, taken: &str) -> Option<String> {
        if let Some((base, suffix)) = taken.rsplit_once('-') {
            if let Some(next) = suffix.parse::<u32>().ok().and_then(|n| n.checked_add(1)) {
                return Some(format!("{base}-{next}"));
            }
        }
        Some(format!("{taken}-1"))
    }
}

/// Cualquier closure `(what, taken) -> Option<String>` sirve de resolver.
impl<F> NameResolver for F where F: Fn(&str, &str) -> Option<String>
{
    fn rename(&self, what: &str, taken: &str) -> Option<String> {
        self(what, taken)
    }
}

#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub stack: Arc<Stack>,
    pub stack_name: String,
    /// (recurso, nombre original, nombre final) de cada renombrado.
    pub renamed: Vec<(String, String, String)>,
    /// Componentes existentes idénticos que se reutilizaron.
    pub reused: Vec<String>,
}

pub fn export_stack(store: &dyn StackStore, name: &str) -> Result<StackExport, StackError> {
    let definition = store.stack_definition(name)?;
    let mut components = Vec::with_capacity(definition.len());
    for (kind, component_name) in &definition {
        let record = store.get_component(*kind, component_name)?;
        components.push(ComponentDescriptor { name: record.name,
                                              flavor: record.flavor,
                                              kind: record.kind,
                                              configuration: record.configuration });
    }
    Ok(StackExport { version: STACKFLOW_VERSION.to_string(),
                     stack_name: name.to_string(),
                     components })
}

pub fn import_stack(store: &dyn StackStore, doc: &StackExport, resolver: &dyn NameResolver) -> Result<ImportOutcome, StackError> {
    if doc.version != STACKFLOW_VERSION {
        return Err(StackError::VersionMismatch { expected: STACKFLOW_VERSION.to_string(),
                                                 found: doc.version.clone() });
    }

    let mut renamed = Vec::new();
    let mut reused = Vec::new();
    let mut definition = StackDefinition::new();
    for descriptor in &doc.components {
        let what = format!("{} component", descriptor.kind);
        let mut candidate = descriptor.name.clone();
        let mut attempts = 0;
        let final_name = loop {
            match store.get_component(descriptor.kind, &candidate) {
                Err(StackError::NotFound { .. }) => {
                    store.register_component(descriptor.kind,
                                             &descriptor.flavor,
                                             &candidate,
                                             descriptor.configuration.clone())?;
                    break candidate;
                }
                Err(other) => return Err(other),
                Ok(existing) if existing.flavor == descriptor.flavor && existing.configuration == descriptor.configuration => {
                    reused.push(candidate.clone());
                    break candidate;
                }
                Ok(_) => {
                    candidate = next_name(resolver, &what, &candidate, &mut attempts)?;
                }
            }
        };
        if final_name != descriptor.name {
            renamed.push((what, descriptor.name.clone(), final_name.clone()));
        }
        definition.insert(descriptor.kind, final_name);
    }

    let existing = store.list_stacks();
    let mut stack_name = doc.stack_name.clone();
    let mut attempts = 0;
    while existing.contains(&stack_name) {
        stack_name = next_name(resolver, "stack", &stack_name, &mut attempts)?;
    }
    if stack_name != doc.stack_name {
        renamed.push(("stack".to_string(), doc.stack_name.clone(), stack_name.clone()));
    }

    let stack = store.register_stack(&stack_name, &definition)?;
    info!("imported stack '{}' as '{stack_name}' ({} renamed, {} reused)",
          doc.stack_name,
          renamed.len(),
          reused.len());
    Ok(ImportOutcome { stack,
                       stack_name,
                       renamed,
                       reused })
}

fn next_name(resolver: &dyn NameResolver, what: &str, taken: &str, attempts: &mut usize) -> Result<String, StackError> {
    *attempts += 1;
    if *attempts > MAX_RENAME_ATTEMPTS {
        warn!("giving up renaming {what} '{taken}' after {MAX_RENAME_ATTEMPTS} attempts");
        return Err(StackError::already_exists(what, taken));
    }
    resolver.rename(what, taken).ok_or_else(|| StackError::already_exists(what, taken))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_resolver_increments() {
        let r = SuffixResolver;
        assert_eq!(r.rename("stack", "prod").as_deref(), Some("prod-1"));
        assert_eq!(r.rename("stack", "prod-1").as_deref(), Some("prod-2"));
        assert_eq!(r.rename("stack", "blue-green").as_deref(), Some("blue-green-1"));
        // Sufijo saturado: se agrega uno nuevo en lugar de desbordar.
        assert_eq!(r.rename("stack", "x-4294967295").as_deref(), Some("x-4294967295-1"));
    }

    #[test]
    fn closures_act_as_resolvers() {
        let refuse = |_: &str, _: &str| None::<String>;
        assert_eq!(NameResolver::rename(&refuse, "stack", "prod"), None);
    }
}
