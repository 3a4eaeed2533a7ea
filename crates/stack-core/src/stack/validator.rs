use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::Stack;
use crate::model::ComponentKind;

/// Predicado arbitrario sobre el stack candidato; `Err` lleva el motivo.
pub type StackCheck = Arc<dyn Fn(&Stack) -> Result<(), String> + Send + Sync>;

/// Validador que un componente adjunta para ser evaluado contra el stack
/// completo: un conjunto de kinds requeridos, un predicado, o ambos.
#[derive(Clone, Default)]
pub struct StackValidator {
    required_kinds: BTreeSet<ComponentKind>,
    custom: Option<StackCheck>,
}

impl StackValidator {
    /// "Este componente necesita los kinds {X, Y} en otro lugar del stack".
    pub fn requires<I>(kinds: I) -> Self
        where I: IntoIterator<Item = ComponentKind>
    {
        Self { required_kinds: kinds.into_iter().collect(),
               custom: None }
    }

    pub fn custom<F>(check: F) -> Self
        where F: Fn(&Stack) -> Result<(), String> + Send + Sync + 'static
    {
        Self { required_kinds: BTreeSet::new(),
               custom: Some(Arc::new(check)) }
    }

    pub fn with_custom<F>(mut self, check: F) -> Self
        where F: Fn(&Stack) -> Result<(), String> + Send + Sync + 'static
    {
        self.custom = Some(Arc::new(check));
        self
    }

    pub fn required_kinds(&self) -> &BTreeSet<ComponentKind> {
        &self.required_kinds
    }

    pub fn validate(&self, stack: &Stack) -> Result<(), String> {
        let missing: Vec<String> = self.required_kinds
                                       .iter()
                                       .filter(|k| stack.component(**k).is_none())
                                       .map(|k| k.to_string())
                                       .collect();
        if !missing.is_empty() {
            return Err(format!("requires components of kind {} in the stack", missing.join(", ")));
        }
        match &self.custom {
            Some(check) => check(stack),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for StackValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackValidator")
         .field("required_kinds", &self.required_kinds)
         .field("custom", &self.custom.is_some())
         .finish()
    }
}
