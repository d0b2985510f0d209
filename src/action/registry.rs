use super::{ActionContext, ActionResult};
use crate::checkable::{CheckableKind, ObjectHandle};
use crate::value::Map;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Handler signature. `target` is `None` for global actions.
///
/// Expected failures (validation, conflicts, unknown ids) are returned as
/// an [`ActionResult`]; `Err` is reserved for unexpected faults.
pub type ActionHandler =
    fn(&ActionContext, Option<&Arc<ObjectHandle>>, &Map) -> anyhow::Result<ActionResult>;

/// Immutable description of one action
#[derive(Clone)]
pub struct ActionDescriptor {
    pub name: &'static str,
    /// Object types the action applies to; empty = global action
    pub types: &'static [CheckableKind],
    pub handler: ActionHandler,
}

impl ActionDescriptor {
    pub fn is_global(&self) -> bool {
        self.types.is_empty()
    }

    pub fn applies_to(&self, kind: CheckableKind) -> bool {
        self.types.contains(&kind)
    }
}

/// Name-keyed action table.
///
/// Populated once during startup and only read afterwards, so dispatch
/// needs no locking.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<&'static str, ActionDescriptor>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in action
    pub fn with_builtin_actions() -> Self {
        let mut registry = Self::new();
        super::register_builtin_actions(&mut registry);
        registry
    }

    pub fn register(
        &mut self,
        name: &'static str,
        types: &'static [CheckableKind],
        handler: ActionHandler,
    ) {
        if self.actions.contains_key(name) {
            warn!(action = name, "Action registered twice, replacing");
        }
        self.actions.insert(
            name,
            ActionDescriptor {
                name,
                types,
                handler,
            },
        );
    }

    /// Lookup accepting both `snake_case` and `kebab-case` names
    pub fn get(&self, name: &str) -> Option<&ActionDescriptor> {
        self.actions.get(normalize(name).as_str())
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.actions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Resolve and run an action. Never panics and never returns an error:
    /// every failure is folded into the returned result.
    pub fn dispatch(
        &self,
        ctx: &ActionContext,
        name: &str,
        target: Option<&Arc<ObjectHandle>>,
        params: &Map,
    ) -> ActionResult {
        let Some(descriptor) = self.get(name) else {
            return ActionResult::not_found(format!("Unknown action '{}'.", name));
        };

        let target = if descriptor.is_global() {
            None
        } else {
            match target {
                Some(object) if descriptor.applies_to(object.kind()) => Some(object),
                Some(object) => {
                    return ActionResult::not_found(format!(
                        "Action '{}' is not applicable to {} objects.",
                        descriptor.name,
                        object.kind()
                    ));
                }
                None => {
                    return ActionResult::not_found(format!(
                        "Action '{}' is not applicable without a target object.",
                        descriptor.name
                    ));
                }
            }
        };

        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| (descriptor.handler)(ctx, target, params)));

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!(action = descriptor.name, error = %e, "Action handler failed");
                internal_error(descriptor.name)
            }
            Err(_) => {
                error!(action = descriptor.name, "Action handler panicked");
                internal_error(descriptor.name)
            }
        };

        info!(
            action = descriptor.name,
            target = %target.map(|t| t.name()).unwrap_or_default(),
            code = result.code().as_u16(),
            "Action dispatched"
        );
        result
    }
}

fn internal_error(action: &str) -> ActionResult {
    ActionResult::internal_error(format!(
        "Internal error while executing action '{}'.",
        action
    ))
}

fn normalize(name: &str) -> String {
    name.replace('-', "_")
}
