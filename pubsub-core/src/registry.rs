//! # Registry
//!
//! Maps each [`ActionKind`] to its handler. The table is built once at
//! startup and covers every action; looking up a name outside the fixed set
//! fails before any I/O happens.
use std::{collections::HashMap, sync::Arc};

use crate::{
    action::ActionKind,
    error::UnsupportedAction,
    handler::{self, Command},
};

/// Dispatch table from action to handler
#[derive(Debug, Clone)]
pub struct Registry {
    handlers: HashMap<ActionKind, Arc<dyn Command>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// table holding the built-in handler for every action
    pub fn new() -> Self {
        let mut registry = Self {
            handlers: HashMap::with_capacity(ActionKind::ALL.len()),
        };
        registry
            .add(handler::Nodes)
            .add(handler::Create)
            .add(handler::Delete)
            .add(handler::GetConfiguration)
            .add(handler::Publish)
            .add(handler::GetItem)
            .add(handler::Retract)
            .add(handler::Purge)
            .add(handler::Subscribe)
            .add(handler::Unsubscribe)
            .add(handler::GetAffiliations)
            .add(handler::SetOwnerAffiliation);
        registry
    }

    fn add<C: Command>(&mut self, command: C) -> &mut Self {
        self.handlers.insert(command.kind(), Arc::new(command));
        self
    }

    /// look a handler up by name, accepting the same names as the command line
    pub fn dispatch(&self, name: &str) -> Result<Arc<dyn Command>, UnsupportedAction> {
        let kind = name.parse::<ActionKind>()?;
        self.get(kind)
    }

    /// look a handler up by action
    pub fn get(&self, kind: ActionKind) -> Result<Arc<dyn Command>, UnsupportedAction> {
        self.handlers
            .get(&kind)
            .cloned()
            .ok_or_else(|| UnsupportedAction(kind.to_string()))
    }

    /// number of registered actions
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// is the table empty?
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
