use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};

/// Builds a host-defined worker value from an untyped configuration tree.
/// Constructors are clonable so one builder can also serve an alias name.
pub type InputConstructor<W> = Arc<dyn Fn(serde_json::Value) -> Result<W> + Send + Sync>;

/// Host-owned registry mapping input kind names to constructors, so a
/// generic pipeline host can discover this worker type by name.
pub struct InputRegistry<W> {
    inputs: RwLock<HashMap<String, InputConstructor<W>>>,
}

impl<W> InputRegistry<W> {
    pub fn new() -> Self {
        Self {
            inputs: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, name: &str, constructor: InputConstructor<W>) -> Result<()> {
        let mut inputs = self.inputs.write();
        if inputs.contains_key(name) {
            return Err(Error::Config(format!(
                "input {name} is already registered"
            )));
        }
        inputs.insert(name.to_string(), constructor);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<InputConstructor<W>> {
        self.inputs.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inputs.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl<W> Default for InputRegistry<W> {
    fn default() -> Self {
        Self::new()
    }
}
