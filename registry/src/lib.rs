//! In-memory model catalog: capability-tagged descriptors keyed by id.
//!
//! Registration happens only at startup (see `ModelRegistry::bootstrap`);
//! once the HTTP surface opens, the registry is read-only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("model id '{0}' is already registered")]
    DuplicateId(String),
    #[error("model id '{0}' is not registered")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Capability {
    Chat,
    Completion,
    Embeddings,
    ImageGeneration,
    Git,
    Filesystem,
    Prometheus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub capabilities: Vec<Capability>,
    pub context_length: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ModelDescriptor {
    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }
}

/// Owns the set of registered model descriptors. Mutated only before the
/// dispatch surface starts serving requests; read-only afterward.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, ModelDescriptor>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ModelDescriptor) -> Result<()> {
        if self.models.contains_key(&descriptor.id) {
            return Err(RegistryError::DuplicateId(descriptor.id));
        }
        debug_assert!(!descriptor.capabilities.is_empty(), "descriptor must declare at least one capability");
        self.models.insert(descriptor.id.clone(), descriptor);
        Ok(())
    }

    pub fn unregister(&mut self, id: &str) -> bool {
        self.models.remove(id).is_some()
    }

    pub fn get(&self, id: &str) -> Result<&ModelDescriptor> {
        self.models.get(id).ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub fn list(&self) -> Vec<&ModelDescriptor> {
        self.models.values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(id: &str, caps: &[Capability]) -> ModelDescriptor {
        ModelDescriptor {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            capabilities: caps.to_vec(),
            context_length: 4096,
            pricing: None,
            metadata: None,
        }
    }

    #[test]
    fn register_then_get_roundtrips_id() {
        let mut reg = ModelRegistry::new();
        reg.register(descriptor("gpt-x", &[Capability::Chat])).unwrap();
        let got = reg.get("gpt-x").unwrap();
        assert_eq!(got.id, "gpt-x");
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut reg = ModelRegistry::new();
        reg.register(descriptor("gpt-x", &[Capability::Chat])).unwrap();
        let err = reg.register(descriptor("gpt-x", &[Capability::Chat])).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId(_)));
    }

    #[test]
    fn unregister_then_get_not_found() {
        let mut reg = ModelRegistry::new();
        reg.register(descriptor("gpt-x", &[Capability::Chat])).unwrap();
        assert!(reg.unregister("gpt-x"));
        assert!(matches!(reg.get("gpt-x"), Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn list_contains_all_registered() {
        let mut reg = ModelRegistry::new();
        reg.register(descriptor("a", &[Capability::Git])).unwrap();
        reg.register(descriptor("b", &[Capability::Filesystem])).unwrap();
        let ids: Vec<_> = reg.list().iter().map(|m| m.id.as_str()).collect();
        assert!(ids.contains(&"a") && ids.contains(&"b"));
    }
}
