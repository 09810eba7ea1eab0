use registry::{Capability, ModelDescriptor, ModelRegistry};

/// Registers the fixed set of models backing this broker's routes.
/// Registration happens once, before the dispatch surface opens; the
/// registry is read-only for the rest of the process lifetime.
pub fn build_registry() -> anyhow::Result<ModelRegistry> {
    let mut registry = ModelRegistry::new();

    registry.register(ModelDescriptor {
        id: "default-llm".to_string(),
        name: "Default chat/completion model".to_string(),
        description: "Forwards to the configured LLM_PROVIDER_BASE_URL backend.".to_string(),
        capabilities: vec![Capability::Chat, Capability::Completion],
        context_length: 8192,
        pricing: None,
        metadata: None,
    })?;

    registry.register(ModelDescriptor {
        id: "git-analyzer".to_string(),
        name: "Git last-commit analyzer".to_string(),
        description: "Diffs a repository's last commit against its parent.".to_string(),
        capabilities: vec![Capability::Git],
        context_length: 0,
        pricing: None,
        metadata: None,
    })?;

    registry.register(ModelDescriptor {
        id: "git-diff-analyzer".to_string(),
        name: "Git revision-range analyzer".to_string(),
        description: "Diffs and analyzes requirements changes between two revisions.".to_string(),
        capabilities: vec![Capability::Git],
        context_length: 0,
        pricing: None,
        metadata: None,
    })?;

    registry.register(ModelDescriptor {
        id: "filesystem".to_string(),
        name: "Sandboxed filesystem gateway".to_string(),
        description: "Path-confined file and directory operations.".to_string(),
        capabilities: vec![Capability::Filesystem],
        context_length: 0,
        pricing: None,
        metadata: None,
    })?;

    registry.register(ModelDescriptor {
        id: "prometheus".to_string(),
        name: "Prometheus query proxy".to_string(),
        description: "Pass-through proxy to a Prometheus HTTP API.".to_string(),
        capabilities: vec![Capability::Prometheus],
        context_length: 0,
        pricing: None,
        metadata: None,
    })?;

    Ok(registry)
}
