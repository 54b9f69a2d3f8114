//! Provider registry and model routing.
//!
//! The registry maps model identifiers onto registered providers. Routing is
//! prefix-based: `route("gpt-", "openai")` sends every `gpt-*` model to the
//! `openai` provider. A default provider catches everything unrouted.

use std::collections::HashMap;
use std::sync::Arc;

use crate::providers::base::Provider;
use crate::workspace::ResolveError;

/// Registry of available completion providers.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
    routes: Vec<(String, String)>,
    default: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            routes: Vec::new(),
            default: None,
        }
    }

    /// Register a provider under its own name. The first registered provider
    /// becomes the default.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        let name = provider.name().to_string();
        if self.default.is_none() {
            self.default = Some(name.clone());
        }
        self.providers.insert(name, provider);
    }

    /// Route models matching `model_prefix` to the named provider.
    pub fn route(&mut self, model_prefix: impl Into<String>, provider_name: impl Into<String>) {
        self.routes.push((model_prefix.into(), provider_name.into()));
    }

    /// Make the named provider the fallback for unrouted models.
    pub fn set_default(&mut self, provider_name: impl Into<String>) {
        self.default = Some(provider_name.into());
    }

    /// Look up a provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// Select the provider serving a model identifier.
    ///
    /// The longest matching route prefix wins; with no matching route the
    /// default provider is used.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NoProvider`] when neither a route nor a
    /// default resolves to a registered provider.
    pub fn for_model(&self, model: &str) -> Result<Arc<dyn Provider>, ResolveError> {
        let routed = self
            .routes
            .iter()
            .filter(|(prefix, _)| model.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, name)| name.as_str());

        routed
            .or(self.default.as_deref())
            .and_then(|name| self.providers.get(name).cloned())
            .ok_or_else(|| ResolveError::NoProvider {
                model: model.to_string(),
            })
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::adapters::ScriptedProvider;

    fn scripted(name: &str) -> Arc<dyn Provider> {
        Arc::new(ScriptedProvider::named(name).always("content", 5))
    }

    #[test]
    fn test_first_registered_is_default() {
        let mut registry = ProviderRegistry::new();
        registry.register(scripted("alpha"));
        registry.register(scripted("beta"));

        let provider = registry.for_model("some-model").unwrap();
        assert_eq!(provider.name(), "alpha");
    }

    #[test]
    fn test_prefix_routing_longest_wins() {
        let mut registry = ProviderRegistry::new();
        registry.register(scripted("alpha"));
        registry.register(scripted("beta"));
        registry.register(scripted("gamma"));
        registry.route("gpt-", "beta");
        registry.route("gpt-4.1", "gamma");

        assert_eq!(registry.for_model("gpt-4o").unwrap().name(), "beta");
        assert_eq!(registry.for_model("gpt-4.1-mini").unwrap().name(), "gamma");
        assert_eq!(registry.for_model("claude-sonnet").unwrap().name(), "alpha");
    }

    #[test]
    fn test_no_provider_is_a_resolve_error() {
        let registry = ProviderRegistry::new();
        let err = registry.for_model("gpt-4o").unwrap_err();
        assert!(matches!(err, ResolveError::NoProvider { .. }));
    }

    #[test]
    fn test_route_to_unregistered_provider_fails() {
        let mut registry = ProviderRegistry::new();
        registry.route("gpt-", "missing");

        let err = registry.for_model("gpt-4o").unwrap_err();
        assert!(matches!(err, ResolveError::NoProvider { .. }));
    }
}
