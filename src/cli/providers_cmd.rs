//! Providers command for Tether.
//!
//! Lists the providers a registry knows about.

use serde::{Deserialize, Serialize};

use crate::registry::ProviderRegistry;

/// Output format for the providers command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersOutput {
    /// Registered provider names, sorted.
    pub providers: Vec<String>,
}

impl ProvidersOutput {
    /// Format as human-readable text.
    pub fn format_text(&self) -> String {
        if self.providers.is_empty() {
            return "No providers registered.".to_string();
        }
        let mut lines = vec![format!("Providers ({}):", self.providers.len())];
        lines.extend(self.providers.iter().map(|name| format!("  {}", name)));
        lines.join("\n")
    }
}

/// The providers command implementation.
pub struct ProvidersCommand<'a> {
    registry: &'a ProviderRegistry,
}

impl<'a> ProvidersCommand<'a> {
    /// Create a new providers command.
    pub fn new(registry: &'a ProviderRegistry) -> Self {
        Self { registry }
    }

    /// Run the providers command.
    pub fn run(&self) -> ProvidersOutput {
        ProvidersOutput {
            providers: self.registry.names(),
        }
    }
}
