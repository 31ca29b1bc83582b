use std::path::Path;

use serde::Deserialize;

/// Tunables of the semantic passes, read from the `[sema]` table of a
/// `quill.toml` or built in code.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SemaConfig {
    /// Report declared type templates that no code ever instantiates.
    pub require_template_instantiation: bool,
    /// Allow literals to narrow to a smaller type during overload resolution.
    pub literal_demotion: bool,
    /// Deepest chain of instantiations one instantiation may trigger.
    pub max_template_depth: u32,
    /// Upper bound for the member-access coalescing fixpoint.
    pub max_coalesce_passes: u32,
}

impl Default for SemaConfig {
    fn default() -> Self {
        SemaConfig {
            require_template_instantiation: true,
            literal_demotion: true,
            max_template_depth: 64,
            max_coalesce_passes: 256,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    sema: SemaConfig,
}

impl SemaConfig {
    /// Parse the `[sema]` table of a TOML document. Missing keys keep
    /// their defaults; a missing table yields the default configuration.
    pub fn from_toml_str(content: &str) -> Result<SemaConfig, String> {
        toml::from_str::<ConfigFile>(content)
            .map(|file| file.sema)
            .map_err(|e| format!("Failed to parse config: {}", e))
    }

    pub fn from_file(path: &Path) -> Result<SemaConfig, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content)
    }
}
