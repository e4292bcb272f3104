use serde::{Deserialize, Serialize};

/// Knobs for HTML conversion, loadable from a host's JSON settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterOptions {
    /// Turn eligible links into embeds; still needs an eligibility checker.
    pub allow_embed: bool,
    /// Elements whose whole subtree is ignored.
    pub skipped_tags: Vec<String>,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            allow_embed: true,
            skipped_tags: ["script", "style", "noscript", "template"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl ConverterOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
