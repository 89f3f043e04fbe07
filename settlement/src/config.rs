//! Configuration for the settlement crate

use serde::{Deserialize, Serialize};

/// Settlement configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Payment link configuration
    pub links: LinkConfig,
}

/// Payment link configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// App deep-link base, without query
    pub deep_link_base: String,

    /// Web fallback base URL
    pub web_base_url: String,

    /// Prepended to every payment note as `"{prefix} - {label}"`
    pub note_prefix: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            deep_link_base: "venmo://paycharge".to_string(),
            web_base_url: "https://venmo.com/".to_string(),
            note_prefix: "Poker Night Settlement".to_string(),
        }
    }
}
