//! CLI configuration via environment variables

use std::env;

/// CLI settings loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Default to JSON output (CAIRN_JSON=1)
    pub default_json: bool,
    /// Disable colored output (CAIRN_NO_COLOR=1 or NO_COLOR=1)
    pub no_color: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            default_json: env::var("CAIRN_JSON")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
            no_color: env::var("CAIRN_NO_COLOR").is_ok() || env::var("NO_COLOR").is_ok(),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(value.to_lowercase().as_str(), "" | "0" | "false" | "off" | "no")
}
