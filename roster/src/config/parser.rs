use super::types::RosterConfig;
use crate::error::Result;
use std::path::Path;

/// Parse and validate a roster.yaml file
pub fn parse_config(path: &Path) -> Result<RosterConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse and validate a roster config YAML string
pub fn parse_config_str(content: &str) -> Result<RosterConfig> {
    let config: RosterConfig = serde_yaml::from_str(content)?;
    config.validate()?;
    Ok(config)
}
