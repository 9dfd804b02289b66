use std::collections::HashMap;

use serde::Deserialize;

/// The watched configuration file's parsed shape.
///
/// ```toml
/// [[items]]
/// name = "worker-a"
/// [items.args]
/// region = "us-east"
///
/// [[items]]
/// name = "worker-b"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProcessConfig {
    #[serde(default)]
    pub items: Vec<ProcessItem>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct ProcessItem {
    pub name: String,
    #[serde(default)]
    pub args: HashMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Parses the raw TOML text of a watched configuration file.
pub fn parse_config(raw: &str) -> Result<ProcessConfig, ConfigError> {
    Ok(toml::from_str(raw)?)
}

/// Reads and parses a configuration file from disk.
pub fn read_config(path: impl AsRef<std::path::Path>) -> Result<ProcessConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    parse_config(&raw)
}

/// Maps `config.items` positionally into the manager pool's `data[]` vector:
/// slot `i` corresponds to `items[i]`. There is always exactly one entry per
/// item present in the file; an absent slot (beyond the end of `items`) is
/// represented upstream by the pool, not here.
pub fn parse_process_data(config: &ProcessConfig) -> Vec<ProcessItem> {
    config.items.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_items_with_and_without_args() {
        let raw = r#"
            [[items]]
            name = "worker-a"
            [items.args]
            region = "us-east"

            [[items]]
            name = "worker-b"
        "#;

        let config = parse_config(raw).unwrap();
        assert_eq!(config.items.len(), 2);
        assert_eq!(config.items[0].name, "worker-a");
        assert_eq!(config.items[0].args.get("region"), Some(&"us-east".to_string()));
        assert_eq!(config.items[1].name, "worker-b");
        assert!(config.items[1].args.is_empty());
    }

    #[test]
    fn empty_file_yields_no_items() {
        let config = parse_config("").unwrap();
        assert!(config.items.is_empty());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = parse_config("not = [valid").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn parse_process_data_maps_items_positionally() {
        let config = parse_config(
            r#"
            [[items]]
            name = "a"

            [[items]]
            name = "b"
        "#,
        )
        .unwrap();

        let data = parse_process_data(&config);
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].name, "a");
        assert_eq!(data[1].name, "b");
    }
}
