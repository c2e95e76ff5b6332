use serde::{Deserialize, Serialize};

/// Editor configuration, read from camelCase JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    /// Name of the model root and the editing view root
    #[serde(default = "default_root_name")]
    pub root_name: String,

    /// Element wrapping text that lands where text is not allowed
    #[serde(default = "default_paragraph_element")]
    pub paragraph_element: String,

    #[serde(default)]
    pub undo: UndoConfig,

    #[serde(default)]
    pub read_only: bool,

    /// Breaks ties between concurrent operations; the lower id wins
    #[serde(default)]
    pub client_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoConfig {
    /// Undo steps kept (0 = unlimited)
    #[serde(default = "default_max_levels")]
    pub max_levels: usize,
}

fn default_root_name() -> String {
    "main".to_string()
}

fn default_paragraph_element() -> String {
    "paragraph".to_string()
}

fn default_max_levels() -> usize {
    100
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            max_levels: default_max_levels(),
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            root_name: default_root_name(),
            paragraph_element: default_paragraph_element(),
            undo: UndoConfig::default(),
            read_only: false,
            client_id: 0,
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_client_id(mut self, client_id: u32) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "rootName": "body",
            "undo": { "maxLevels": 5 },
            "clientId": 3
        }"#;

        let config = EditorConfig::from_json(json).expect("Failed to parse config");
        assert_eq!(config.root_name, "body");
        assert_eq!(config.paragraph_element, "paragraph");
        assert_eq!(config.undo.max_levels, 5);
        assert!(!config.read_only);
        assert_eq!(config.client_id, 3);
    }

    #[test]
    fn test_default_config() {
        let config = EditorConfig::from_json("{}").expect("Failed to parse config");
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.root_name, "main");
        assert_eq!(config.undo.max_levels, 100);
    }
}
