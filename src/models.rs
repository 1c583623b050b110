use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

fn default_method() -> String {
    "GET".to_string()
}

fn default_use_cache() -> bool {
    true
}

fn default_max_concurrent() -> usize {
    5
}

// One outbound request descriptor. `url` may be relative to the endpoint's
// base URL or absolute. `api_key` doubles as the rate-limit key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub endpoint: String,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl FetchRequest {
    pub fn get(endpoint: &str, url: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            url: url.to_string(),
            method: default_method(),
            params: BTreeMap::new(),
            body: None,
            headers: HashMap::new(),
            use_cache: true,
            api_key: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub items: Vec<FetchRequest>,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}
