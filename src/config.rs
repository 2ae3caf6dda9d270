use std::collections::HashMap;
use std::fs;

/// API configuration shared by the LLM session, search and image tools
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub llm_base_url: String,
    pub llm_timeout: u64,
    pub default_model: String,
    pub calc_model: String,
    pub default_temperature: f32,
    pub default_max_tokens: i32,
    pub max_discord_message_length: usize,
    pub searxng_base_url: String,
    pub extractor_base_url: String,
    pub extractor_api_key: Option<String>,
    pub image_api_endpoint: String,
    pub image_api_keys: Vec<String>,
}

/// Load API configuration from apiconf.txt using multi-path fallback
pub fn load_api_config() -> Result<ApiConfig, Box<dyn std::error::Error + Send + Sync>> {
    load_api_config_from(&[
        "apiconf.txt",
        "../apiconf.txt",
        "../../apiconf.txt",
        "src/apiconf.txt",
    ])
}

fn load_api_config_from(
    config_paths: &[&str],
) -> Result<ApiConfig, Box<dyn std::error::Error + Send + Sync>> {
    let mut content = String::new();
    let mut found_file = false;
    let mut config_source = "";

    // Try to find the config file in multiple locations
    for config_path in config_paths {
        match fs::read_to_string(config_path) {
            Ok(file_content) => {
                content = file_content;
                found_file = true;
                config_source = config_path;
                break;
            }
            Err(_) => {
                continue;
            }
        }
    }

    if !found_file {
        return Err("apiconf.txt file not found in any expected location (., .., ../.., src/)".into());
    }

    let config_map = parse_key_values(&content);

    // Check for required keys
    let required_keys = [
        "LLM_BASE_URL",
        "LLM_TIMEOUT",
        "DEFAULT_MODEL",
        "CALC_MODEL",
        "DEFAULT_TEMPERATURE",
        "DEFAULT_MAX_TOKENS",
        "MAX_DISCORD_MESSAGE_LENGTH",
        "SEARXNG_BASE_URL",
        "EXTRACTOR_BASE_URL",
        "IMAGE_API_ENDPOINT",
    ];

    for key in &required_keys {
        if !config_map.contains_key(*key) {
            return Err(format!(
                "❌ Required setting '{}' not found in {}",
                key, config_source
            )
            .into());
        }
    }

    let config = ApiConfig {
        llm_base_url: config_map
            .get("LLM_BASE_URL")
            .ok_or("LLM_BASE_URL not found")?
            .clone(),
        llm_timeout: config_map
            .get("LLM_TIMEOUT")
            .ok_or("LLM_TIMEOUT not found")?
            .parse()
            .map_err(|_| "Invalid LLM_TIMEOUT value")?,
        default_model: config_map
            .get("DEFAULT_MODEL")
            .ok_or("DEFAULT_MODEL not found")?
            .clone(),
        calc_model: config_map
            .get("CALC_MODEL")
            .ok_or("CALC_MODEL not found")?
            .clone(),
        default_temperature: config_map
            .get("DEFAULT_TEMPERATURE")
            .ok_or("DEFAULT_TEMPERATURE not found")?
            .parse()
            .map_err(|_| "Invalid DEFAULT_TEMPERATURE value")?,
        default_max_tokens: config_map
            .get("DEFAULT_MAX_TOKENS")
            .ok_or("DEFAULT_MAX_TOKENS not found")?
            .parse()
            .map_err(|_| "Invalid DEFAULT_MAX_TOKENS value")?,
        max_discord_message_length: config_map
            .get("MAX_DISCORD_MESSAGE_LENGTH")
            .ok_or("MAX_DISCORD_MESSAGE_LENGTH not found")?
            .parse()
            .map_err(|_| "Invalid MAX_DISCORD_MESSAGE_LENGTH value")?,
        searxng_base_url: config_map
            .get("SEARXNG_BASE_URL")
            .ok_or("SEARXNG_BASE_URL not found")?
            .trim_end_matches('/')
            .to_string(),
        extractor_base_url: config_map
            .get("EXTRACTOR_BASE_URL")
            .ok_or("EXTRACTOR_BASE_URL not found")?
            .clone(),
        // Optional: the extractor works unauthenticated at a lower rate limit
        extractor_api_key: config_map
            .get("EXTRACTOR_API_KEY")
            .filter(|v| !v.is_empty())
            .cloned(),
        image_api_endpoint: config_map
            .get("IMAGE_API_ENDPOINT")
            .ok_or("IMAGE_API_ENDPOINT not found")?
            .clone(),
        image_api_keys: config_map
            .get("IMAGE_API_KEYS")
            .map(|v| {
                v.split(',')
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
    };

    println!("⚙️  Configuration loaded successfully from {}", config_source);
    Ok(config)
}

/// Parse KEY=VALUE lines, skipping comments and stripping a leading BOM
pub fn parse_key_values(content: &str) -> HashMap<String, String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut map = HashMap::new();

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(equals_pos) = line.find('=') {
            let key = line[..equals_pos].trim().to_string();
            let value = line[equals_pos + 1..].trim().to_string();
            map.insert(key, value);
        }
    }

    map
}
