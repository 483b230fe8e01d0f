use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SEARCH_PROMPT: &str = "Find URLs related to company policies, privacy policy, terms of service, \
     data protection, cookie policy, acceptable use policy, and compliance documents.";

pub const DEFAULT_KEYWORDS: &[&str] = &[
    "privacy",
    "policy",
    "policies",
    "terms",
    "legal",
    "about",
    "contact",
    "faq",
    "help",
    "support",
    "cookie",
    "gdpr",
    "compliance",
    "data-protection",
    "acceptable-use",
    "tos",
    "terms-of-service",
];

/// Runtime settings, built once at startup and handed to each component.
#[derive(Debug, Clone)]
pub struct Config {
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub embedding_model: String,
    pub search_prompt: String,
    pub keywords: Vec<String>,
    pub max_sitemap_size: usize,
    pub fetch_timeout: Duration,
    pub classifier_timeout: Duration,
    pub retrieval_threshold: f32,
    pub routing_threshold: f32,
    pub retrieval_limit: usize,
    pub mongo_uri: String,
    pub mongo_db_name: String,
    pub output_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ollama_base_url: "http://localhost:11434".to_string(),
            ollama_model: "phi4-mini-reasoning".to_string(),
            embedding_model: "all-minilm".to_string(),
            search_prompt: DEFAULT_SEARCH_PROMPT.to_string(),
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            max_sitemap_size: 500,
            fetch_timeout: Duration::from_secs(10),
            classifier_timeout: Duration::from_secs(60),
            retrieval_threshold: 0.5,
            routing_threshold: 0.75,
            retrieval_limit: 5,
            mongo_uri: "mongodb://localhost:27017".to_string(),
            mongo_db_name: "policy_harvest".to_string(),
            output_dir: "scraped_data".to_string(),
        }
    }
}

impl Config {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Config {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup. Missing or unparsable values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Config
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let keywords = get("FILTER_KEYWORDS")
            .map(|raw| parse_keywords(&raw))
            .filter(|k| !k.is_empty())
            .unwrap_or(defaults.keywords);

        Config {
            ollama_base_url: get("OLLAMA_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.ollama_base_url),
            ollama_model: get("OLLAMA_MODEL")
                .map(|m| strip_provider_prefix(&m))
                .unwrap_or(defaults.ollama_model),
            embedding_model: get("EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            search_prompt: get("SEARCH_PROMPT").unwrap_or(defaults.search_prompt),
            keywords,
            max_sitemap_size: parse_or("MAX_SITEMAP_SIZE", get("MAX_SITEMAP_SIZE"), defaults.max_sitemap_size),
            fetch_timeout: Duration::from_secs(parse_or(
                "FETCH_TIMEOUT_SECS",
                get("FETCH_TIMEOUT_SECS"),
                defaults.fetch_timeout.as_secs(),
            )),
            classifier_timeout: Duration::from_secs(parse_or(
                "CLASSIFIER_TIMEOUT_SECS",
                get("CLASSIFIER_TIMEOUT_SECS"),
                defaults.classifier_timeout.as_secs(),
            )),
            retrieval_threshold: parse_or(
                "RETRIEVAL_THRESHOLD",
                get("RETRIEVAL_THRESHOLD"),
                defaults.retrieval_threshold,
            ),
            routing_threshold: parse_or(
                "ROUTING_THRESHOLD",
                get("ROUTING_THRESHOLD"),
                defaults.routing_threshold,
            ),
            retrieval_limit: parse_or("RETRIEVAL_LIMIT", get("RETRIEVAL_LIMIT"), defaults.retrieval_limit),
            mongo_uri: get("MONGO_URI").unwrap_or(defaults.mongo_uri),
            mongo_db_name: get("MONGO_DB_NAME").unwrap_or(defaults.mongo_db_name),
            output_dir: get("OUTPUT_DIR").unwrap_or(defaults.output_dir),
        }
    }
}

/// Split a comma separated keyword list, lower-casing and dropping blanks.
pub fn parse_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

// model names are sometimes given as "ollama/<model>"
fn strip_provider_prefix(model: &str) -> String {
    model
        .strip_prefix("ollama/")
        .unwrap_or(model)
        .to_string()
}

fn parse_or<T: FromStr + Copy>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(v) => v.trim().parse().unwrap_or_else(|_| {
            log::warn!("invalid value for {key}: {v:?}, using default");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.max_sitemap_size, 500);
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.classifier_timeout, Duration::from_secs(60));
        assert_eq!(config.routing_threshold, 0.75);
        assert_eq!(config.retrieval_threshold, 0.5);
        assert_eq!(config.keywords.len(), DEFAULT_KEYWORDS.len());
        assert_eq!(config.search_prompt, DEFAULT_SEARCH_PROMPT);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = Config::from_lookup(lookup(&[
            ("OLLAMA_BASE_URL", "http://llm.local:11434/"),
            ("OLLAMA_MODEL", "ollama/llama3"),
            ("FILTER_KEYWORDS", "Privacy, , Terms"),
            ("MAX_SITEMAP_SIZE", "42"),
            ("ROUTING_THRESHOLD", "0.9"),
        ]));
        assert_eq!(config.ollama_base_url, "http://llm.local:11434");
        assert_eq!(config.ollama_model, "llama3");
        assert_eq!(config.keywords, vec!["privacy", "terms"]);
        assert_eq!(config.max_sitemap_size, 42);
        assert_eq!(config.routing_threshold, 0.9);
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("MAX_SITEMAP_SIZE", "lots"),
            ("FETCH_TIMEOUT_SECS", "-3"),
        ]));
        assert_eq!(config.max_sitemap_size, 500);
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_blank_keyword_list_keeps_defaults() {
        let config = Config::from_lookup(lookup(&[("FILTER_KEYWORDS", " , ")]));
        assert_eq!(config.keywords.len(), DEFAULT_KEYWORDS.len());
    }
}
