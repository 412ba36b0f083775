use std::time::Duration;

use crate::novelty::NoveltyStrategyKind;

/// Which generation backend tier 10 talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Direct,
    Async,
    ManagedOnly,
    None,
}

impl ProviderKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => ProviderKind::None,
            "managed-only" | "managed_only" | "cms" => ProviderKind::ManagedOnly,
            "async" | "job" | "async-job" => ProviderKind::Async,
            _ => ProviderKind::Direct,
        }
    }

    pub fn generates(&self) -> bool {
        matches!(self, ProviderKind::Direct | ProviderKind::Async)
    }
}

/// Endpoint plus client-credentials pair.
#[derive(Clone)]
pub struct Credentials {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self { interval: Duration::from_secs(2), max_attempts: 30 }
    }
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub port: u16,
    pub dynamic_generation: bool,
    pub provider: ProviderKind,
    pub provider_credentials: Option<Credentials>,
    pub org_credentials: Option<Credentials>,
    pub asset_base_url: String,
    pub asset_dir: String,
    pub preseeded_catalog: Option<String>,
    pub novelty: NoveltyStrategyKind,
    pub poll: PollPolicy,
}

impl ResolverConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Missing or malformed values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port: u16 = get("PORT").and_then(|v| v.parse().ok()).unwrap_or(8080);
        let credentials = |prefix: &str| -> Option<Credentials> {
            Some(Credentials {
                base_url: get(&format!("{prefix}_BASE_URL"))?.trim_end_matches('/').to_string(),
                client_id: get(&format!("{prefix}_CLIENT_ID"))?,
                client_secret: get(&format!("{prefix}_CLIENT_SECRET"))?,
            })
        };

        let defaults = PollPolicy::default();
        let poll = PollPolicy {
            interval: get("GENERATION_POLL_INTERVAL_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.interval),
            max_attempts: get("GENERATION_POLL_MAX_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.max_attempts),
        };

        Self {
            port,
            dynamic_generation: get("ENABLE_DYNAMIC_BACKGROUNDS").map(|v| parse_flag(&v)).unwrap_or(false),
            provider: get("IMAGE_PROVIDER").map(|v| ProviderKind::parse(&v)).unwrap_or(ProviderKind::Direct),
            provider_credentials: credentials("IMAGE_PROVIDER"),
            org_credentials: credentials("ORG"),
            asset_base_url: get("ASSET_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://127.0.0.1:{port}")),
            asset_dir: get("ASSET_DIR").unwrap_or_else(|| "./public/assets".to_string()),
            preseeded_catalog: get("PRESEEDED_CATALOG"),
            novelty: get("NOVELTY_STRATEGY").map(|v| NoveltyStrategyKind::parse(&v)).unwrap_or_default(),
            poll,
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> ResolverConfig {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ResolverConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn empty_environment_degrades_quietly() {
        let cfg = config(&[]);
        assert!(!cfg.dynamic_generation);
        assert_eq!(cfg.provider, ProviderKind::Direct);
        assert!(cfg.provider_credentials.is_none());
        assert!(cfg.org_credentials.is_none());
        assert_eq!(cfg.asset_base_url, "http://127.0.0.1:8080");
        assert_eq!(cfg.poll, PollPolicy::default());
        assert_eq!(cfg.novelty, NoveltyStrategyKind::DenyList);
    }

    #[test]
    fn provider_selector_values() {
        assert_eq!(ProviderKind::parse("none"), ProviderKind::None);
        assert_eq!(ProviderKind::parse("Managed-Only"), ProviderKind::ManagedOnly);
        assert_eq!(ProviderKind::parse("async"), ProviderKind::Async);
        assert_eq!(ProviderKind::parse("firefly"), ProviderKind::Direct);
        assert!(!ProviderKind::ManagedOnly.generates());
    }

    #[test]
    fn credentials_need_all_three_parts() {
        let partial = config(&[("IMAGE_PROVIDER_BASE_URL", "https://gen.example.com/"), ("IMAGE_PROVIDER_CLIENT_ID", "id")]);
        assert!(partial.provider_credentials.is_none());

        let full = config(&[
            ("IMAGE_PROVIDER_BASE_URL", "https://gen.example.com/"),
            ("IMAGE_PROVIDER_CLIENT_ID", "id"),
            ("IMAGE_PROVIDER_CLIENT_SECRET", "s3cret"),
            ("ENABLE_DYNAMIC_BACKGROUNDS", "TRUE"),
            ("GENERATION_POLL_INTERVAL_MS", "250"),
            ("GENERATION_POLL_MAX_ATTEMPTS", "0"),
        ]);
        let creds = full.provider_credentials.unwrap();
        assert_eq!(creds.base_url, "https://gen.example.com");
        assert!(!format!("{creds:?}").contains("s3cret"));
        assert!(full.dynamic_generation);
        assert_eq!(full.poll.interval, Duration::from_millis(250));
        assert_eq!(full.poll.max_attempts, 30);
    }
}
