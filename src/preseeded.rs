use anyhow::Context;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use reqwest::Client;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::models::{PreseededAsset, Setting};

const BACKGROUND_ROOT: &str = "/assets/backgrounds";

/// Built-in variant counts per setting. Files are `{setting}-{n}.jpg`.
pub fn default_catalog() -> Vec<PreseededAsset> {
    let variants: &[(&str, usize, &[&str])] = &[
        ("bathroom", 3, &["marble", "daylight"]),
        ("bedroom", 2, &["linen", "warm"]),
        ("vanity", 2, &["mirror", "soft"]),
        ("kitchen", 1, &["wood"]),
        ("spa", 2, &["stone", "steam"]),
        ("gym", 1, &["matte"]),
        ("office", 1, &["desk"]),
        ("outdoor", 2, &["greenery", "sun"]),
        ("travel", 2, &["suitcase", "airy"]),
        ("neutral", 2, &["studio"]),
    ];
    variants
        .iter()
        .flat_map(|(setting, count, tags)| {
            (1..=*count).map(move |n| PreseededAsset {
                setting: setting.to_string(),
                variant: format!("{setting}-{n}"),
                path: format!("{BACKGROUND_ROOT}/{setting}-{n}.jpg"),
                tags: tags.iter().map(|t| t.to_string()).collect(),
            })
        })
        .collect()
}

/// Reads a JSON array of [`PreseededAsset`] replacing the built-in catalog.
pub fn load_catalog(path: &str) -> anyhow::Result<Vec<PreseededAsset>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading preseeded catalog {path}"))?;
    let catalog: Vec<PreseededAsset> = serde_json::from_str(&raw).with_context(|| format!("parsing preseeded catalog {path}"))?;
    Ok(catalog)
}

fn catalog_key(setting: &Setting) -> String {
    setting.as_str().to_ascii_lowercase()
}

/// Static catalog of ready-made backgrounds with per-setting rotation memory.
pub struct PreseededAssetBank {
    client: Client,
    origin: String,
    by_setting: HashMap<String, Vec<PreseededAsset>>,
    last_used: Mutex<HashMap<String, String>>,
}

impl PreseededAssetBank {
    /// `origin` is where asset paths are served from for the existence probe.
    pub fn new(client: Client, origin: &str, catalog: Vec<PreseededAsset>) -> Self {
        let mut by_setting: HashMap<String, Vec<PreseededAsset>> = HashMap::new();
        for asset in catalog {
            by_setting.entry(asset.setting.to_ascii_lowercase()).or_default().push(asset);
        }
        Self {
            client,
            origin: origin.trim_end_matches('/').to_string(),
            by_setting,
            last_used: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub fn variant_count(&self, setting: &Setting) -> usize {
        self.by_setting.get(&catalog_key(setting)).map_or(0, Vec::len)
    }

    /// Picks a variant, avoiding the one handed out last time for this setting.
    pub fn pick(&self, setting: &Setting) -> Option<PreseededAsset> {
        let chosen = self.candidates(setting).into_iter().next()?;
        self.mark_used(setting, &chosen);
        Some(chosen)
    }

    /// Every eligible variant in random order. The previous pick is left out
    /// when the setting has more than one variant.
    pub fn candidates(&self, setting: &Setting) -> Vec<PreseededAsset> {
        let key = catalog_key(setting);
        let Some(variants) = self.by_setting.get(&key) else { return Vec::new() };
        let previous = self.last_used.lock().get(&key).cloned();

        let mut pool: Vec<PreseededAsset> = match previous {
            Some(previous) if variants.len() > 1 => variants.iter().filter(|a| a.variant != previous).cloned().collect(),
            _ => variants.clone(),
        };
        pool.shuffle(&mut rand::thread_rng());
        pool
    }

    pub fn mark_used(&self, setting: &Setting, asset: &PreseededAsset) {
        self.last_used.lock().insert(catalog_key(setting), asset.variant.clone());
        debug!("🎲 Picked preseeded variant {} for {}", asset.variant, setting);
    }

    /// Absolute URL of an asset, for callers outside the storefront origin.
    pub fn url_for(&self, asset: &PreseededAsset) -> String {
        format!("{}{}", self.origin, asset.path)
    }

    /// HEAD probe: the asset must answer 2xx with an `image/*` content type.
    pub async fn exists(&self, asset: &PreseededAsset) -> bool {
        let url = self.url_for(asset);
        match self.client.head(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let is_image = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|ct| ct.starts_with("image/"));
                if !is_image {
                    warn!("⚠️ Preseeded asset {} is not served as an image", url);
                }
                is_image
            }
            Ok(response) => {
                warn!("⚠️ Preseeded asset {} missing ({})", url, response.status());
                false
            }
            Err(e) => {
                warn!("⚠️ Existence probe for {} failed: {}", url, e);
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::test_support::spawn_server;
    use axum::{Router, http::{header, StatusCode}, response::IntoResponse, routing::get};
    use pretty_assertions::assert_eq;

    pub fn asset(setting: &str, variant: &str) -> PreseededAsset {
        PreseededAsset {
            setting: setting.into(),
            variant: variant.into(),
            path: format!("{BACKGROUND_ROOT}/{variant}.jpg"),
            tags: vec![],
        }
    }

    /// Static host serving every path under `/assets/backgrounds` listed in `present`.
    pub async fn asset_host(present: &'static [&'static str]) -> String {
        let router = Router::new().route(
            "/assets/backgrounds/:file",
            get(move |axum::extract::Path(file): axum::extract::Path<String>| async move {
                if present.contains(&file.as_str()) {
                    ([(header::CONTENT_TYPE, "image/jpeg")], "jpeg-bytes").into_response()
                } else {
                    (StatusCode::NOT_FOUND, [(header::CONTENT_TYPE, "text/plain")], "nope").into_response()
                }
            }),
        );
        spawn_server(router).await
    }

    #[test]
    fn default_catalog_paths() {
        let catalog = default_catalog();
        assert!(catalog.iter().any(|a| a.path == "/assets/backgrounds/bathroom-2.jpg"));
        let bank = PreseededAssetBank::new(Client::new(), "http://unused", catalog);
        assert_eq!(bank.variant_count(&Setting::Bathroom), 3);
        assert_eq!(bank.variant_count(&Setting::from("unknown-setting-xyz")), 0);
    }

    #[test]
    fn rotation_never_repeats_back_to_back() {
        let bank = PreseededAssetBank::new(
            Client::new(),
            "http://unused",
            vec![asset("spa", "spa-1"), asset("spa", "spa-2"), asset("spa", "spa-3")],
        );
        let mut previous = bank.pick(&Setting::Spa).unwrap().variant;
        for _ in 0..50 {
            let next = bank.pick(&Setting::Spa).unwrap().variant;
            assert_ne!(next, previous);
            previous = next;
        }
    }

    #[test]
    fn single_variant_and_empty_settings() {
        let bank = PreseededAssetBank::new(Client::new(), "http://unused", vec![asset("gym", "gym-1")]);
        assert_eq!(bank.pick(&Setting::Gym).unwrap().variant, "gym-1");
        assert_eq!(bank.pick(&Setting::Gym).unwrap().variant, "gym-1");
        assert_eq!(bank.pick(&Setting::Travel), None);
    }

    #[test]
    fn custom_settings_match_regardless_of_case() {
        let bank = PreseededAssetBank::new(Client::new(), "http://unused", vec![asset("Rooftop", "rooftop-1")]);
        assert_eq!(bank.pick(&Setting::from("ROOFTOP")).unwrap().variant, "rooftop-1");
        assert_eq!(bank.pick(&Setting::from("rooftop")).unwrap().variant, "rooftop-1");
    }

    #[test]
    fn candidates_leave_out_the_previous_pick() {
        let bank = PreseededAssetBank::new(
            Client::new(),
            "http://unused",
            vec![asset("spa", "spa-1"), asset("spa", "spa-2"), asset("spa", "spa-3")],
        );
        assert_eq!(bank.candidates(&Setting::Spa).len(), 3);
        let previous = bank.pick(&Setting::Spa).unwrap();
        let rest = bank.candidates(&Setting::Spa);
        assert_eq!(rest.len(), 2);
        assert!(!rest.contains(&previous));
    }

    #[test]
    fn catalog_file_replaces_defaults() {
        let path = std::env::temp_dir().join(format!("catalog-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"[{"setting":"spa","variant":"spa-x","path":"/assets/backgrounds/spa-x.jpg"}]"#).unwrap();
        let catalog = load_catalog(path.to_str().unwrap()).unwrap();
        assert_eq!(catalog, vec![asset("spa", "spa-x")]);
        assert!(load_catalog("/definitely/not/here.json").is_err());
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn existence_probe_checks_status_and_content_type() {
        let origin = asset_host(&["bathroom-2.jpg"]).await;
        let bank = PreseededAssetBank::new(Client::new(), &origin, vec![]);
        assert!(bank.exists(&asset("bathroom", "bathroom-2")).await);
        assert!(!bank.exists(&asset("bathroom", "bathroom-1")).await);
    }
}
