use serde::{Serialize, Deserialize};
use serde_with::skip_serializing_none;
use chrono::{DateTime, Utc};
use std::fmt;

/// Semantic scene category a background is bucketed under.
///
/// Anything outside the known set lands in `Custom` and is always treated as novel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Setting {
    Bathroom,
    Bedroom,
    Vanity,
    Kitchen,
    Spa,
    Gym,
    Office,
    Outdoor,
    Travel,
    Neutral,
    Custom(String),
}

impl Setting {
    pub const KNOWN: [Setting; 10] = [
        Setting::Bathroom,
        Setting::Bedroom,
        Setting::Vanity,
        Setting::Kitchen,
        Setting::Spa,
        Setting::Gym,
        Setting::Office,
        Setting::Outdoor,
        Setting::Travel,
        Setting::Neutral,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Setting::Bathroom => "bathroom",
            Setting::Bedroom => "bedroom",
            Setting::Vanity => "vanity",
            Setting::Kitchen => "kitchen",
            Setting::Spa => "spa",
            Setting::Gym => "gym",
            Setting::Office => "office",
            Setting::Outdoor => "outdoor",
            Setting::Travel => "travel",
            Setting::Neutral => "neutral",
            Setting::Custom(s) => s,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Setting::Custom(_))
    }

    /// Default visual treatment used when no creative prompt is supplied.
    pub fn default_scene(&self) -> &str {
        match self {
            Setting::Bathroom => "a bright modern bathroom with marble countertop and soft daylight",
            Setting::Bedroom => "a calm bedroom nightstand with linen textures and warm morning light",
            Setting::Vanity => "an elegant vanity table with a round mirror and gentle diffused light",
            Setting::Kitchen => "a clean kitchen counter with natural wood and window light",
            Setting::Spa => "a serene spa shelf with stones, towels and steam",
            Setting::Gym => "a minimal gym bench area with matte surfaces and cool light",
            Setting::Office => "a tidy desk surface with neutral tones and indirect light",
            Setting::Outdoor => "an outdoor terrace with greenery and golden hour sun",
            Setting::Travel => "a travel flat-lay with a suitcase, passport and airy light",
            Setting::Neutral | Setting::Custom(_) => "a seamless neutral studio backdrop with soft shadows",
        }
    }
}

impl From<String> for Setting {
    fn from(raw: String) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        Setting::KNOWN
            .iter()
            .find(|s| s.as_str() == normalized)
            .cloned()
            .unwrap_or(Setting::Custom(raw.trim().to_string()))
    }
}

impl From<&str> for Setting {
    fn from(raw: &str) -> Self { Setting::from(raw.to_string()) }
}

impl From<Setting> for String {
    fn from(s: Setting) -> Self { s.as_str().to_string() }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Product {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// Caller-supplied knobs for a single resolution. Each one short-circuits or
/// redirects part of the pipeline.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ResolutionOptions {
    #[serde(default)]
    pub creative_prompt: Option<String>,
    /// Explicit image URL that wins outright.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Registry asset the caller already displays; only used for usage tracking.
    #[serde(default)]
    pub registry_asset_id: Option<String>,
    #[serde(default)]
    pub edit_mode: bool,
    #[serde(default)]
    pub edit_prompt: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub customer_context: Option<String>,
    #[serde(default)]
    pub scene_type: Option<String>,
    /// Already-resolved background to keep as is.
    #[serde(default)]
    pub existing_background: Option<String>,
    #[serde(default)]
    pub cms_asset_id: Option<String>,
    #[serde(default)]
    pub cms_tag: Option<String>,
}

impl ResolutionOptions {
    pub fn prompt(&self) -> Option<&str> {
        self.creative_prompt.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct RegistryCriteria {
    pub setting: String,
    pub mood: Option<String>,
    pub customer_context: Option<String>,
    pub scene_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RegistryAsset {
    pub id: String,
    pub image_url: String,
    pub setting: String,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub customer_context: Option<String>,
    #[serde(default)]
    pub scene_type: Option<String>,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl RegistryAsset {
    /// Placeholders and gradients are registered for bookkeeping but are not real images.
    pub fn has_real_image(&self) -> bool {
        let url = self.image_url.trim();
        !url.is_empty()
            && !url.to_ascii_lowercase().contains("placeholder")
            && !url.starts_with("linear-gradient")
    }
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NewRegistryAsset {
    pub image_url: String,
    pub setting: String,
    pub mood: Option<String>,
    pub customer_context: Option<String>,
    pub scene_type: Option<String>,
    pub generation_prompt: String,
    pub edited: bool,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ManagedAssetQuery {
    pub asset_id: Option<String>,
    pub tag: Option<String>,
    pub setting: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PreseededAsset {
    pub setting: String,
    pub variant: String,
    pub path: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResolveRequest {
    pub setting: Setting,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub options: ResolutionOptions,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NoveltyRequest {
    pub setting: Setting,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn setting_parses_case_insensitively_and_keeps_unknowns() {
        assert_eq!(Setting::from(" Bathroom "), Setting::Bathroom);
        assert_eq!(Setting::from("unknown-setting-xyz"), Setting::Custom("unknown-setting-xyz".into()));
        assert!(!Setting::from("rooftop").is_known());
    }

    #[test]
    fn setting_round_trips_through_json_as_plain_string() {
        let req: ResolveRequest = serde_json::from_str(r#"{"setting":"travel"}"#).unwrap();
        assert_eq!(req.setting, Setting::Travel);
        assert!(req.products.is_empty());
        assert_eq!(serde_json::to_value(&req.setting).unwrap(), serde_json::json!("travel"));
    }

    #[test]
    fn placeholder_registry_images_are_not_real() {
        let mut asset = RegistryAsset {
            id: "a1".into(),
            image_url: "https://cdn.example.com/placeholder.png".into(),
            setting: "spa".into(),
            mood: None,
            customer_context: None,
            scene_type: None,
            usage_count: 0,
            created_at: None,
        };
        assert!(!asset.has_real_image());
        asset.image_url = "linear-gradient(135deg, #fff 0%, #000 100%)".into();
        assert!(!asset.has_real_image());
        asset.image_url = "https://cdn.example.com/spa-7.jpg".into();
        assert!(asset.has_real_image());
    }

    #[test]
    fn blank_prompt_counts_as_absent() {
        let opts = ResolutionOptions { creative_prompt: Some("   ".into()), ..Default::default() };
        assert_eq!(opts.prompt(), None);
    }
}
