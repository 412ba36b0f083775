//! Background resolution pipeline.
//!
//! Tiers run one at a time and the first usable answer wins: preserved
//! background, cache, explicit override, registry, preseeded bank, managed
//! CMS asset and finally paid generation. Whatever happens, `resolve`
//! hands back something displayable; the setting's gradient is the floor.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::cache::{cache_key, AssetCache};
use crate::config::ProviderKind;
use crate::detached::DetachedTasks;
use crate::gradient::fallback_gradient;
use crate::managed::ManagedAssetClient;
use crate::models::{ManagedAssetQuery, NewRegistryAsset, Product, RegistryAsset, RegistryCriteria, ResolutionOptions, Setting};
use crate::novelty::NoveltyClassifier;
use crate::preseeded::PreseededAssetBank;
use crate::providers::{build_generation_prompt, scene_prompt, GenerationError, GenerationProvider};
use crate::registry::RegistryClient;

const SCENE_SLUG_LEN: usize = 50;

#[derive(Debug, Clone, Copy)]
pub struct ResolverSettings {
    pub dynamic_generation: bool,
    pub provider: ProviderKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Preserved,
    Cache,
    Override,
    Registry,
    Preseeded,
    Managed,
    Generated,
    Gradient,
}

#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub image: String,
    pub source: ResolutionSource,
    pub novel: bool,
    pub cache_key: String,
}

struct Generated {
    image: String,
    prompt: String,
    edited: bool,
}

pub struct BackgroundResolver {
    settings: ResolverSettings,
    novelty: NoveltyClassifier,
    cache: AssetCache,
    bank: PreseededAssetBank,
    registry: Option<Arc<dyn RegistryClient>>,
    managed: Option<Arc<dyn ManagedAssetClient>>,
    generator: Option<Arc<dyn GenerationProvider>>,
    tasks: DetachedTasks,
}

impl BackgroundResolver {
    pub fn new(settings: ResolverSettings, novelty: NoveltyClassifier, bank: PreseededAssetBank) -> Self {
        Self {
            settings,
            novelty,
            cache: AssetCache::default(),
            bank,
            registry: None,
            managed: None,
            generator: None,
            tasks: DetachedTasks::default(),
        }
    }

    pub fn with_registry(mut self, registry: Arc<dyn RegistryClient>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_managed(mut self, managed: Arc<dyn ManagedAssetClient>) -> Self {
        self.managed = Some(managed);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn GenerationProvider>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn cache(&self) -> &AssetCache { &self.cache }

    pub fn tasks(&self) -> &DetachedTasks { &self.tasks }

    pub fn novelty(&self) -> &NoveltyClassifier { &self.novelty }

    pub async fn resolve(&self, setting: &Setting, products: &[Product], options: &ResolutionOptions) -> String {
        self.resolve_detailed(setting, products, options).await.image
    }

    pub async fn resolve_detailed(&self, setting: &Setting, products: &[Product], options: &ResolutionOptions) -> Resolution {
        let prompt = options.prompt();
        let novel = self.novelty.is_novel(prompt, setting);
        let key = cache_key(setting, options);
        info!("🎯 Resolving background for '{}' (novel: {}, key: {})", setting, novel, key);

        // Keeping what the caller already shows beats everything, cache included.
        if let Some(existing) = non_blank(options.existing_background.as_deref()) {
            debug!("🔒 Preserving existing background");
            return Resolution { image: existing.to_string(), source: ResolutionSource::Preserved, novel, cache_key: key };
        }

        if let Some(hit) = self.cache.get(&key) {
            debug!("⚡ Cache hit for {}", key);
            return Resolution { image: hit, source: ResolutionSource::Cache, novel, cache_key: key };
        }

        if let Some(url) = non_blank(options.image_url.as_deref()) {
            info!("🖼️ Using explicit image override");
            return self.remember(key, url.to_string(), ResolutionSource::Override, novel);
        }

        if let Some(id) = non_blank(options.registry_asset_id.as_deref()) {
            self.track_usage(id);
        }

        let scene_type = scene_type(options, prompt, novel);

        if !options.edit_mode {
            if let Some(asset) = self.registry_match(setting, options, scene_type.clone()).await {
                info!("📚 Reusing registry asset {}", asset.id);
                self.track_usage(&asset.id);
                return self.remember(key, asset.image_url, ResolutionSource::Registry, novel);
            }
        }

        if !options.edit_mode && !novel {
            if let Some(asset) = self.verified_preseeded(setting).await {
                info!("🗃️ Using preseeded variant {}", asset.variant);
                return self.remember(key, asset.path, ResolutionSource::Preseeded, novel);
            }
        }

        if !self.settings.dynamic_generation && !novel {
            info!("⏹️ Dynamic generation disabled, falling back to gradient");
            return self.gradient(key, setting, novel);
        }

        let managed = if novel { None } else { self.managed_asset(setting, options).await };
        if let Some(url) = &managed {
            if !options.edit_mode {
                info!("🗂️ Using managed asset");
                return self.remember(key, url.clone(), ResolutionSource::Managed, novel);
            }
        }

        let generator = match (&self.generator, self.settings.provider.generates()) {
            (Some(generator), true) => generator.clone(),
            _ => {
                info!("🚫 Generation unavailable (provider: {:?})", self.settings.provider);
                return self.managed_or_gradient(key, managed, setting, novel);
            }
        };

        match self.generate(generator.as_ref(), setting, products, options, prompt, managed.as_deref()).await {
            Ok(generated) => {
                info!("✅ Generated background via {} provider", generator.name());
                self.schedule_write_back(setting, options, scene_type, &generated);
                self.remember(key, generated.image, ResolutionSource::Generated, novel)
            }
            Err(e) => {
                error!("❌ Background generation failed: {}", e);
                self.managed_or_gradient(key, managed, setting, novel)
            }
        }
    }

    fn remember(&self, key: String, image: String, source: ResolutionSource, novel: bool) -> Resolution {
        self.cache.insert(&key, &image);
        Resolution { image, source, novel, cache_key: key }
    }

    fn gradient(&self, key: String, setting: &Setting, novel: bool) -> Resolution {
        self.remember(key, fallback_gradient(setting).to_string(), ResolutionSource::Gradient, novel)
    }

    fn managed_or_gradient(&self, key: String, managed: Option<String>, setting: &Setting, novel: bool) -> Resolution {
        match managed {
            Some(url) => self.remember(key, url, ResolutionSource::Managed, novel),
            None => self.gradient(key, setting, novel),
        }
    }

    fn track_usage(&self, id: &str) {
        let Some(registry) = self.registry.clone() else { return };
        let id = id.to_string();
        self.tasks.spawn("registry-usage", async move {
            registry.record_usage(&id).await?;
            Ok(())
        });
    }

    async fn registry_match(&self, setting: &Setting, options: &ResolutionOptions, scene_type: Option<String>) -> Option<RegistryAsset> {
        let registry = self.registry.as_ref()?;
        let criteria = RegistryCriteria {
            setting: setting.to_string(),
            mood: options.mood.clone(),
            customer_context: options.customer_context.clone(),
            scene_type,
        };
        match registry.find(&criteria).await {
            Ok(Some(asset)) if asset.has_real_image() => Some(asset),
            Ok(_) => None,
            Err(e) => {
                warn!("⚠️ Registry lookup failed, skipping tier: {}", e);
                None
            }
        }
    }

    async fn verified_preseeded(&self, setting: &Setting) -> Option<crate::models::PreseededAsset> {
        for asset in self.bank.candidates(setting) {
            if self.bank.exists(&asset).await {
                self.bank.mark_used(setting, &asset);
                return Some(asset);
            }
        }
        None
    }

    async fn managed_asset(&self, setting: &Setting, options: &ResolutionOptions) -> Option<String> {
        let managed = self.managed.as_ref()?;
        let query = ManagedAssetQuery {
            asset_id: options.cms_asset_id.clone(),
            tag: options.cms_tag.clone(),
            setting: setting.to_string(),
        };
        match managed.fetch(&query).await {
            Ok(found) => found,
            Err(e) => {
                warn!("⚠️ CMS lookup failed, skipping tier: {}", e);
                None
            }
        }
    }

    async fn generate(
        &self,
        generator: &dyn GenerationProvider,
        setting: &Setting,
        products: &[Product],
        options: &ResolutionOptions,
        prompt: Option<&str>,
        managed_seed: Option<&str>,
    ) -> Result<Generated, GenerationError> {
        if options.edit_mode {
            let seed = match managed_seed {
                Some(seed) => Some(seed.to_string()),
                None => self.verified_preseeded(setting).await.map(|asset| self.bank.url_for(&asset)),
            };
            if let Some(seed) = seed {
                let instruction = non_blank(options.edit_prompt.as_deref()).or(prompt).unwrap_or(setting.default_scene());
                let generation_prompt = build_generation_prompt(setting, instruction);
                info!("✏️ Editing seed image {}", seed);
                let image = generator.edit_scene_background(&seed, &generation_prompt).await?;
                return Ok(Generated { image, prompt: generation_prompt, edited: true });
            }
            warn!("⚠️ Edit requested but no seed image available, generating fresh");
        }

        match prompt {
            Some(prompt) => {
                let generation_prompt = build_generation_prompt(setting, prompt);
                let image = generator.generate_from_prompt(&generation_prompt).await?;
                Ok(Generated { image, prompt: generation_prompt, edited: false })
            }
            None => {
                let image = generator.generate_scene_background(setting, products).await?;
                Ok(Generated { image, prompt: scene_prompt(setting, products), edited: false })
            }
        }
    }

    /// Warms the CMS and registry with a fresh generation. Never awaited.
    fn schedule_write_back(&self, setting: &Setting, options: &ResolutionOptions, scene_type: Option<String>, generated: &Generated) {
        if self.managed.is_none() && self.registry.is_none() {
            return;
        }
        let managed = self.managed.clone();
        let registry = self.registry.clone();

        let mut tags = vec![setting.to_string()];
        if generated.edited {
            tags.push("edited".to_string());
        }
        let title = format!("{} background {}", setting, &Uuid::new_v4().simple().to_string()[..8]);
        let asset = NewRegistryAsset {
            image_url: generated.image.clone(),
            setting: setting.to_string(),
            mood: options.mood.clone(),
            customer_context: options.customer_context.clone(),
            scene_type,
            generation_prompt: generated.prompt.clone(),
            edited: generated.edited,
        };

        self.tasks.spawn("write-back", async move {
            let mut failures = Vec::new();
            if let Some(managed) = managed {
                if let Err(e) = managed.upload(&asset.image_url, &title, &tags).await {
                    failures.push(format!("cms upload: {e}"));
                }
            }
            if let Some(registry) = registry {
                if let Err(e) = registry.register(&asset).await {
                    failures.push(format!("registry register: {e}"));
                }
            }
            if !failures.is_empty() {
                anyhow::bail!(failures.join("; "));
            }
            Ok(())
        });
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Explicit scene type, or for novel prompts a slug of the prompt so the
/// registry only hands back the same scene shape.
fn scene_type(options: &ResolutionOptions, prompt: Option<&str>, novel: bool) -> Option<String> {
    if let Some(explicit) = non_blank(options.scene_type.as_deref()) {
        return Some(explicit.to_string());
    }
    if !novel {
        return None;
    }
    let slug = prompt?
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    let slug: String = slug.chars().take(SCENE_SLUG_LEN).collect();
    Some(slug.trim_end_matches('-').to_string()).filter(|s| !s.is_empty())
}
