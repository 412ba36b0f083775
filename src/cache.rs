use parking_lot::RwLock;
use std::collections::HashMap;

use crate::models::{ResolutionOptions, Setting};

/// Number of prompt characters that participate in the cache key.
pub const PROMPT_KEY_PREFIX: usize = 50;

/// Session-scoped memo of resolved background references. No eviction: it
/// lives exactly as long as the resolver that owns it.
#[derive(Default)]
pub struct AssetCache {
    entries: RwLock<HashMap<String, String>>,
}

impl AssetCache {
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    pub fn insert(&self, key: &str, image: &str) {
        self.entries.write().insert(key.to_string(), image.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Derives the cache key: prompt prefix first, then an explicit CMS asset id
/// or tag, then the bare setting.
pub fn cache_key(setting: &Setting, options: &ResolutionOptions) -> String {
    let prompt = if options.edit_mode {
        options.edit_prompt.as_deref().map(str::trim).filter(|p| !p.is_empty()).or(options.prompt())
    } else {
        options.prompt()
    };
    let mode = if options.edit_mode { "edit:" } else { "" };

    if let Some(prompt) = prompt {
        let prefix: String = prompt.to_lowercase().chars().take(PROMPT_KEY_PREFIX).collect();
        return format!("{setting}:{mode}prompt:{prefix}");
    }
    if let Some(id) = options.cms_asset_id.as_deref().filter(|s| !s.is_empty()) {
        return format!("{setting}:{mode}asset:{id}");
    }
    if let Some(tag) = options.cms_tag.as_deref().filter(|s| !s.is_empty()) {
        return format!("{setting}:{mode}tag:{tag}");
    }
    format!("{setting}{}", if options.edit_mode { ":edit" } else { "" })
}
