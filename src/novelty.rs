//! Decides whether a creative prompt is specific enough to skip the static
//! and curated tiers and go straight to fresh generation.

use regex::Regex;
use serde::Serialize;

use crate::models::Setting;

/// Pure prompt test behind the classifier. Implementations never see the setting.
pub trait NoveltyStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn is_novel_prompt(&self, prompt: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoveltyStrategyKind {
    AllowList,
    #[default]
    DenyList,
}

impl NoveltyStrategyKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "allow-list" | "allow_list" | "allowlist" | "generic" => NoveltyStrategyKind::AllowList,
            _ => NoveltyStrategyKind::DenyList,
        }
    }

    pub fn build(self) -> Box<dyn NoveltyStrategy> {
        match self {
            NoveltyStrategyKind::AllowList => Box::new(GenericPhraseStrategy::default()),
            NoveltyStrategyKind::DenyList => Box::new(SpecificSignalStrategy::default()),
        }
    }
}

/// Novel unless the prompt is boilerplate beauty-scene copy.
pub struct GenericPhraseStrategy {
    generic: Regex,
}

impl Default for GenericPhraseStrategy {
    fn default() -> Self {
        let generic = Regex::new(
            r"(?i)\b(luxur(y|ious)|elegant|premium|soft (lighting|light)|natural light(ing)?|clean|minimal(ist)?|modern|beautiful|serene|calm|bright|marble|spa[- ]like|aesthetic|studio|neutral (background|backdrop)|product shot)\b",
        )
        .expect("generic phrase pattern is valid");
        Self { generic }
    }
}

impl NoveltyStrategy for GenericPhraseStrategy {
    fn name(&self) -> &'static str { "allow-list" }

    fn is_novel_prompt(&self, prompt: &str) -> bool {
        !self.generic.is_match(prompt)
    }
}

/// Not novel unless a concrete real-world signal shows up: a named place,
/// weather, an unusual location, a mode of transport or a cultural venue.
pub struct SpecificSignalStrategy {
    signals: Vec<(&'static str, Regex)>,
}

const SIGNAL_PATTERNS: &[(&str, &str)] = &[
    (
        "place",
        r"(?i)\b(paris|london|tokyo|kyoto|mumbai|delhi|new york|los angeles|san francisco|rome|milan|venice|barcelona|madrid|lisbon|berlin|amsterdam|dubai|istanbul|cairo|marrakech|bangkok|bali|seoul|shanghai|hong kong|singapore|sydney|rio|mexico city|havana|reykjavik|santorini|india|japan|italy|france|spain|greece|morocco|egypt|mexico|brazil|iceland|thailand|korea|china|australia|peru|kenya)\b",
    ),
    (
        "weather",
        r"(?i)\b(rain(y|ing|storm)?|snow(y|ing|fall)?|storm(y)?|thunder\w*|fog(gy)?|mist(y)?|monsoon|blizzard|hail|dusk|dawn|twilight|aurora|northern lights)\b",
    ),
    (
        "location",
        r"(?i)\b(beach|desert|dunes?|mountain(s|top)?|jungle|rainforest|forest|glacier|volcano|canyon|cave|island|underwater|rooftop|street|alley|market|bazaar|harbou?r|pier|vineyard|savanna|tundra|space station|moon)\b",
    ),
    (
        "transport",
        r"(?i)\b(train|railway|airplane|aeroplane|plane|airport|cabin|yacht|sailboat|boat|ferry|cruise|car|convertible|bus|subway|metro|tram|gondola|hot air balloon)\b",
    ),
    (
        "venue",
        r"(?i)\b(museum|gallery|temple|shrine|cathedral|church|mosque|palace|castle|opera|theat(re|er)|concert|festival|carnival|library|ballroom|stadium)\b",
    ),
];

impl Default for SpecificSignalStrategy {
    fn default() -> Self {
        let signals = SIGNAL_PATTERNS
            .iter()
            .map(|(kind, pattern)| (*kind, Regex::new(pattern).expect("signal pattern is valid")))
            .collect();
        Self { signals }
    }
}

impl SpecificSignalStrategy {
    /// First signal category the prompt trips, if any.
    pub fn matched_signal(&self, prompt: &str) -> Option<&'static str> {
        self.signals.iter().find(|(_, re)| re.is_match(prompt)).map(|(kind, _)| *kind)
    }
}

impl NoveltyStrategy for SpecificSignalStrategy {
    fn name(&self) -> &'static str { "deny-list" }

    fn is_novel_prompt(&self, prompt: &str) -> bool {
        self.matched_signal(prompt).is_some()
    }
}

pub struct NoveltyClassifier {
    strategy: Box<dyn NoveltyStrategy>,
}

impl NoveltyClassifier {
    pub fn new(strategy: Box<dyn NoveltyStrategy>) -> Self {
        Self { strategy }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Unknown settings are always novel. A missing prompt means the setting's
    /// default treatment, which is never novel for a known setting.
    pub fn is_novel(&self, prompt: Option<&str>, setting: &Setting) -> bool {
        if !setting.is_known() {
            return true;
        }
        match prompt.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => self.strategy.is_novel_prompt(p),
            None => false,
        }
    }
}

impl Default for NoveltyClassifier {
    fn default() -> Self {
        Self::new(NoveltyStrategyKind::default().build())
    }
}
