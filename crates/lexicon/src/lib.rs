//! Static reference data for dealer name humanization.
//!
//! The lexicon is loaded once at startup and shared read-only:
//! - brand aliases and their canonical labels
//! - known cities, proper nouns, first and last names
//! - generic marketing words and region words
//! - per-domain overrides and franchise group names
//!
//! A lexicon that fails to load or validate is fatal; nothing downstream can
//! run without it.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Lexicon bundled with the crate.
const BUILTIN_LEXICON: &str = include_str!("../data/lexicon.json");

/// Words that form an idiomatic `"{Prefix} {Brand}"` name.
pub const IDIOMATIC_PREFIXES: [&str; 2] = ["shop", "happy"];

/// Shortest lexicon term used as a compound-split anchor.
const MIN_ANCHOR_LEN: usize = 3;
/// Generic and region words are noisier, so they need to be longer.
const MIN_GENERIC_ANCHOR_LEN: usize = 4;
/// Aliases at or below this length are treated as ambiguous abbreviations.
const SHORT_ALIAS_MAX_LEN: usize = 3;

#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("Failed to read lexicon: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse lexicon: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid lexicon: {0}")]
    Invalid(String),
}

/// On-disk shape of the lexicon resource.
#[derive(Debug, Deserialize)]
struct LexiconFile {
    brands: BTreeMap<String, Vec<String>>,
    cities: Vec<String>,
    #[serde(default)]
    proper_nouns: Vec<String>,
    #[serde(default)]
    first_names: Vec<String>,
    #[serde(default)]
    last_names: Vec<String>,
    #[serde(default)]
    generic_words: Vec<String>,
    #[serde(default)]
    regions: Vec<String>,
    #[serde(default)]
    overrides: BTreeMap<String, String>,
    #[serde(default)]
    franchise_groups: BTreeMap<String, String>,
}

/// What kind of lexicon term an anchor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorKind {
    City,
    Brand,
    ProperNoun,
    Prefix,
    Region,
    Generic,
}

/// A lexicon term searched for inside unsplit blobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Space-free form searched for in the blob
    pub text: String,
    /// Words inserted when the anchor matches
    pub words: Vec<String>,
    pub kind: AnchorKind,
}

/// Entry counts, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexiconStats {
    pub brands: usize,
    pub aliases: usize,
    pub cities: usize,
    pub proper_nouns: usize,
    pub first_names: usize,
    pub last_names: usize,
    pub generic_words: usize,
    pub overrides: usize,
    pub franchise_groups: usize,
}

/// Immutable reference data.
#[derive(Debug, Clone)]
pub struct Lexicon {
    brand_aliases: HashMap<String, String>,
    canonical_brands: Vec<String>,
    cities: HashSet<String>,
    proper_nouns: HashSet<String>,
    first_names: HashSet<String>,
    last_names: HashSet<String>,
    generic_words: HashSet<String>,
    regions: HashSet<String>,
    overrides: BTreeMap<String, String>,
    franchise_groups: BTreeMap<String, String>,
    anchors: Vec<Anchor>,
}

impl Lexicon {
    /// Load the lexicon bundled with the crate.
    pub fn builtin() -> Result<Self, LexiconError> {
        Self::from_json_str(BUILTIN_LEXICON)
    }

    /// Load a lexicon from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LexiconError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Parse and validate a lexicon document.
    pub fn from_json_str(raw: &str) -> Result<Self, LexiconError> {
        let file: LexiconFile = serde_json::from_str(raw)?;
        Self::build(file)
    }

    fn build(file: LexiconFile) -> Result<Self, LexiconError> {
        if file.brands.is_empty() {
            return Err(LexiconError::Invalid("no brands defined".to_string()));
        }
        if file.cities.is_empty() {
            return Err(LexiconError::Invalid("no cities defined".to_string()));
        }

        let mut brand_aliases: HashMap<String, String> = HashMap::new();
        let mut canonical_brands = Vec::with_capacity(file.brands.len());

        for (canonical, aliases) in &file.brands {
            let canonical = canonical.trim().to_string();
            if canonical.is_empty() {
                return Err(LexiconError::Invalid("empty canonical brand".to_string()));
            }

            // The canonical label always resolves to itself.
            let own_forms = [normalize_phrase(&canonical), compact(&canonical)];
            let keys = own_forms
                .into_iter()
                .chain(aliases.iter().map(|a| normalize_phrase(a)))
                .filter(|k| !k.is_empty());

            for key in keys {
                match brand_aliases.get(&key) {
                    Some(existing) if existing != &canonical => {
                        return Err(LexiconError::Invalid(format!(
                            "alias '{}' maps to both '{}' and '{}'",
                            key, existing, canonical
                        )));
                    }
                    Some(_) => {}
                    None => {
                        brand_aliases.insert(key, canonical.clone());
                    }
                }
            }
            canonical_brands.push(canonical);
        }

        let cities = normalize_set(&file.cities);
        let proper_nouns = normalize_set(&file.proper_nouns);
        let first_names = normalize_set(&file.first_names);
        let last_names = normalize_set(&file.last_names);
        let generic_words = normalize_set(&file.generic_words);
        let regions = normalize_set(&file.regions);

        let overlap = cities.intersection(&proper_nouns).count();
        if overlap > 0 {
            tracing::debug!(overlap, "Lexicon terms classified as both city and proper noun");
        }

        let overrides = file
            .overrides
            .into_iter()
            .map(|(domain, name)| (domain_key(&domain), name.trim().to_string()))
            .filter(|(domain, name)| !domain.is_empty() && !name.is_empty())
            .collect();

        let franchise_groups = file
            .franchise_groups
            .into_iter()
            .map(|(needle, name)| (compact(&needle), name.trim().to_string()))
            .filter(|(needle, name)| !needle.is_empty() && !name.is_empty())
            .collect();

        let mut lexicon = Self {
            brand_aliases,
            canonical_brands,
            cities,
            proper_nouns,
            first_names,
            last_names,
            generic_words,
            regions,
            overrides,
            franchise_groups,
            anchors: Vec::new(),
        };
        lexicon.anchors = lexicon.build_anchors();

        tracing::debug!(stats = ?lexicon.stats(), "Lexicon loaded");
        Ok(lexicon)
    }

    fn build_anchors(&self) -> Vec<Anchor> {
        let mut anchors: Vec<Anchor> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        let mut push = |phrase: &str, kind: AnchorKind, min_len: usize| {
            let text = compact(phrase);
            if text.len() >= min_len && seen.insert(text.clone()) {
                anchors.push(Anchor {
                    text,
                    words: phrase.split_whitespace().map(str::to_string).collect(),
                    kind,
                });
            }
        };

        for alias in self.brand_aliases.keys() {
            if !self.is_short_alias(alias) {
                // Brand aliases stay a single token so they resolve as one brand.
                let text = compact(alias);
                push(&text, AnchorKind::Brand, MIN_ANCHOR_LEN);
            }
        }
        for city in &self.cities {
            push(city, AnchorKind::City, MIN_ANCHOR_LEN);
        }
        for noun in &self.proper_nouns {
            push(noun, AnchorKind::ProperNoun, MIN_ANCHOR_LEN);
        }
        for prefix in IDIOMATIC_PREFIXES {
            push(prefix, AnchorKind::Prefix, MIN_ANCHOR_LEN);
        }
        for region in &self.regions {
            push(region, AnchorKind::Region, MIN_GENERIC_ANCHOR_LEN);
        }
        for word in &self.generic_words {
            push(word, AnchorKind::Generic, MIN_GENERIC_ANCHOR_LEN);
        }

        // Longest first; ties broken alphabetically so splits are deterministic.
        anchors.sort_by(|a, b| b.text.len().cmp(&a.text.len()).then_with(|| a.text.cmp(&b.text)));
        anchors
    }

    /// Canonical brand for a token or phrase, if it is a known alias.
    pub fn canonical_brand(&self, token: &str) -> Option<&str> {
        let key = normalize_phrase(token);
        self.brand_aliases
            .get(&key)
            .or_else(|| self.brand_aliases.get(&compact(&key)))
            .map(String::as_str)
    }

    pub fn is_brand(&self, token: &str) -> bool {
        self.canonical_brand(token).is_some()
    }

    /// Short abbreviations such as "vw" could plausibly mean several brands.
    pub fn is_short_alias(&self, token: &str) -> bool {
        let key = normalize_phrase(token);
        key.len() <= SHORT_ALIAS_MAX_LEN
            && self
                .brand_aliases
                .get(&key)
                .is_some_and(|canonical| compact(canonical) != key)
    }

    pub fn is_city(&self, phrase: &str) -> bool {
        self.cities.contains(&normalize_phrase(phrase))
    }

    pub fn is_proper_noun(&self, phrase: &str) -> bool {
        self.proper_nouns.contains(&normalize_phrase(phrase))
    }

    pub fn is_first_name(&self, token: &str) -> bool {
        self.first_names.contains(&normalize_phrase(token))
    }

    pub fn is_last_name(&self, token: &str) -> bool {
        self.last_names.contains(&normalize_phrase(token))
    }

    pub fn is_person_name(&self, token: &str) -> bool {
        self.is_first_name(token) || self.is_last_name(token)
    }

    pub fn is_generic(&self, token: &str) -> bool {
        self.generic_words.contains(&normalize_phrase(token))
    }

    pub fn is_region(&self, token: &str) -> bool {
        self.regions.contains(&normalize_phrase(token))
    }

    pub fn is_prefix(&self, token: &str) -> bool {
        let key = normalize_phrase(token);
        IDIOMATIC_PREFIXES.contains(&key.as_str())
    }

    /// Brand, proper noun, city or person name.
    pub fn is_recognized(&self, token: &str) -> bool {
        self.is_brand(token)
            || self.is_proper_noun(token)
            || self.is_city(token)
            || self.is_person_name(token)
    }

    /// Any entry at all, including generic and region words.
    pub fn is_known_word(&self, token: &str) -> bool {
        self.is_recognized(token)
            || self.is_generic(token)
            || self.is_region(token)
            || self.is_prefix(token)
    }

    /// Hand-curated name for a domain.
    pub fn override_for(&self, domain: &str) -> Option<&str> {
        self.overrides.get(&domain_key(domain)).map(String::as_str)
    }

    /// Franchise group whose key appears in the domain (longest key wins).
    pub fn franchise_for(&self, domain: &str) -> Option<&str> {
        let key = compact(&domain_key(domain));
        self.franchise_groups
            .iter()
            .filter(|(needle, _)| key.contains(needle.as_str()))
            .max_by_key(|(needle, _)| needle.len())
            .map(|(_, name)| name.as_str())
    }

    /// All overrides, ordered by domain.
    pub fn overrides(&self) -> impl Iterator<Item = (&str, &str)> {
        self.overrides.iter().map(|(d, n)| (d.as_str(), n.as_str()))
    }

    pub fn canonical_brands(&self) -> &[String] {
        &self.canonical_brands
    }

    /// Generic filler words, sorted.
    pub fn generic_words(&self) -> Vec<&str> {
        let mut words: Vec<&str> = self.generic_words.iter().map(String::as_str).collect();
        words.sort_unstable();
        words
    }

    /// Compound-split anchors, longest first.
    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn stats(&self) -> LexiconStats {
        LexiconStats {
            brands: self.canonical_brands.len(),
            aliases: self.brand_aliases.len(),
            cities: self.cities.len(),
            proper_nouns: self.proper_nouns.len(),
            first_names: self.first_names.len(),
            last_names: self.last_names.len(),
            generic_words: self.generic_words.len(),
            overrides: self.overrides.len(),
            franchise_groups: self.franchise_groups.len(),
        }
    }
}

/// Lowercase, map separators to spaces and collapse whitespace.
pub fn normalize_phrase(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if matches!(c, '-' | '_' | '.') { ' ' } else { c })
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase alphanumerics only ("Land Rover" -> "landrover").
pub fn compact(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalize a domain for override lookup.
///
/// Strips scheme, path, query, port and a leading `www.`, keeps the suffix.
pub fn domain_key(domain: &str) -> String {
    let lower = domain.trim().to_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("");
    let host = host.split(':').next().unwrap_or("");
    let host = host.strip_prefix("www.").unwrap_or(host);
    host.trim_end_matches('.').to_string()
}

fn normalize_set(values: &[String]) -> HashSet<String> {
    values
        .iter()
        .map(|v| normalize_phrase(v))
        .filter(|v| !v.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lexicon() -> Lexicon {
        Lexicon::builtin().unwrap()
    }

    #[test]
    fn test_builtin_loads() {
        let stats = lexicon().stats();
        assert!(stats.brands >= 50);
        assert!(stats.cities >= 300);
        assert!(stats.overrides > 0);
    }

    #[test]
    fn test_brand_aliases_canonicalize() {
        let lex = lexicon();
        assert_eq!(lex.canonical_brand("chevy"), Some("Chevrolet"));
        assert_eq!(lex.canonical_brand("SCHEVY"), Some("Chevrolet"));
        assert_eq!(lex.canonical_brand("land rover"), Some("Land Rover"));
        assert_eq!(lex.canonical_brand("landrover"), Some("Land Rover"));
        assert_eq!(lex.canonical_brand("mercedes-benz"), Some("Mercedes-Benz"));
        assert_eq!(lex.canonical_brand("grainger"), None);
    }

    #[test]
    fn test_canonical_brand_is_idempotent() {
        let lex = lexicon();
        for canonical in lex.canonical_brands() {
            let resolved = lex.canonical_brand(&canonical.to_lowercase());
            assert_eq!(resolved, Some(canonical.as_str()));
        }
    }

    #[test]
    fn test_short_alias() {
        let lex = lexicon();
        assert!(lex.is_short_alias("vw"));
        assert!(lex.is_short_alias("jag"));
        assert!(!lex.is_short_alias("kia"));
        assert!(!lex.is_short_alias("bmw"));
        assert!(!lex.is_short_alias("chevy"));
    }

    #[test]
    fn test_membership() {
        let lex = lexicon();
        assert!(lex.is_city("Naples"));
        assert!(lex.is_city("san-diego"));
        assert!(lex.is_proper_noun("grainger"));
        assert!(lex.is_first_name("jim"));
        assert!(lex.is_last_name("butler"));
        assert!(lex.is_generic("motors"));
        assert!(lex.is_region("north"));
        assert!(lex.is_prefix("Shop"));
        assert!(!lex.is_recognized("zzzz"));
    }

    #[test]
    fn test_override_lookup_normalizes_domain() {
        let lex = lexicon();
        assert_eq!(lex.override_for("patmilliken.com"), Some("Pat Milliken"));
        assert_eq!(lex.override_for("https://www.PatMilliken.com/inventory"), Some("Pat Milliken"));
        assert_eq!(lex.override_for("napleshonda.com"), None);
    }

    #[test]
    fn test_franchise_lookup() {
        let lex = lexicon();
        assert_eq!(lex.franchise_for("autonationtoyotaorlando.com"), Some("AutoNation"));
        assert_eq!(lex.franchise_for("napleshonda.com"), None);
    }

    #[test]
    fn test_anchors_longest_first() {
        let lex = lexicon();
        let anchors = lex.anchors();
        assert!(anchors.windows(2).all(|w| w[0].text.len() >= w[1].text.len()));
        assert!(anchors.iter().any(|a| a.text == "sandiego" && a.words == vec!["san", "diego"]));
        // Short abbreviations never anchor a split.
        assert!(!anchors.iter().any(|a| a.text == "vw"));
    }

    #[test]
    fn test_conflicting_alias_rejected() {
        let raw = r#"{"brands":{"Ford":["f"],"Fiat":["f"]},"cities":["naples"]}"#;
        assert!(matches!(Lexicon::from_json_str(raw), Err(LexiconError::Invalid(_))));
    }

    #[test]
    fn test_empty_tables_rejected() {
        assert!(matches!(
            Lexicon::from_json_str(r#"{"brands":{},"cities":["naples"]}"#),
            Err(LexiconError::Invalid(_))
        ));
        assert!(matches!(
            Lexicon::from_json_str("not json"),
            Err(LexiconError::Parse(_))
        ));
    }

    #[test]
    fn test_domain_key() {
        assert_eq!(domain_key("HTTP://www.Example.com:8080/path?q=1"), "example.com");
        assert_eq!(domain_key("example.com."), "example.com");
    }

    #[test]
    fn test_normalize_phrase() {
        assert_eq!(normalize_phrase("  St. Louis "), "st louis");
        assert_eq!(normalize_phrase("Winston-Salem"), "winston salem");
    }
}
