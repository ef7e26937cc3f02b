//! Confidence scoring and the validity gate for candidate names.
//!
//! The same rule table scores names built locally and names returned by the
//! completion service, and is rendered into the completion prompt so both
//! sides are judged identically.

use dealername_features::split_words;
use dealername_lexicon::{compact, Lexicon};
use dealername_model::{Flag, FRANCHISE_CONFIDENCE, MAX_COMPUTED_CONFIDENCE, OVERRIDE_CONFIDENCE};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// One to three capitalized words made of letters and hyphens.
static NAME_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Za-z-]*(?: [A-Z][A-Za-z-]*){0,2}$").expect("valid regex"));

/// Longest phrase, in words, looked up as a single lexicon entry.
const MAX_PHRASE_WORDS: usize = 3;

/// Words at least this long that the lexicon does not know are treated as
/// unsplit concatenations when they also appear in the domain.
const RAW_BLOB_LEN: usize = 9;

/// Point values for every scoring rule.
#[derive(Debug, Clone)]
pub struct ScoreConfig {
    /// Starting score before any rule applies
    pub base: i32,
    pub brand_city: i32,
    pub name_pair: i32,
    pub single_proper_noun: i32,
    pub domain_overlap: i32,
    pub multi_token: i32,
    pub possessive_friendly: i32,
    pub city_first_not_in_domain: i32,
    pub unsplit_blob: i32,
    pub duplicates: i32,
    pub truncated: i32,
    pub generic_ending: i32,
    pub short_single: i32,
    pub long_unrecognized_single: i32,
    pub ambiguous_single: i32,
    pub short_brand_alias: i32,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            base: 55,
            brand_city: 20,
            name_pair: 20,
            single_proper_noun: 15,
            domain_overlap: 10,
            multi_token: 10,
            possessive_friendly: 5,
            city_first_not_in_domain: -25,
            unsplit_blob: -20,
            duplicates: -15,
            truncated: -5,
            generic_ending: -5,
            short_single: -5,
            long_unrecognized_single: -5,
            ambiguous_single: -10,
            short_brand_alias: -5,
        }
    }
}

/// A rule of the scoring table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreRule {
    Override,
    FranchiseGroup,
    CityOrBrandOnly,
    Base,
    BrandCity,
    NamePair,
    SingleProperNoun,
    DomainOverlap,
    MultiToken,
    PossessiveFriendly,
    CityFirstNotInDomain,
    UnsplitBlob,
    Duplicates,
    Truncated,
    GenericEnding,
    ShortSingle,
    LongUnrecognizedSingle,
    AmbiguousSingle,
    ShortBrandAlias,
}

impl ScoreRule {
    /// Every rule, in the order the table is presented.
    pub const ALL: [ScoreRule; 19] = [
        Self::Override,
        Self::FranchiseGroup,
        Self::CityOrBrandOnly,
        Self::Base,
        Self::BrandCity,
        Self::NamePair,
        Self::SingleProperNoun,
        Self::DomainOverlap,
        Self::MultiToken,
        Self::PossessiveFriendly,
        Self::CityFirstNotInDomain,
        Self::UnsplitBlob,
        Self::Duplicates,
        Self::Truncated,
        Self::GenericEnding,
        Self::ShortSingle,
        Self::LongUnrecognizedSingle,
        Self::AmbiguousSingle,
        Self::ShortBrandAlias,
    ];

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Override => "Exact domain override match (absolute)",
            Self::FranchiseGroup => "Known franchise group (absolute)",
            Self::CityOrBrandOnly => "City-only or brand-only output (invalid, scores 0)",
            Self::Base => "Starting score",
            Self::BrandCity => "Brand and city both present and consistent with the domain",
            Self::NamePair => "Recognized first/last-name pair",
            Self::SingleProperNoun => "Single proper-noun token",
            Self::DomainOverlap => "Name shares a token with the domain",
            Self::MultiToken => "Well-formed name of 2-3 words",
            Self::PossessiveFriendly => "Ending reads naturally with a possessive 's",
            Self::CityFirstNotInDomain => "Leading city that is not in the domain",
            Self::UnsplitBlob => "Concatenated blob left in the name",
            Self::Duplicates => "Duplicate tokens before collapse",
            Self::Truncated => "More than 3 tokens before truncation",
            Self::GenericEnding => "Ends in a generic word",
            Self::ShortSingle => "Single token shorter than 3 characters",
            Self::LongUnrecognizedSingle => "Single long token the lexicon does not know",
            Self::AmbiguousSingle => "Single ambiguous generic or region word",
            Self::ShortBrandAlias => "Short brand abbreviation",
        }
    }

    /// Points for additive rules; absolute rules report the value they set.
    pub fn points(&self, config: &ScoreConfig) -> i32 {
        match self {
            Self::Override => i32::from(OVERRIDE_CONFIDENCE),
            Self::FranchiseGroup => i32::from(FRANCHISE_CONFIDENCE),
            Self::CityOrBrandOnly => 0,
            Self::Base => config.base,
            Self::BrandCity => config.brand_city,
            Self::NamePair => config.name_pair,
            Self::SingleProperNoun => config.single_proper_noun,
            Self::DomainOverlap => config.domain_overlap,
            Self::MultiToken => config.multi_token,
            Self::PossessiveFriendly => config.possessive_friendly,
            Self::CityFirstNotInDomain => config.city_first_not_in_domain,
            Self::UnsplitBlob => config.unsplit_blob,
            Self::Duplicates => config.duplicates,
            Self::Truncated => config.truncated,
            Self::GenericEnding => config.generic_ending,
            Self::ShortSingle => config.short_single,
            Self::LongUnrecognizedSingle => config.long_unrecognized_single,
            Self::AmbiguousSingle => config.ambiguous_single,
            Self::ShortBrandAlias => config.short_brand_alias,
        }
    }

    fn is_absolute(&self) -> bool {
        matches!(self, Self::Override | Self::FranchiseGroup | Self::CityOrBrandOnly)
    }
}

/// A rule that fired and what it contributed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub rule: ScoreRule,
    pub points: i32,
}

/// Total confidence plus the rules that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub total: u8,
    pub contributions: Vec<Contribution>,
}

impl ScoreBreakdown {
    fn absolute(rule: ScoreRule, config: &ScoreConfig) -> Self {
        let points = rule.points(config);
        Self {
            total: points.clamp(0, i32::from(OVERRIDE_CONFIDENCE)) as u8,
            contributions: vec![Contribution { rule, points }],
        }
    }

    pub fn has(&self, rule: ScoreRule) -> bool {
        self.contributions.iter().any(|c| c.rule == rule)
    }
}

/// What the scorer knows about the record besides the name itself.
#[derive(Debug, Clone, Copy)]
pub struct ScoreContext<'a> {
    pub lexicon: &'a Lexicon,
    /// Lowercase tokens the domain was split into
    pub domain_tokens: &'a [String],
}

impl<'a> ScoreContext<'a> {
    pub fn new(lexicon: &'a Lexicon, domain_tokens: &'a [String]) -> Self {
        Self {
            lexicon,
            domain_tokens,
        }
    }

    /// Literal match against a domain token, or contained in the joined domain.
    pub fn in_domain(&self, phrase: &str) -> bool {
        let key = compact(phrase);
        if key.is_empty() {
            return false;
        }
        self.domain_tokens.iter().any(|t| compact(t) == key)
            || (key.len() >= 3 && compact(&self.domain_tokens.concat()).contains(&key))
    }

    fn brand_in_domain(&self, canonical: &str) -> bool {
        self.domain_tokens
            .iter()
            .any(|t| self.lexicon.canonical_brand(t) == Some(canonical))
            || self.in_domain(canonical)
    }

    fn is_raw_blob(&self, word: &str) -> bool {
        word.len() >= RAW_BLOB_LEN && !self.lexicon.is_known_word(word) && self.in_domain(word)
    }
}

/// Why a name may not be returned as a final answer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GateFailure {
    #[error("empty name")]
    Empty,
    #[error("name must be 1-3 capitalized words of letters and hyphens")]
    Shape,
    #[error("no brand, proper noun, city or domain token in name")]
    NoRecognizedToken,
    #[error("bare city or bare brand")]
    BareCityOrBrand,
    #[error("unsplit domain blob in name")]
    RawBlob,
}

impl GateFailure {
    pub fn flag(&self) -> Flag {
        match self {
            Self::Empty => Flag::EmptyTokens,
            Self::Shape => Flag::InvalidShape,
            Self::NoRecognizedToken => Flag::TooGeneric,
            Self::BareCityOrBrand => Flag::ReviewNeeded,
            Self::RawBlob => Flag::UnsplitBlob,
        }
    }
}

/// Lowercase words with every lexicon phrase found among them.
struct NameWords {
    words: Vec<String>,
}

impl NameWords {
    fn new(name: &str) -> Self {
        Self {
            words: split_words(name),
        }
    }

    /// `(start, len, phrase)` for every window of up to three words.
    fn phrases(&self) -> impl Iterator<Item = (usize, usize, String)> + '_ {
        (0..self.words.len()).flat_map(move |start| {
            (1..=MAX_PHRASE_WORDS.min(self.words.len() - start))
                .map(move |len| (start, len, self.words[start..start + len].join(" ")))
        })
    }

    fn whole(&self) -> String {
        self.words.join(" ")
    }
}

fn is_bare_city_or_brand(words: &NameWords, lexicon: &Lexicon) -> bool {
    let whole = words.whole();
    lexicon.is_brand(&whole)
        || (lexicon.is_city(&whole) && !lexicon.is_proper_noun(&whole) && !lexicon.is_last_name(&whole))
}

/// Shape and content check a name must pass before it is final.
pub fn validate(name: &str, ctx: &ScoreContext) -> Result<(), GateFailure> {
    if name.trim().is_empty() {
        return Err(GateFailure::Empty);
    }
    if !NAME_SHAPE.is_match(name) {
        return Err(GateFailure::Shape);
    }

    let words = NameWords::new(name);
    if words.words.iter().any(|w| ctx.is_raw_blob(w)) {
        return Err(GateFailure::RawBlob);
    }
    if is_bare_city_or_brand(&words, ctx.lexicon) {
        return Err(GateFailure::BareCityOrBrand);
    }

    let recognized = words.phrases().any(|(_, _, phrase)| {
        ctx.lexicon.is_brand(&phrase)
            || ctx.lexicon.is_proper_noun(&phrase)
            || ctx.lexicon.is_city(&phrase)
            || ctx.in_domain(&phrase)
    });
    if !recognized {
        return Err(GateFailure::NoRecognizedToken);
    }
    Ok(())
}

/// Whether the name contains a brand, a proper noun or a person name.
pub fn names_known_entity(name: &str, lexicon: &Lexicon) -> bool {
    NameWords::new(name).phrases().any(|(_, _, phrase)| {
        lexicon.is_brand(&phrase) || lexicon.is_proper_noun(&phrase) || lexicon.is_person_name(&phrase)
    })
}

/// Score a name against the rule table.
pub fn score(name: &str, flags: &[Flag], ctx: &ScoreContext, config: &ScoreConfig) -> ScoreBreakdown {
    if flags.contains(&Flag::OverrideMatch) {
        return ScoreBreakdown::absolute(ScoreRule::Override, config);
    }
    if flags.contains(&Flag::FranchiseGroupMatch) {
        return ScoreBreakdown::absolute(ScoreRule::FranchiseGroup, config);
    }

    let words = NameWords::new(name);
    if words.words.is_empty() || is_bare_city_or_brand(&words, ctx.lexicon) {
        return ScoreBreakdown::absolute(ScoreRule::CityOrBrandOnly, config);
    }

    let lexicon = ctx.lexicon;
    let display_words: Vec<&str> = name.split_whitespace().collect();
    let mut fired = vec![ScoreRule::Base];

    // Positive signals
    let brand = words
        .phrases()
        .find_map(|(_, _, p)| lexicon.canonical_brand(&p).map(str::to_string));
    let city = words.phrases().find(|(_, _, p)| lexicon.is_city(p));
    if let (Some(brand), Some((_, _, city))) = (&brand, &city) {
        if ctx.brand_in_domain(brand) && ctx.in_domain(city) {
            fired.push(ScoreRule::BrandCity);
        }
    }

    let has_pair = flags.contains(&Flag::FirstLastNamePair)
        || words.words.windows(2).any(|w| {
            (lexicon.is_first_name(&w[0]) && lexicon.is_last_name(&w[1]))
                || (lexicon.is_person_name(&w[0]) && lexicon.is_person_name(&w[1]) && !lexicon.is_city(&w[0]))
        });
    if has_pair {
        fired.push(ScoreRule::NamePair);
    }

    let single = display_words.len() == 1;
    if single && (lexicon.is_proper_noun(&words.whole()) || lexicon.is_last_name(&words.whole())) {
        fired.push(ScoreRule::SingleProperNoun);
    }
    if words.words.iter().any(|w| ctx.in_domain(w)) {
        fired.push(ScoreRule::DomainOverlap);
    }
    if (2..=3).contains(&display_words.len()) {
        fired.push(ScoreRule::MultiToken);
    }
    if possessive_friendly(name) {
        fired.push(ScoreRule::PossessiveFriendly);
    }

    // Penalties
    let leading_city = words
        .phrases()
        .filter(|(start, _, p)| *start == 0 && lexicon.is_city(p))
        .last();
    if let Some((_, _, city)) = leading_city {
        if !ctx.in_domain(&city) {
            fired.push(ScoreRule::CityFirstNotInDomain);
        }
    }
    if flags.contains(&Flag::UnsplitBlob) || words.words.iter().any(|w| ctx.is_raw_blob(w)) {
        fired.push(ScoreRule::UnsplitBlob);
    }
    if flags.contains(&Flag::DuplicatesRemoved) {
        fired.push(ScoreRule::Duplicates);
    }
    if flags.contains(&Flag::TokenCountAdjusted) {
        fired.push(ScoreRule::Truncated);
    }
    if let Some(last) = words.words.last() {
        if lexicon.is_generic(last) && !lexicon.is_proper_noun(last) {
            fired.push(ScoreRule::GenericEnding);
        }
    }
    if single {
        let word = &words.whole();
        if name.trim().len() < 3 && !name.trim().eq_ignore_ascii_case("auto") {
            fired.push(ScoreRule::ShortSingle);
        }
        if name.trim().len() >= 8 && !lexicon.is_recognized(word) {
            fired.push(ScoreRule::LongUnrecognizedSingle);
        }
        if lexicon.is_region(word) || lexicon.is_generic(word) {
            fired.push(ScoreRule::AmbiguousSingle);
        }
    }
    if flags.contains(&Flag::ShortBrandAlias) {
        fired.push(ScoreRule::ShortBrandAlias);
    }

    let contributions: Vec<Contribution> = fired
        .into_iter()
        .filter(|rule| !rule.is_absolute())
        .map(|rule| Contribution {
            rule,
            points: rule.points(config),
        })
        .collect();
    let sum: i32 = contributions.iter().map(|c| c.points).sum();

    ScoreBreakdown {
        total: sum.clamp(0, i32::from(MAX_COMPUTED_CONFIDENCE)) as u8,
        contributions,
    }
}

/// Whether `{name}'s` reads naturally.
pub fn possessive_friendly(name: &str) -> bool {
    let lower = name.trim().to_lowercase();
    if lower.is_empty() {
        return false;
    }
    !(lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("sh")
        || lower.ends_with("ch"))
}

/// The rule table as `(description, points)` rows.
pub fn rule_table(config: &ScoreConfig) -> Vec<(&'static str, i32)> {
    ScoreRule::ALL
        .iter()
        .map(|rule| (rule.describe(), rule.points(config)))
        .collect()
}
