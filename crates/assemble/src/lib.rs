//! Pattern matching and name assembly.
//!
//! Turns a token stream plus advisory context into a candidate name by
//! running an ordered list of rules: override, franchise group, idiomatic
//! prefix, brand + city, brand + region, owner-name pair, then generic
//! stripping, brand suffix handling and the single-token checks. Every rule
//! that fires (or deliberately declines) leaves a `Flag` behind.
//!
//! Nothing here fails. An empty or unusable stream produces a candidate with
//! `needs_fallback` set and flags explaining why.

mod fallback;
mod segment;

pub use fallback::{clean_display_name, deterministic_fallback};
pub use segment::{classify, Segment};

use dealername_features::{capitalize, TokenStream};
use dealername_lexicon::Lexicon;
use dealername_model::{
    push_flag, Flag, NameContext, FRANCHISE_CONFIDENCE, OVERRIDE_CONFIDENCE,
    RECOVERY_CONFIDENCE_CAP,
};

/// Longest name, in words, that is ever returned.
pub const MAX_NAME_WORDS: usize = 3;

/// Working name plus the history of how it was reached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    /// Display parts in order; a part may hold several words ("Land Rover")
    pub parts: Vec<String>,
    pub flags: Vec<Flag>,
    /// Canonical brand seen in the tokens or validated from context
    pub brand: Option<String>,
    /// Confidence fixed by the rule that produced the name
    pub fixed_confidence: Option<u8>,
    /// Upper bound applied after scoring
    pub confidence_cap: Option<u8>,
    /// Local rules could not produce a usable name
    pub needs_fallback: bool,
}

impl Candidate {
    fn fixed(name: &str, confidence: u8, flag: Flag) -> Self {
        Self {
            parts: vec![name.to_string()],
            flags: vec![flag],
            fixed_confidence: Some(confidence),
            ..Default::default()
        }
    }

    pub fn name(&self) -> String {
        self.parts.join(" ")
    }

    pub fn word_count(&self) -> usize {
        self.parts.iter().map(|p| p.split_whitespace().count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(|p| p.trim().is_empty())
    }

    fn flag(&mut self, flag: Flag) {
        push_flag(&mut self.flags, flag);
    }
}

/// Hand-curated answers that bypass every computed rule.
pub fn curated_match(ctx: &NameContext, lexicon: &Lexicon) -> Option<Candidate> {
    if let Some(name) = lexicon.override_for(&ctx.domain) {
        return Some(Candidate::fixed(name, OVERRIDE_CONFIDENCE, Flag::OverrideMatch));
    }
    lexicon
        .franchise_for(&ctx.domain)
        .map(|group| Candidate::fixed(group, FRANCHISE_CONFIDENCE, Flag::FranchiseGroupMatch))
}

/// Run the ordered rule list over a token stream.
pub fn assemble(stream: &TokenStream, ctx: &NameContext, lexicon: &Lexicon) -> Candidate {
    if let Some(curated) = curated_match(ctx, lexicon) {
        return curated;
    }

    let mut candidate = Candidate::default();
    if stream.blob_split_attempted {
        candidate.flag(Flag::FallbackBlobSplit);
    }

    let segments = classify(&stream.tokens, lexicon);
    candidate.brand = segments
        .iter()
        .find_map(|s| s.brand.clone())
        .or_else(|| context_brand(ctx, lexicon));

    if segments.is_empty() {
        candidate.flag(Flag::EmptyTokens);
        candidate.needs_fallback = true;
        return candidate;
    }
    if segments.iter().any(|s| s.short_alias) {
        candidate.flag(Flag::ShortBrandAlias);
    }

    if let Some(prefixed) = match_prefix(&segments, &mut candidate) {
        candidate.parts = prefixed;
        return finish(candidate, stream);
    }

    let informative: Vec<&Segment> = segments.iter().filter(|s| !s.is_strippable()).collect();

    if let Some(parts) = match_brand_city(&informative) {
        candidate.flag(Flag::CarBrandCityException);
        candidate.parts = parts;
        trim_trailing_brand(&mut candidate, &informative, lexicon);
        return finish(candidate, stream);
    }

    if let Some(parts) = match_brand_region(&informative) {
        candidate.flag(Flag::CarBrandRegionException);
        candidate.parts = parts;
        trim_trailing_brand(&mut candidate, &informative, lexicon);
        return finish(candidate, stream);
    }

    if let Some(pair) = informative
        .windows(2)
        .find(|w| w[0].is_name_like() && w[1].is_name_like())
    {
        if pair[0].first_name && pair[1].last_name {
            candidate.flag(Flag::FirstLastNamePair);
        }
        if pair[0].proper_noun || pair[1].proper_noun {
            candidate.flag(Flag::ProperNounRecovered);
        }
        candidate.parts = pair.iter().map(|s| s.display()).collect();
        return finish(candidate, stream);
    }

    if informative.len() < segments.len() {
        candidate.flag(Flag::GenericWordsStripped);
    }

    let mut kept: Vec<&Segment> = Vec::with_capacity(informative.len());
    for segment in informative {
        if kept.iter().any(|k| k.text() == segment.text()) {
            candidate.flag(Flag::DuplicatesRemoved);
        } else {
            kept.push(segment);
        }
    }

    if kept.len() > 1 && kept.last().is_some_and(|s| s.is_brand()) {
        let rest = &kept[..kept.len() - 1];
        let rest_words: usize = rest.iter().map(|s| s.words.len()).sum();
        if rest_words >= 2 || rest.iter().any(|s| s.has_identity()) {
            kept.pop();
            candidate.flag(Flag::CarBrandTrimmedPostFormat);
        } else {
            candidate.flag(Flag::CarBrandSuffixRemaining);
        }
    }

    match kept.as_slice() {
        [] => {
            candidate.flag(Flag::TooGeneric);
            candidate.needs_fallback = true;
        }
        [only] => resolve_single(only, ctx, lexicon, &mut candidate),
        many => candidate.parts = many.iter().map(|s| s.display()).collect(),
    }

    finish(candidate, stream)
}

/// `"{Prefix} {Brand}"` for the idiomatic prefixes ("Shop Chevrolet").
fn match_prefix(segments: &[Segment], candidate: &mut Candidate) -> Option<Vec<String>> {
    let [prefix, brand, ..] = segments else {
        return None;
    };
    let canonical = brand.brand.as_ref()?;
    if !prefix.prefix {
        return None;
    }
    let flag = match prefix.text().as_str() {
        "shop" => Flag::ShopCarBrandException,
        "happy" => Flag::HappyCarBrandException,
        _ => return None,
    };
    candidate.flag(flag);
    Some(vec![prefix.display(), canonical.clone()])
}

/// Exactly one brand and one city, in either order, nothing else informative.
fn match_brand_city(informative: &[&Segment]) -> Option<Vec<String>> {
    let [a, b] = informative else {
        return None;
    };
    let is_pair = (a.is_brand() && b.city && !b.is_brand())
        || (b.is_brand() && a.city && !a.is_brand());
    is_pair.then(|| vec![a.display(), b.display()])
}

/// A brand immediately followed by a region word, keeping any leading tokens.
fn match_brand_region(informative: &[&Segment]) -> Option<Vec<String>> {
    let at = informative
        .windows(2)
        .position(|w| w[0].is_brand() && w[1].region)?;
    Some(informative[..at + 2].iter().map(|s| s.display()).collect())
}

/// Drop a trailing brand unless that would leave fewer than two words with no
/// identity signal (which would be a bare city or a bare region).
fn trim_trailing_brand(candidate: &mut Candidate, informative: &[&Segment], lexicon: &Lexicon) {
    let Some(last) = candidate.parts.last() else {
        return;
    };
    if !lexicon.is_brand(last) || candidate.parts.len() < 2 {
        return;
    }

    let rest = &candidate.parts[..candidate.parts.len() - 1];
    let rest_words: usize = rest.iter().map(|p| p.split_whitespace().count()).sum();
    let rest_has_identity = informative
        .iter()
        .filter(|s| !s.is_brand())
        .any(|s| s.has_identity() && !s.is_bare_city());

    if rest_words >= 2 || rest_has_identity {
        candidate.parts.pop();
        candidate.flag(Flag::CarBrandTrimmedPostFormat);
    }
}

/// Single-segment outcomes: keep proper nouns and surnames, recover a bare
/// city or brand with its companion, reject everything else.
fn resolve_single(segment: &Segment, ctx: &NameContext, lexicon: &Lexicon, candidate: &mut Candidate) {
    if segment.is_brand() && !segment.has_identity() {
        candidate.flag(Flag::BrandOnlyFallback);
        candidate.flag(Flag::ReviewNeeded);
        match context_city(ctx, lexicon) {
            Some(city) => {
                candidate.parts = vec![city, segment.display()];
                candidate.confidence_cap = Some(RECOVERY_CONFIDENCE_CAP);
            }
            None => candidate.needs_fallback = true,
        }
        return;
    }

    if segment.is_bare_city() {
        candidate.flag(Flag::CityOnlyFallback);
        candidate.flag(Flag::ReviewNeeded);
        match candidate.brand.clone() {
            Some(brand) => {
                candidate.parts = vec![segment.display(), brand];
                candidate.confidence_cap = Some(RECOVERY_CONFIDENCE_CAP);
            }
            None => candidate.needs_fallback = true,
        }
        return;
    }

    if segment.proper_noun || segment.last_name {
        candidate.flag(Flag::ProperNounRecovered);
        candidate.parts = vec![segment.display()];
        return;
    }

    candidate.flag(Flag::TooGeneric);
    candidate.flag(Flag::LowTokenVariety);
    candidate.needs_fallback = true;
}

/// Collapse duplicates, enforce the word ceiling and tag the token count.
fn finish(mut candidate: Candidate, stream: &TokenStream) -> Candidate {
    let mut words: Vec<String> = Vec::new();
    let mut duplicates = false;
    for word in candidate.parts.iter().flat_map(|p| p.split_whitespace()) {
        if words.iter().any(|w| w.to_lowercase() == word.to_lowercase()) {
            duplicates = true;
        } else {
            words.push(word.to_string());
        }
    }
    if duplicates {
        candidate.flag(Flag::DuplicatesRemoved);
    }

    if words.len() > MAX_NAME_WORDS {
        words.truncate(MAX_NAME_WORDS);
        candidate.flag(Flag::TokenCountAdjusted);
    }

    if words.len() != candidate.word_count() {
        candidate.parts = words;
    }

    if stream
        .unsplit_blobs
        .iter()
        .any(|blob| candidate.parts.iter().any(|p| p.eq_ignore_ascii_case(blob)))
    {
        candidate.flag(Flag::UnsplitBlob);
    }

    match candidate.word_count() {
        0 => {}
        1 => candidate.flag(Flag::SingleToken),
        _ => candidate.flag(Flag::MultiToken),
    }

    tracing::debug!(
        tokens = ?stream.tokens,
        name = %candidate.name(),
        flags = ?candidate.flags,
        "Assembled candidate"
    );
    candidate
}

/// Caller-supplied brand, only if the lexicon knows it.
pub fn context_brand(ctx: &NameContext, lexicon: &Lexicon) -> Option<String> {
    ctx.brand
        .as_deref()
        .and_then(|b| lexicon.canonical_brand(b))
        .map(str::to_string)
}

/// Caller-supplied city, only if the lexicon knows it.
pub fn context_city(ctx: &NameContext, lexicon: &Lexicon) -> Option<String> {
    ctx.city
        .as_deref()
        .filter(|c| lexicon.is_city(c))
        .map(|c| {
            c.split_whitespace()
                .map(capitalize)
                .collect::<Vec<_>>()
                .join(" ")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealername_features::tokenize;
    use pretty_assertions::assert_eq;

    fn run(domain: &str) -> Candidate {
        run_with(NameContext::new(domain))
    }

    fn run_with(ctx: NameContext) -> Candidate {
        let lex = Lexicon::builtin().unwrap();
        let stream = tokenize(&ctx.domain, &lex);
        assemble(&stream, &ctx, &lex)
    }

    #[test]
    fn test_override_wins_over_context() {
        let ctx = NameContext {
            domain: "patmilliken.com".to_string(),
            city: Some("Detroit".to_string()),
            brand: Some("Ford".to_string()),
            fallback_name: Some("Something Else".to_string()),
        };
        let candidate = run_with(ctx);
        assert_eq!(candidate.name(), "Pat Milliken");
        assert_eq!(candidate.flags, vec![Flag::OverrideMatch]);
        assert_eq!(candidate.fixed_confidence, Some(OVERRIDE_CONFIDENCE));
    }

    #[test]
    fn test_franchise_group() {
        let candidate = run("autonationtoyotaorlando.com");
        assert_eq!(candidate.name(), "AutoNation");
        assert!(candidate.flags.contains(&Flag::FranchiseGroupMatch));
    }

    #[test]
    fn test_shop_prefix() {
        let candidate = run("shopchevy.com");
        assert_eq!(candidate.name(), "Shop Chevrolet");
        assert!(candidate.flags.contains(&Flag::ShopCarBrandException));
    }

    #[test]
    fn test_happy_prefix() {
        let candidate = run("happy-hyundai.com");
        assert_eq!(candidate.name(), "Happy Hyundai");
        assert!(candidate.flags.contains(&Flag::HappyCarBrandException));
    }

    #[test]
    fn test_city_brand_keeps_brand() {
        let candidate = run("napleshonda.com");
        assert_eq!(candidate.name(), "Naples Honda");
        assert!(candidate.flags.contains(&Flag::CarBrandCityException));
        assert!(!candidate.flags.contains(&Flag::CarBrandTrimmedPostFormat));
        assert_eq!(candidate.brand.as_deref(), Some("Honda"));
    }

    #[test]
    fn test_brand_city_order_follows_domain() {
        let candidate = run("hondaofnaples.com");
        assert_eq!(candidate.name(), "Honda Naples");
        assert!(candidate.flags.contains(&Flag::CarBrandCityException));
    }

    #[test]
    fn test_brand_region() {
        let candidate = run("toyotaofnorth.com");
        assert_eq!(candidate.name(), "Toyota North");
        assert!(candidate.flags.contains(&Flag::CarBrandRegionException));
    }

    #[test]
    fn test_proper_noun_beats_brand_suffix() {
        let candidate = run("graingernissan.com");
        assert_eq!(candidate.name(), "Grainger");
        assert!(candidate.flags.contains(&Flag::ProperNounRecovered));
        assert!(candidate.flags.contains(&Flag::CarBrandTrimmedPostFormat));
        assert!(!candidate.needs_fallback);
    }

    #[test]
    fn test_first_last_pair() {
        let candidate = run("rodbakerford.com");
        assert_eq!(candidate.name(), "Rod Baker");
        assert!(candidate.flags.contains(&Flag::FirstLastNamePair));
        assert!(candidate.flags.contains(&Flag::MultiToken));
    }

    #[test]
    fn test_blob_never_returned_raw() {
        let candidate = run("jimbutlermaserati.com");
        assert_ne!(candidate.name(), "Jimbutlermaserati");
        assert!(candidate.flags.contains(&Flag::FallbackBlobSplit));
    }

    #[test]
    fn test_generic_words_stripped() {
        let candidate = run("mcgrath-motors-of-texas.com");
        assert!(candidate.flags.contains(&Flag::GenericWordsStripped));
        assert_eq!(candidate.name(), "McGrath Texas");
    }

    #[test]
    fn test_duplicate_brand_is_not_leaked() {
        let candidate = run("kia-of-kia.com");
        assert!(candidate.flags.contains(&Flag::DuplicatesRemoved));
        assert!(candidate.flags.contains(&Flag::BrandOnlyFallback));
        assert!(candidate.needs_fallback);
        assert_ne!(candidate.name(), "Kia");
    }

    #[test]
    fn test_brand_only_recovered_with_city() {
        let ctx = NameContext {
            domain: "kia.com".to_string(),
            city: Some("Naples".to_string()),
            ..Default::default()
        };
        let candidate = run_with(ctx);
        assert_eq!(candidate.name(), "Naples Kia");
        assert_eq!(candidate.confidence_cap, Some(RECOVERY_CONFIDENCE_CAP));
        assert!(candidate.flags.contains(&Flag::BrandOnlyFallback));
        assert!(candidate.flags.contains(&Flag::ReviewNeeded));
    }

    #[test]
    fn test_city_only_recovered_with_brand() {
        let ctx = NameContext {
            domain: "naples-auto.com".to_string(),
            brand: Some("chevy".to_string()),
            ..Default::default()
        };
        let candidate = run_with(ctx);
        assert_eq!(candidate.name(), "Naples Chevrolet");
        assert!(candidate.flags.contains(&Flag::CityOnlyFallback));
        assert_eq!(candidate.confidence_cap, Some(RECOVERY_CONFIDENCE_CAP));
    }

    #[test]
    fn test_city_only_without_context_needs_fallback() {
        let candidate = run("naples-cars.com");
        assert!(candidate.needs_fallback);
        assert!(candidate.is_empty());
        assert!(candidate.flags.contains(&Flag::CityOnlyFallback));
    }

    #[test]
    fn test_unknown_single_token_rejected() {
        let candidate = run("zorb.com");
        assert!(candidate.needs_fallback);
        assert!(candidate.flags.contains(&Flag::TooGeneric));
        assert!(candidate.flags.contains(&Flag::LowTokenVariety));
    }

    #[test]
    fn test_brand_kept_when_it_carries_the_name() {
        let candidate = run("zorb-ford.com");
        assert_eq!(candidate.name(), "Zorb Ford");
        assert!(candidate.flags.contains(&Flag::CarBrandSuffixRemaining));
    }

    #[test]
    fn test_repeated_word_collapses_in_final_name() {
        let candidate = Candidate {
            parts: vec!["Kia".to_string(), "kia".to_string(), "Motors Kia".to_string()],
            ..Default::default()
        };
        let candidate = finish(candidate, &TokenStream::default());
        assert_eq!(candidate.name(), "Kia Motors");
        assert!(candidate.flags.contains(&Flag::DuplicatesRemoved));
        assert!(candidate.flags.contains(&Flag::MultiToken));
    }

    #[test]
    fn test_token_ceiling() {
        let candidate = run("zorb-quix-blen-varn.com");
        assert_eq!(candidate.word_count(), MAX_NAME_WORDS);
        assert!(candidate.flags.contains(&Flag::TokenCountAdjusted));
    }

    #[test]
    fn test_empty_tokens() {
        let candidate = run("");
        assert!(candidate.needs_fallback);
        assert!(candidate.flags.contains(&Flag::EmptyTokens));
    }
}
