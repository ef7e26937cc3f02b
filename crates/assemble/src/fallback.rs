//! Deterministic last-resort names.

use dealername_features::{capitalize, split_words, TokenStream};
use dealername_lexicon::Lexicon;
use dealername_model::{Flag, NameContext, DETERMINISTIC_FALLBACK_CONFIDENCE};

use crate::{classify, context_brand, context_city, Candidate, Segment, MAX_NAME_WORDS};

/// Corporate suffixes that never belong in a display name.
const CORPORATE_SUFFIXES: [&str; 6] = ["llc", "inc", "corp", "co", "ltd", "dba"];

/// Minimum length of a token promoted to `"{Token} Auto"`.
const MIN_BEST_TOKEN_LEN: usize = 3;

/// Build a name from whatever context is left, in order:
/// `"{City} {Brand}"`, the caller's fallback name, `"{Token} Auto"`, empty.
///
/// Confidence is fixed: 70 for any non-empty name, 0 otherwise.
pub fn deterministic_fallback(stream: &TokenStream, ctx: &NameContext, lexicon: &Lexicon) -> Candidate {
    let segments = classify(&stream.tokens, lexicon);
    let brand = segments
        .iter()
        .find_map(|s| s.brand.clone())
        .or_else(|| context_brand(ctx, lexicon));
    let city = context_city(ctx, lexicon).or_else(|| {
        segments
            .iter()
            .find(|s| s.is_bare_city())
            .map(Segment::display)
    });

    let mut candidate = Candidate {
        brand: brand.clone(),
        ..Default::default()
    };

    if let (Some(city), Some(brand)) = (&city, &brand) {
        candidate.parts = vec![city.clone(), brand.clone()];
    } else if let Some(name) = ctx
        .fallback_name
        .as_deref()
        .and_then(|n| clean_display_name(n, lexicon))
    {
        candidate.flag(Flag::FallbackNameUsed);
        candidate.parts = vec![name];
    } else if let Some(token) = best_token(&segments, stream) {
        candidate.parts = vec![token, "Auto".to_string()];
    }

    candidate.flag(Flag::FallbackGenerated);
    candidate.flag(Flag::ReviewNeeded);
    candidate.fixed_confidence = Some(if candidate.is_empty() {
        0
    } else {
        DETERMINISTIC_FALLBACK_CONFIDENCE
    });

    tracing::debug!(
        domain = %ctx.domain,
        name = %candidate.name(),
        "Deterministic fallback"
    );
    candidate
}

/// Turn free text such as "Honda of Naples, LLC" into a presentable name.
///
/// Returns `None` when nothing usable remains.
pub fn clean_display_name(text: &str, lexicon: &Lexicon) -> Option<String> {
    let words: Vec<String> = split_words(text)
        .into_iter()
        .filter(|w| w.chars().all(|c| c.is_alphabetic()))
        .filter(|w| !CORPORATE_SUFFIXES.contains(&w.as_str()))
        .collect();

    let informative: Vec<&String> = words.iter().filter(|w| !lexicon.is_generic(w)).collect();
    let chosen: Vec<&String> = if informative.is_empty() {
        words.iter().collect()
    } else {
        informative
    };

    let display: Vec<String> = chosen
        .into_iter()
        .take(MAX_NAME_WORDS)
        .map(|w| match lexicon.canonical_brand(w) {
            Some(canonical) => canonical.to_string(),
            None => capitalize(w),
        })
        .collect();

    if display.is_empty() {
        None
    } else {
        Some(display.join(" "))
    }
}

/// Identity segments first, then any informative word; brands last.
fn best_token(segments: &[Segment], stream: &TokenStream) -> Option<String> {
    let usable = |s: &&Segment| {
        !s.is_strippable()
            && s.text().len() >= MIN_BEST_TOKEN_LEN
            && s.words.iter().all(|w| w.chars().all(|c| c.is_ascii_alphabetic()))
            && !stream.unsplit_blobs.contains(&s.text())
    };

    segments
        .iter()
        .filter(usable)
        .find(|s| s.has_identity() && !s.is_brand())
        .or_else(|| segments.iter().filter(usable).find(|s| !s.is_brand()))
        .or_else(|| segments.iter().find(usable))
        .map(Segment::display)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealername_features::tokenize;
    use pretty_assertions::assert_eq;

    fn fallback(ctx: NameContext) -> Candidate {
        let lex = Lexicon::builtin().unwrap();
        let stream = tokenize(&ctx.domain, &lex);
        deterministic_fallback(&stream, &ctx, &lex)
    }

    #[test]
    fn test_city_and_brand_preferred() {
        let ctx = NameContext {
            domain: "kia-of-kia.com".to_string(),
            city: Some("naples".to_string()),
            fallback_name: Some("Ignored Name".to_string()),
            ..Default::default()
        };
        let candidate = fallback(ctx);
        assert_eq!(candidate.name(), "Naples Kia");
        assert_eq!(candidate.fixed_confidence, Some(DETERMINISTIC_FALLBACK_CONFIDENCE));
        assert_eq!(candidate.flags, vec![Flag::FallbackGenerated, Flag::ReviewNeeded]);
    }

    #[test]
    fn test_fallback_name_used() {
        let ctx = NameContext {
            domain: "zorb.com".to_string(),
            fallback_name: Some("Zorb Motors of Tampa, LLC".to_string()),
            ..Default::default()
        };
        let candidate = fallback(ctx);
        assert_eq!(candidate.name(), "Zorb Tampa");
        assert!(candidate.flags.contains(&Flag::FallbackNameUsed));
    }

    #[test]
    fn test_token_auto() {
        let candidate = fallback(NameContext::new("naples-cars.com"));
        assert_eq!(candidate.name(), "Naples Auto");
        assert!(candidate.flags.contains(&Flag::ReviewNeeded));
    }

    #[test]
    fn test_nothing_left() {
        let candidate = fallback(NameContext::new("auto-sales.com"));
        assert_eq!(candidate.name(), "");
        assert_eq!(candidate.fixed_confidence, Some(0));
        assert!(candidate.flags.contains(&Flag::FallbackGenerated));
    }

    #[test]
    fn test_clean_display_name() {
        let lex = Lexicon::builtin().unwrap();
        assert_eq!(
            clean_display_name("chevy of naples inc.", &lex),
            Some("Chevrolet Naples".to_string())
        );
        assert_eq!(clean_display_name("Bob's Auto 24/7", &lex), Some("Bobs".to_string()));
        assert_eq!(clean_display_name("123 !!", &lex), None);
    }
}
