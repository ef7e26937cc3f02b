//! Explanation generation for humanized names.
//!
//! Converts flags into human-readable explanations suitable for the manual
//! review queue and the CLI text output.

use dealername_model::{Flag, NameResult, OVERRIDE_CONFIDENCE};
use serde::{Deserialize, Serialize};

/// A structured explanation for one flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    /// Short summary (1 line)
    pub summary: String,

    /// Detailed explanation (1-2 sentences)
    pub detail: String,

    /// How much the flag should worry a reviewer (0.0 - 1.0)
    pub severity: f32,
}

impl Explanation {
    fn new(summary: impl Into<String>, detail: impl Into<String>, severity: f32) -> Self {
        Self {
            summary: summary.into(),
            detail: detail.into(),
            severity,
        }
    }
}

/// Generate explanations for every flag on a result.
pub fn explain_result(result: &NameResult) -> Vec<Explanation> {
    result
        .flags
        .iter()
        .map(|flag| explain_flag(flag, &result.domain, &result.name))
        .collect()
}

/// Generate the explanation for a single flag.
pub fn explain_flag(flag: &Flag, domain: &str, name: &str) -> Explanation {
    match flag {
        Flag::OverrideMatch => Explanation::new(
            "Manual override",
            format!("'{domain}' has a curated name; '{name}' was used as-is."),
            0.0,
        ),
        Flag::FranchiseGroupMatch => Explanation::new(
            "Franchise group",
            format!("'{domain}' belongs to a known dealer group, named '{name}'."),
            0.1,
        ),
        Flag::ShopCarBrandException | Flag::HappyCarBrandException => Explanation::new(
            "Idiomatic prefix kept",
            format!("'{name}' keeps its prefix because the brand alone would not be a name."),
            0.1,
        ),
        Flag::CarBrandCityException => Explanation::new(
            "City and brand",
            "The domain is a city plus a brand; both are kept so the name is not a bare city.",
            0.1,
        ),
        Flag::CarBrandRegionException => Explanation::new(
            "Brand and region",
            "The domain pairs a brand with a region word; both are kept.",
            0.2,
        ),
        Flag::CarBrandTrimmedPostFormat => Explanation::new(
            "Brand trimmed",
            "A trailing brand was dropped because the rest of the name stands on its own.",
            0.1,
        ),
        Flag::CarBrandSuffixRemaining => Explanation::new(
            "Brand kept",
            "The trailing brand was kept because removing it would leave too little.",
            0.2,
        ),
        Flag::ProperNounRecovered => Explanation::new(
            "Proper noun",
            format!("'{name}' contains a known proper noun or family name."),
            0.0,
        ),
        Flag::FirstLastNamePair => Explanation::new(
            "Owner name",
            format!("'{name}' was read as a first and last name."),
            0.0,
        ),
        Flag::MultiToken => Explanation::new("Multi token", "The name has two or three words.", 0.0),
        Flag::SingleToken => Explanation::new("Single token", "The name is a single word.", 0.2),
        Flag::GenericWordsStripped => Explanation::new(
            "Generic words stripped",
            "Filler such as 'motors' or 'of' was removed.",
            0.1,
        ),
        Flag::TooGeneric => Explanation::new(
            "Too generic",
            "Nothing distinctive was left after filler words were removed.",
            0.7,
        ),
        Flag::LowTokenVariety => Explanation::new(
            "Low token variety",
            "A single unrecognized word is not enough to name a dealership.",
            0.6,
        ),
        Flag::CityOnlyFallback => Explanation::new(
            "City only",
            format!("'{domain}' only yielded a city; a brand was needed to make a name."),
            0.7,
        ),
        Flag::BrandOnlyFallback => Explanation::new(
            "Brand only",
            format!("'{domain}' only yielded a brand; a city was needed to make a name."),
            0.7,
        ),
        Flag::DuplicatesRemoved => Explanation::new(
            "Duplicates removed",
            "A repeated word was collapsed.",
            0.3,
        ),
        Flag::TokenCountAdjusted => Explanation::new(
            "Truncated",
            "The name was cut to three words.",
            0.4,
        ),
        Flag::FallbackBlobSplit => Explanation::new(
            "Blob split",
            format!("'{domain}' had no separators and was split using known words."),
            0.3,
        ),
        Flag::UnsplitBlob => Explanation::new(
            "Unsplit blob",
            "A long run of letters could not be split into words.",
            0.8,
        ),
        Flag::ShortBrandAlias => Explanation::new(
            "Short brand alias",
            "A two or three letter brand abbreviation was expanded and may be wrong.",
            0.4,
        ),
        Flag::EmptyTokens => Explanation::new(
            "No tokens",
            format!("Nothing usable was found in '{domain}'."),
            0.9,
        ),
        Flag::InvalidShape => Explanation::new(
            "Invalid shape",
            "The candidate was not 1-3 capitalized words of letters and hyphens.",
            0.8,
        ),
        Flag::OpenAiMatch => Explanation::new(
            "Model answer",
            "The completion service proposed this name and it passed validation.",
            0.3,
        ),
        Flag::FallbackMatch => Explanation::new(
            "Local fallback",
            "The completion service answer was not trusted; a local name was used.",
            0.5,
        ),
        Flag::FallbackGenerated => Explanation::new(
            "Deterministic fallback",
            "The name was built from the best available token plus city or brand.",
            0.7,
        ),
        Flag::FallbackNameUsed => Explanation::new(
            "Caller fallback name",
            "The listed business name supplied with the record was used.",
            0.5,
        ),
        Flag::CompletionFailed => Explanation::new(
            "Completion failed",
            "The completion service errored, timed out or returned an unusable reply.",
            0.6,
        ),
        Flag::CacheHit => Explanation::new("Cached", "The result came from the cache.", 0.0),
        Flag::MissingDomain => Explanation::new(
            "Missing domain",
            "The record had no domain and could not be processed.",
            1.0,
        ),
        Flag::ReviewNeeded | Flag::NeedsHumanReview => Explanation::new(
            "Review needed",
            "A person should check this name before it is used.",
            0.9,
        ),
    }
}

/// Generate a one-line summary for a result.
pub fn summarize_result(result: &NameResult) -> String {
    if result.name.is_empty() {
        return match &result.error {
            Some(error) => format!("NO NAME: {error}"),
            None => "NO NAME: nothing usable was found".to_string(),
        };
    }

    let level = if result.confidence >= OVERRIDE_CONFIDENCE {
        "CURATED"
    } else if result.confidence >= 80 {
        "HIGH CONFIDENCE"
    } else if result.confidence >= 60 {
        "MODERATE CONFIDENCE"
    } else {
        "LOW CONFIDENCE"
    };

    let flag_labels: Vec<_> = result.flags.iter().map(|f| f.label()).collect();
    if flag_labels.is_empty() {
        format!("{}: {}", level, result.name)
    } else {
        format!("{}: {} ({})", level, result.name, flag_labels.join(", "))
    }
}
