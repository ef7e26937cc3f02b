//! Core domain model for dealer name humanization.
//!
//! This crate defines the fundamental types used throughout the system:
//! - `InputRecord`: A lead as received from the caller (domain plus hints)
//! - `NameContext`: The advisory context handed to the rule engine
//! - `NameResult`: The final name, confidence, brand and flags
//! - `Flag`: Closed set of diagnostic codes emitted while a name is built
//! - `Lead`: A batch entry, parsed or kept raw for rejection
//! - `BatchRequest` / `BatchResponse`: Batch envelopes

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Confidence reported for a hand-curated override. Sits above the computed
/// range so an override always outranks a pattern-matched name.
pub const OVERRIDE_CONFIDENCE: u8 = 125;

/// Upper bound for every computed (non-override) confidence.
pub const MAX_COMPUTED_CONFIDENCE: u8 = 100;

/// Confidence reported for a franchise group match.
pub const FRANCHISE_CONFIDENCE: u8 = 100;

/// Ceiling for names recovered from a bare city or bare brand.
pub const RECOVERY_CONFIDENCE_CAP: u8 = 50;

/// Confidence of a non-empty deterministic fallback name.
pub const DETERMINISTIC_FALLBACK_CONFIDENCE: u8 = 70;

/// Errors raised for records that cannot enter the pipeline at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Missing domain")]
    MissingDomain,
    #[error("Malformed input: {0}")]
    Malformed(String),
}

/// Row or batch identifier as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

/// A lead to humanize.
///
/// Only `domain` is required. Everything else is advisory and is validated
/// against the lexicon before use.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRecord {
    #[serde(default)]
    pub domain: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_name: Option<String>,

    /// Pre-split tokens; when present they replace tokenization of the domain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_num: Option<RecordId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<RecordId>,
}

impl InputRecord {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Default::default()
        }
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_fallback_name(mut self, name: impl Into<String>) -> Self {
        self.fallback_name = Some(name.into());
        self
    }

    pub fn with_row_num(mut self, row: i64) -> Self {
        self.row_num = Some(RecordId::Number(row));
        self
    }

    /// Reject records that cannot be processed at all.
    pub fn validate(&self) -> Result<(), InputError> {
        if self.domain.trim().is_empty() {
            return Err(InputError::MissingDomain);
        }
        if self.domain.trim().contains(char::is_whitespace) {
            return Err(InputError::Malformed(format!(
                "domain contains whitespace: {:?}",
                self.domain
            )));
        }
        Ok(())
    }

    /// Composite cache key: `domain|city|brand`, lowercased.
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.domain.trim().to_lowercase(),
            self.city.as_deref().unwrap_or("").trim().to_lowercase(),
            self.brand.as_deref().unwrap_or("").trim().to_lowercase()
        )
    }

    /// Advisory context for the rule engine.
    pub fn context(&self) -> NameContext {
        NameContext {
            domain: self.domain.trim().to_string(),
            city: non_blank(self.city.as_deref()),
            brand: non_blank(self.brand.as_deref()),
            fallback_name: non_blank(self.fallback_name.as_deref()),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Context consumed by the pattern matcher and fallbacks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameContext {
    pub domain: String,
    pub city: Option<String>,
    pub brand: Option<String>,
    pub fallback_name: Option<String>,
}

impl NameContext {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Default::default()
        }
    }
}

/// Diagnostic codes accumulated while a name is built.
///
/// Flags document history: once added they stay, except when a fully invalid
/// name is replaced by a fallback and the list is reset to that provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flag {
    OverrideMatch,
    FranchiseGroupMatch,
    ShopCarBrandException,
    HappyCarBrandException,
    CarBrandCityException,
    CarBrandRegionException,
    CarBrandTrimmedPostFormat,
    CarBrandSuffixRemaining,
    ProperNounRecovered,
    FirstLastNamePair,
    MultiToken,
    SingleToken,
    GenericWordsStripped,
    TooGeneric,
    LowTokenVariety,
    CityOnlyFallback,
    BrandOnlyFallback,
    DuplicatesRemoved,
    TokenCountAdjusted,
    FallbackBlobSplit,
    UnsplitBlob,
    ShortBrandAlias,
    EmptyTokens,
    InvalidShape,
    #[serde(rename = "OpenAIMatch")]
    OpenAiMatch,
    FallbackMatch,
    FallbackGenerated,
    FallbackNameUsed,
    CompletionFailed,
    CacheHit,
    MissingDomain,
    ReviewNeeded,
    NeedsHumanReview,
}

impl Flag {
    /// Get a human-readable label for this flag.
    pub fn label(&self) -> &'static str {
        match self {
            Self::OverrideMatch => "Manual Override",
            Self::FranchiseGroupMatch => "Franchise Group",
            Self::ShopCarBrandException => "Shop + Brand",
            Self::HappyCarBrandException => "Happy + Brand",
            Self::CarBrandCityException => "City + Brand",
            Self::CarBrandRegionException => "Brand + Region",
            Self::CarBrandTrimmedPostFormat => "Brand Trimmed",
            Self::CarBrandSuffixRemaining => "Brand Kept",
            Self::ProperNounRecovered => "Proper Noun",
            Self::FirstLastNamePair => "Owner Name",
            Self::MultiToken => "Multi Token",
            Self::SingleToken => "Single Token",
            Self::GenericWordsStripped => "Generic Words Stripped",
            Self::TooGeneric => "Too Generic",
            Self::LowTokenVariety => "Low Token Variety",
            Self::CityOnlyFallback => "City Only",
            Self::BrandOnlyFallback => "Brand Only",
            Self::DuplicatesRemoved => "Duplicates Removed",
            Self::TokenCountAdjusted => "Truncated",
            Self::FallbackBlobSplit => "Blob Split",
            Self::UnsplitBlob => "Unsplit Blob",
            Self::ShortBrandAlias => "Short Brand Alias",
            Self::EmptyTokens => "No Tokens",
            Self::InvalidShape => "Invalid Shape",
            Self::OpenAiMatch => "Model Answer",
            Self::FallbackMatch => "Local Fallback",
            Self::FallbackGenerated => "Deterministic Fallback",
            Self::FallbackNameUsed => "Caller Fallback Name",
            Self::CompletionFailed => "Completion Failed",
            Self::CacheHit => "Cached",
            Self::MissingDomain => "Missing Domain",
            Self::ReviewNeeded => "Review Needed",
            Self::NeedsHumanReview => "Needs Human Review",
        }
    }

    /// Whether this flag routes a result to the manual review queue.
    pub fn is_review_signal(&self) -> bool {
        matches!(self, Self::ReviewNeeded | Self::NeedsHumanReview)
    }
}

/// Append a flag unless it is already present.
pub fn push_flag(flags: &mut Vec<Flag>, flag: Flag) {
    if !flags.contains(&flag) {
        flags.push(flag);
    }
}

/// The humanized name for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameResult {
    /// Domain as supplied
    #[serde(default)]
    pub domain: String,

    /// Presentable name, possibly empty
    pub name: String,

    /// 0-100 for computed names, 125 for overrides
    pub confidence: u8,

    /// Canonical brand, empty when unknown
    #[serde(default)]
    pub brand: String,

    #[serde(default)]
    pub flags: Vec<Flag>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_num: Option<RecordId>,
}

impl NameResult {
    pub fn new(domain: impl Into<String>, name: impl Into<String>, confidence: u8) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
            confidence,
            brand: String::new(),
            flags: Vec::new(),
            error: None,
            row_num: None,
        }
    }

    /// Result for a record rejected before processing.
    pub fn rejected(record: &InputRecord, error: &InputError) -> Self {
        let mut flags = Vec::new();
        if matches!(error, InputError::MissingDomain) {
            flags.push(Flag::MissingDomain);
        }
        flags.push(Flag::ReviewNeeded);
        Self {
            domain: record.domain.clone(),
            name: String::new(),
            confidence: 0,
            brand: String::new(),
            flags,
            error: Some(error.to_string()),
            row_num: record.row_num.clone(),
        }
    }

    pub fn has_flag(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }

    /// Whether a human should look at this result before it is used.
    pub fn needs_review(&self) -> bool {
        self.flags.iter().any(Flag::is_review_signal)
    }
}

/// One entry of a batch, kept even when it does not parse as a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Lead {
    Record(InputRecord),
    Invalid(Value),
}

impl From<InputRecord> for Lead {
    fn from(record: InputRecord) -> Self {
        Lead::Record(record)
    }
}

impl Lead {
    /// The record to name, or the rejected result for a lead that is not one.
    pub fn record(&self) -> Result<&InputRecord, NameResult> {
        match self {
            Lead::Record(record) => Ok(record),
            Lead::Invalid(value) => {
                let (salvaged, error) = salvage(value);
                Err(NameResult::rejected(&salvaged, &error))
            }
        }
    }
}

/// Keep whatever identifies an unparseable lead and classify why it failed.
fn salvage(value: &Value) -> (InputRecord, InputError) {
    let Some(fields) = value.as_object() else {
        return (
            InputRecord::default(),
            InputError::Malformed("lead must be a JSON object".to_string()),
        );
    };

    let id = |key: &str| {
        fields
            .get(key)
            .and_then(|v| serde_json::from_value::<RecordId>(v.clone()).ok())
    };
    let record = InputRecord {
        domain: fields.get("domain").and_then(Value::as_str).unwrap_or_default().to_string(),
        row_num: id("rowNum"),
        batch_id: id("batchId"),
        ..Default::default()
    };

    let error = match fields.get("domain") {
        None | Some(Value::Null) => InputError::MissingDomain,
        Some(Value::String(domain)) if domain.trim().is_empty() => InputError::MissingDomain,
        Some(Value::String(_)) => InputError::Malformed("lead has a field of the wrong type".to_string()),
        Some(other) => InputError::Malformed(format!("domain must be a string, got {other}")),
    };
    (record, error)
}

/// Batch endpoint input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRequest {
    pub leads: Vec<Lead>,
}

/// Batch endpoint output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub results: Vec<NameResult>,
    pub manual_review_queue: Vec<NameResult>,
    /// Set when a deadline cut the batch short
    pub partial: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_deserialization() {
        let json = r#"{"domain":"napleshonda.com","city":"Naples","fallbackName":"Honda of Naples","rowNum":7}"#;
        let record: InputRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.domain, "napleshonda.com");
        assert_eq!(record.city.as_deref(), Some("Naples"));
        assert_eq!(record.fallback_name.as_deref(), Some("Honda of Naples"));
        assert_eq!(record.row_num, Some(RecordId::Number(7)));
    }

    #[test]
    fn test_missing_domain_is_rejected() {
        let record: InputRecord = serde_json::from_str(r#"{"city":"Naples"}"#).unwrap();
        assert_eq!(record.validate(), Err(InputError::MissingDomain));
        assert_eq!(InputRecord::new("   ").validate(), Err(InputError::MissingDomain));
        assert!(matches!(
            InputRecord::new("bad domain.com").validate(),
            Err(InputError::Malformed(_))
        ));
    }

    #[test]
    fn test_cache_key() {
        let record = InputRecord::new("NaplesHonda.com")
            .with_city("Naples")
            .with_brand("Honda");
        assert_eq!(record.cache_key(), "napleshonda.com|naples|honda");
        assert_eq!(InputRecord::new("a.com").cache_key(), "a.com||");
    }

    #[test]
    fn test_context_drops_blank_hints() {
        let record = InputRecord::new(" a.com ").with_city("  ").with_brand("Ford");
        let ctx = record.context();
        assert_eq!(ctx.domain, "a.com");
        assert_eq!(ctx.city, None);
        assert_eq!(ctx.brand.as_deref(), Some("Ford"));
    }

    #[test]
    fn test_flag_serialization() {
        let flags = vec![Flag::OpenAiMatch, Flag::CarBrandCityException];
        let json = serde_json::to_string(&flags).unwrap();
        assert_eq!(json, r#"["OpenAIMatch","CarBrandCityException"]"#);
    }

    #[test]
    fn test_rejected_result() {
        let record = InputRecord::new("").with_row_num(2);
        let result = NameResult::rejected(&record, &InputError::MissingDomain);
        assert_eq!(result.name, "");
        assert_eq!(result.confidence, 0);
        assert!(result.has_flag(Flag::MissingDomain));
        assert!(result.needs_review());
        assert_eq!(result.row_num, Some(RecordId::Number(2)));
    }

    #[test]
    fn test_leads_convert_one_by_one() {
        let request: BatchRequest = serde_json::from_str(
            r#"{"leads":[
                {"domain":"napleshonda.com","rowNum":1},
                {"domain":null,"rowNum":2},
                {"domain":123,"rowNum":"r3"},
                {"domain":"kia.com","city":7},
                "kia.com"
            ]}"#,
        )
        .unwrap();
        assert_eq!(request.leads.len(), 5);

        assert_eq!(request.leads[0].record().unwrap().domain, "napleshonda.com");

        let null = request.leads[1].record().unwrap_err();
        assert_eq!(null.error.as_deref(), Some("Missing domain"));
        assert!(null.has_flag(Flag::MissingDomain));
        assert_eq!(null.row_num, Some(RecordId::Number(2)));

        let number = request.leads[2].record().unwrap_err();
        assert!(number.error.as_deref().unwrap().starts_with("Malformed input: domain must be a string"));
        assert!(!number.has_flag(Flag::MissingDomain));
        assert_eq!(number.row_num, Some(RecordId::Text("r3".to_string())));

        let wrong_city = request.leads[3].record().unwrap_err();
        assert_eq!(wrong_city.domain, "kia.com");
        assert!(wrong_city.error.is_some());

        assert!(request.leads[4].record().unwrap_err().error.is_some());
    }

    #[test]
    fn test_push_flag_dedupes() {
        let mut flags = vec![Flag::MultiToken];
        push_flag(&mut flags, Flag::MultiToken);
        push_flag(&mut flags, Flag::ReviewNeeded);
        assert_eq!(flags, vec![Flag::MultiToken, Flag::ReviewNeeded]);
    }

    #[test]
    fn test_batch_response_shape() {
        let response = BatchResponse::default();
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("manualReviewQueue").is_some());
        assert_eq!(json["partial"], false);
    }
}
