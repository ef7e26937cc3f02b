//! End-to-end naming scenarios against the bundled lexicon, without a
//! completion service.

use dealername_completion::NoCompletion;
use dealername_lexicon::Lexicon;
use dealername_model::{Flag, InputRecord, NameResult, OVERRIDE_CONFIDENCE};
use dealername_pipeline::{handle_batch, process_record, MemoryCache, PipelineConfig, ProcessingContext};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn offline() -> ProcessingContext<NoCompletion, MemoryCache> {
    let config = PipelineConfig {
        use_completion: false,
        ..Default::default()
    };
    ProcessingContext::new(Arc::new(Lexicon::builtin().unwrap()), NoCompletion, MemoryCache::new(), config)
}

async fn name(domain: &str) -> NameResult {
    process_record(&offline(), &InputRecord::new(domain)).await
}

#[tokio::test]
async fn test_proper_noun_with_brand_suffix() {
    let result = name("graingernissan.com").await;
    assert_eq!(result.name, "Grainger");
    assert!(result.confidence >= 70);
    assert!(result.has_flag(Flag::ProperNounRecovered));
}

#[tokio::test]
async fn test_city_and_brand() {
    let result = name("napleshonda.com").await;
    assert_eq!(result.name, "Naples Honda");
    assert_eq!(result.confidence, 100);
    assert_eq!(result.brand, "Honda");
    assert!(result.has_flag(Flag::CarBrandCityException));
    assert!(!result.needs_review());
}

#[tokio::test]
async fn test_blob_is_split() {
    let result = name("jimbutlermaserati.com").await;
    assert_ne!(result.name.to_lowercase(), "jimbutlermaserati");
    assert!(!result.name.is_empty());
}

#[tokio::test]
async fn test_override_beats_context_and_patterns() {
    let ctx = offline();
    let record = InputRecord::new("patmilliken.com").with_city("Detroit").with_brand("Ford");
    let curated = process_record(&ctx, &record).await;
    assert_eq!(curated.name, "Pat Milliken");
    assert_eq!(curated.confidence, OVERRIDE_CONFIDENCE);
    assert_eq!(curated.flags, vec![Flag::OverrideMatch]);

    let pattern = process_record(&ctx, &InputRecord::new("napleshonda.com")).await;
    assert!(curated.confidence > pattern.confidence);
}

#[tokio::test]
async fn test_brand_and_region() {
    let result = name("toyotaofnorth.com").await;
    assert!(result.name.contains("Toyota"));
    assert!(result.name.contains("North"));
    assert!(result.has_flag(Flag::CarBrandRegionException));
}

#[tokio::test]
async fn test_duplicates_collapse() {
    let result = name("kia-of-kia.com").await;
    assert!(result.has_flag(Flag::DuplicatesRemoved));
    assert_ne!(result.name, "Kia Kia");
    assert_ne!(result.name, "Kia");
    assert!(result.needs_review());
}

#[tokio::test]
async fn test_batch_with_blank_domain() {
    let body = r#"{"leads":[
        {"domain":"napleshonda.com","rowNum":1},
        {"domain":"","rowNum":2},
        {"domain":"rodbakerford.com","rowNum":3}
    ]}"#;
    let response = handle_batch(&offline(), body).await;
    assert_eq!(response.status, 200);

    let results = response.body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["name"], "Naples Honda");
    assert_eq!(results[1]["error"], "Missing domain");
    assert_eq!(results[2]["name"], "Rod Baker");
    assert_eq!(response.body["partial"], false);
    assert_eq!(response.body["manualReviewQueue"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_results_are_cached() {
    let ctx = offline();
    let first = process_record(&ctx, &InputRecord::new("napleshonda.com")).await;
    let second = process_record(&ctx, &InputRecord::new("napleshonda.com")).await;
    assert!(!first.has_flag(Flag::CacheHit));
    assert!(second.has_flag(Flag::CacheHit));
    assert_eq!(first.name, second.name);
    assert_eq!(ctx.cache.len(), 1);
}
