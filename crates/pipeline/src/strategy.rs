//! Per-record strategy chain.
//!
//! Curated match, then local rules, then the completion service, then the
//! deterministic fallback. Failures in any step degrade to the next one.

use dealername_assemble::{assemble, context_brand, deterministic_fallback, Candidate};
use dealername_completion::{with_paced_retries, CompletionError, CompletionOptions, CompletionRequest, CompletionService};
use dealername_features::{normalize_tokens, tokenize, TokenStream};
use dealername_lexicon::Lexicon;
use dealername_model::{push_flag, Flag, InputRecord, NameContext, NameResult};
use dealername_prompt::{parse_reply, ChatDialect, ModelReply, PromptDialect, PromptError, PromptRequest, ReplyError};
use dealername_score::{names_known_entity, score, validate, GateFailure, ScoreContext};
use thiserror::Error;

use crate::{NameCache, PipelineConfig, ProcessingContext};

/// Why the completion fallback produced nothing usable.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),

    #[error("Reply error: {0}")]
    Reply(#[from] ReplyError),
}

/// A settled name before it becomes a `NameResult`.
#[derive(Debug)]
struct Outcome {
    name: String,
    confidence: u8,
    flags: Vec<Flag>,
    brand: Option<String>,
    gate_passed: bool,
}

/// Local candidate after scoring and the validity gate.
#[derive(Debug)]
struct Judged {
    candidate: Candidate,
    confidence: u8,
    gate: Result<(), GateFailure>,
}

impl Judged {
    fn usable(&self) -> bool {
        !self.candidate.needs_fallback && self.gate.is_ok()
    }

    fn into_outcome(self) -> Outcome {
        Outcome {
            name: self.candidate.name(),
            confidence: self.confidence,
            gate_passed: self.gate.is_ok(),
            flags: self.candidate.flags,
            brand: self.candidate.brand,
        }
    }
}

/// Name one record. Never fails: problems are reported through flags and,
/// for rejected input, the `error` field.
pub async fn process_record<S, C>(ctx: &ProcessingContext<S, C>, record: &InputRecord) -> NameResult
where
    S: CompletionService,
    C: NameCache,
{
    if let Err(error) = record.validate() {
        tracing::warn!(domain = %record.domain, %error, "Rejected record");
        return NameResult::rejected(record, &error);
    }

    let key = record.cache_key();
    match ctx.cache.get(&key).await {
        Ok(Some(mut cached)) => {
            tracing::debug!(domain = %record.domain, "Cache hit");
            push_flag(&mut cached.flags, Flag::CacheHit);
            cached.domain = record.domain.clone();
            cached.row_num = record.row_num.clone();
            return cached;
        }
        Ok(None) => {}
        Err(error) => {
            tracing::warn!(domain = %record.domain, %error, "Cache read failed, treating as miss");
        }
    }

    let name_ctx = record.context();
    let stream = match &record.tokens {
        Some(tokens) if !tokens.is_empty() => TokenStream {
            tokens: normalize_tokens(tokens),
            ..Default::default()
        },
        _ => tokenize(&name_ctx.domain, &ctx.lexicon),
    };

    let outcome = resolve(ctx, &name_ctx, &stream).await;

    let mut flags = outcome.flags;
    if outcome.name.is_empty() {
        push_flag(&mut flags, Flag::NeedsHumanReview);
    }
    if outcome.confidence < ctx.config.review_threshold {
        push_flag(&mut flags, Flag::ReviewNeeded);
    }

    let result = NameResult {
        domain: record.domain.clone(),
        name: outcome.name,
        confidence: outcome.confidence,
        brand: outcome.brand.unwrap_or_default(),
        flags,
        error: None,
        row_num: record.row_num.clone(),
    };

    if outcome.gate_passed && result.confidence >= ctx.config.cache_write_threshold {
        if let Err(error) = ctx.cache.set(&key, &result, ctx.config.cache_ttl).await {
            tracing::warn!(domain = %record.domain, %error, "Cache write failed");
        }
    }

    tracing::info!(
        domain = %result.domain,
        name = %result.name,
        confidence = result.confidence,
        "Named record"
    );
    result
}

/// Settle a name for one record.
///
/// The completion service is consulted whenever the local candidate is
/// empty, fails the validity gate, or scores below the review threshold
/// (60 by default), not only when its confidence is zero.
async fn resolve<S, C>(ctx: &ProcessingContext<S, C>, name_ctx: &NameContext, stream: &TokenStream) -> Outcome
where
    S: CompletionService,
{
    let lexicon = ctx.lexicon.as_ref();
    let score_ctx = ScoreContext::new(lexicon, &stream.tokens);
    let candidate = assemble(stream, name_ctx, lexicon);

    if let Some(confidence) = candidate.fixed_confidence {
        return Outcome {
            name: candidate.name(),
            confidence,
            brand: candidate.brand.or_else(|| context_brand(name_ctx, lexicon)),
            flags: candidate.flags,
            gate_passed: true,
        };
    }

    let mut local = judge(candidate, &score_ctx, &ctx.config);
    if local.usable() && local.confidence >= ctx.config.review_threshold {
        return local.into_outcome();
    }
    if let (Err(failure), false) = (local.gate, local.candidate.needs_fallback) {
        tracing::debug!(domain = %name_ctx.domain, %failure, "Local name failed validation");
        push_flag(&mut local.candidate.flags, failure.flag());
    }

    if !ctx.config.use_completion {
        return local_fallback(local, name_ctx, stream, &score_ctx);
    }

    let local_name = local.candidate.name();
    match ask_model(ctx, name_ctx, stream, &local_name).await {
        Ok(reply) => select(reply, local, name_ctx, stream, &score_ctx, &ctx.config),
        Err(error) => {
            tracing::warn!(domain = %name_ctx.domain, %error, "Completion fallback failed");
            push_flag(&mut local.candidate.flags, Flag::CompletionFailed);
            local_fallback(local, name_ctx, stream, &score_ctx)
        }
    }
}

fn judge(candidate: Candidate, score_ctx: &ScoreContext, config: &PipelineConfig) -> Judged {
    if candidate.needs_fallback || candidate.is_empty() {
        return Judged {
            candidate,
            confidence: 0,
            gate: Err(GateFailure::Empty),
        };
    }

    let name = candidate.name();
    let breakdown = score(&name, &candidate.flags, score_ctx, &config.score);
    let confidence = candidate
        .confidence_cap
        .map_or(breakdown.total, |cap| breakdown.total.min(cap));
    let gate = validate(&name, score_ctx);

    tracing::debug!(%name, confidence, ?gate, "Scored local candidate");
    Judged {
        candidate,
        confidence,
        gate,
    }
}

async fn ask_model<S, C>(
    ctx: &ProcessingContext<S, C>,
    name_ctx: &NameContext,
    stream: &TokenStream,
    local_name: &str,
) -> Result<ModelReply, AdapterError>
where
    S: CompletionService,
{
    let dialect = ChatDialect {
        max_examples: ctx.config.max_examples,
        score_config: ctx.config.score.clone(),
    };
    let request = PromptRequest::new(name_ctx, &stream.tokens).with_local_name(local_name);
    let prompt = dialect.render(&request, &ctx.lexicon)?;

    tracing::debug!(domain = %name_ctx.domain, service = ctx.completion.name(), "Asking completion service");

    // Retries run here so every attempt waits for the rate limiter.
    let request = CompletionRequest::chat(prompt.system, prompt.user);
    let single_attempt = CompletionOptions {
        retries: 0,
        ..ctx.config.completion.clone()
    };
    let (request, single_attempt) = (&request, &single_attempt);
    let completion = with_paced_retries(
        &ctx.config.completion,
        move || ctx.limiter.acquire(),
        move |_| ctx.completion.complete(request, single_attempt),
    )
    .await?;
    tracing::debug!(tokens_used = ?completion.tokens_used, "Completion received");

    Ok(parse_reply(&completion.output)?)
}

/// Choose between the model's generated name and the local fallback.
fn select(
    reply: ModelReply,
    local: Judged,
    name_ctx: &NameContext,
    stream: &TokenStream,
    score_ctx: &ScoreContext,
    config: &PipelineConfig,
) -> Outcome {
    let lexicon = score_ctx.lexicon;
    let generated = reply.generated_name.trim().to_string();
    let gate = validate(&generated, score_ctx);
    let known = names_known_entity(&generated, lexicon) || lexicon.override_for(&name_ctx.domain).is_some();

    tracing::debug!(
        domain = %name_ctx.domain,
        %generated,
        generated_confidence = reply.generated_confidence,
        fallback_confidence = reply.fallback_confidence,
        ?gate,
        known,
        model_flags = ?reply.flags,
        "Model reply"
    );

    if reply.generated_confidence >= reply.fallback_confidence && gate.is_ok() && known {
        let breakdown = score(&generated, &[], score_ctx, &config.score);
        let mut flags = local.candidate.flags;
        push_flag(&mut flags, Flag::OpenAiMatch);
        if let Some(flag) = token_count_flag(&generated) {
            push_flag(&mut flags, flag);
        }
        return Outcome {
            confidence: breakdown.total.min(reply.generated_confidence),
            brand: brand_in(&generated, lexicon).or(local.candidate.brand),
            name: generated,
            flags,
            gate_passed: true,
        };
    }

    let mut outcome = local_fallback(local, name_ctx, stream, score_ctx);
    push_flag(&mut outcome.flags, Flag::FallbackMatch);
    if let Some(flag) = token_count_flag(&outcome.name) {
        push_flag(&mut outcome.flags, flag);
    }
    outcome
}

/// A usable local name, or else the deterministic fallback.
fn local_fallback(local: Judged, name_ctx: &NameContext, stream: &TokenStream, score_ctx: &ScoreContext) -> Outcome {
    if local.usable() {
        return local.into_outcome();
    }

    let fallback = deterministic_fallback(stream, name_ctx, score_ctx.lexicon);
    let name = fallback.name();
    let gate_passed = validate(&name, score_ctx).is_ok();

    // A caller-supplied name replaces the failed history entirely.
    let flags = if fallback.flags.contains(&Flag::FallbackNameUsed) {
        let mut flags = fallback.flags;
        if local.candidate.flags.contains(&Flag::CompletionFailed) {
            push_flag(&mut flags, Flag::CompletionFailed);
        }
        flags
    } else {
        let mut flags = local.candidate.flags;
        for flag in fallback.flags {
            push_flag(&mut flags, flag);
        }
        flags
    };

    Outcome {
        name,
        confidence: fallback.fixed_confidence.unwrap_or(0),
        flags,
        brand: fallback.brand.or(local.candidate.brand),
        gate_passed,
    }
}

fn token_count_flag(name: &str) -> Option<Flag> {
    match name.split_whitespace().count() {
        0 => None,
        1 => Some(Flag::SingleToken),
        _ => Some(Flag::MultiToken),
    }
}

fn brand_in(name: &str, lexicon: &Lexicon) -> Option<String> {
    let words: Vec<&str> = name.split_whitespace().collect();
    (1..=2)
        .rev()
        .flat_map(|len| words.windows(len))
        .find_map(|window| lexicon.canonical_brand(&window.join(" ")))
        .map(str::to_string)
}
