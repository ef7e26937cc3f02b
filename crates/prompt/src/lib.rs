//! Prompt construction for the completion fallback.
//!
//! Renders a record into a chat prompt that embeds:
//! - The brand list and generic words from the lexicon
//! - Curated override examples, preferring ones that share a token with the domain
//! - A fixed set of rejected answers with the reason each one fails
//! - The scoring table used to judge local names
//!
//! and parses the strict JSON reply the model is asked for.

mod reply;

pub use reply::{parse_reply, ModelReply, ReplyError};

use dealername_lexicon::{compact, Lexicon};
use dealername_model::NameContext;
use dealername_score::{rule_table, ScoreConfig};
use thiserror::Error;

/// Default number of override examples embedded in a prompt.
pub const DEFAULT_MAX_EXAMPLES: usize = 10;

/// Shortest token used to match examples against the domain.
const MIN_EXAMPLE_TOKEN_LEN: usize = 3;

/// Answers the model must not give: domain, wrong name, reason.
pub const NEGATIVE_EXAMPLES: [(&str, &str, &str); 5] = [
    ("naples-cars.com", "Naples", "a bare city"),
    ("kia.com", "Kia", "a bare brand"),
    ("jimbutlermaserati.com", "Jimbutlermaserati", "the domain left unsplit"),
    ("autosales.com", "Auto Sales", "only generic words"),
    ("bobjohnsonchevy.com", "Bob Johnson Chevrolet Motors Inc", "too long, keeps filler"),
];

const SYSTEM_MESSAGE: &str = "You turn car dealership domain names into the short, natural name \
a salesperson would use in an email. Reply with a single JSON object and no other text.";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Empty domain")]
    EmptyDomain,
}

/// Everything known about the record being named.
#[derive(Debug, Clone, Copy)]
pub struct PromptRequest<'a> {
    pub context: &'a NameContext,
    /// Tokens the domain was split into
    pub tokens: &'a [String],
    /// Best name the local rules produced, if any
    pub local_name: Option<&'a str>,
}

impl<'a> PromptRequest<'a> {
    pub fn new(context: &'a NameContext, tokens: &'a [String]) -> Self {
        Self {
            context,
            tokens,
            local_name: None,
        }
    }

    pub fn with_local_name(mut self, name: &'a str) -> Self {
        if !name.trim().is_empty() {
            self.local_name = Some(name);
        }
        self
    }
}

/// A rendered prompt ready for a chat-style completion API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
}

/// Trait for rendering a request into a backend-specific prompt.
pub trait PromptDialect {
    /// The output type (a chat message pair, a single string, ...)
    type Output;

    /// Render a request against the given lexicon
    fn render(&self, request: &PromptRequest, lexicon: &Lexicon) -> Result<Self::Output, PromptError>;
}

/// System + user message dialect for chat completion endpoints.
#[derive(Debug, Clone)]
pub struct ChatDialect {
    pub max_examples: usize,
    pub score_config: ScoreConfig,
}

impl Default for ChatDialect {
    fn default() -> Self {
        Self {
            max_examples: DEFAULT_MAX_EXAMPLES,
            score_config: ScoreConfig::default(),
        }
    }
}

impl PromptDialect for ChatDialect {
    type Output = ChatPrompt;

    fn render(&self, request: &PromptRequest, lexicon: &Lexicon) -> Result<ChatPrompt, PromptError> {
        let domain = request.context.domain.trim();
        if domain.is_empty() {
            return Err(PromptError::EmptyDomain);
        }

        let mut user = String::new();

        user.push_str("Rules:\n");
        user.push_str("- 1 to 3 capitalized words, letters, spaces and hyphens only.\n");
        user.push_str("- Keep the owner or family name when there is one; drop filler such as Motors or Auto Sales.\n");
        user.push_str("- A bare city or a bare brand is never a name on its own.\n");
        user.push_str("- City and brand hints may be wrong; use them only if the domain agrees.\n\n");

        user.push_str("Known brands: ");
        user.push_str(&lexicon.canonical_brands().join(", "));
        user.push_str("\n\nGeneric words to drop: ");
        user.push_str(&lexicon.generic_words().join(", "));
        user.push_str("\n\n");

        user.push_str("Scoring (start from the base, add every rule that applies):\n");
        for (description, points) in rule_table(&self.score_config) {
            user.push_str(&format!("- {description}: {points:+}\n"));
        }
        user.push('\n');

        user.push_str("Examples:\n");
        for (example_domain, name) in select_examples(lexicon, request.tokens, self.max_examples) {
            user.push_str(&format!("{example_domain} -> {name}\n"));
        }
        user.push('\n');

        user.push_str("Rejected answers:\n");
        for (example_domain, wrong, reason) in NEGATIVE_EXAMPLES {
            user.push_str(&format!("{example_domain} -> {wrong} (wrong: {reason})\n"));
        }
        user.push('\n');

        user.push_str(&format!("Domain: {domain}\n"));
        if !request.tokens.is_empty() {
            user.push_str(&format!("Tokens: {}\n", request.tokens.join(" ")));
        }
        if let Some(city) = &request.context.city {
            user.push_str(&format!("City hint: {city}\n"));
        }
        if let Some(brand) = &request.context.brand {
            user.push_str(&format!("Brand hint: {brand}\n"));
        }
        if let Some(name) = &request.context.fallback_name {
            user.push_str(&format!("Listed name: {name}\n"));
        }
        if let Some(local) = request.local_name {
            user.push_str(&format!("Local guess: {local}\n"));
        }

        user.push_str(
            "\nRespond with exactly this JSON shape:\n\
             {\"generated_name\": string, \"generated_confidence\": 0-100, \
             \"generated_reasoning\": string, \"fallback_confidence\": 0-100, \
             \"fallback_reasoning\": string, \"flags\": [string]}\n",
        );

        Ok(ChatPrompt {
            system: SYSTEM_MESSAGE.to_string(),
            user,
        })
    }
}

/// Pick up to `limit` override examples, those sharing a token with the
/// domain first, then the rest in domain order.
pub fn select_examples<'a>(lexicon: &'a Lexicon, tokens: &[String], limit: usize) -> Vec<(&'a str, &'a str)> {
    let keys: Vec<String> = tokens
        .iter()
        .map(|t| compact(t))
        .filter(|t| t.len() >= MIN_EXAMPLE_TOKEN_LEN)
        .collect();
    let shares_token = |domain: &str| {
        let domain = compact(domain);
        keys.iter().any(|k| domain.contains(k.as_str()))
    };

    let (related, others): (Vec<_>, Vec<_>) = lexicon.overrides().partition(|(d, _)| shares_token(*d));
    related.into_iter().chain(others).take(limit).collect()
}
