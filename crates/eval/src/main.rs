//! Command-line driver for dealer name humanization.
//!
//! Usage:
//!     eval name napleshonda.com --city Naples
//!     eval batch --input leads.json --deadline-secs 30
//!     eval benchmark --test-file cases.yaml
//!     eval lexicon
//!     eval health

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dealername_completion::{
    Completion, CompletionError, CompletionOptions, CompletionRequest, CompletionService, NoCompletion, OpenAiBackend,
    OpenAiConfig,
};
use dealername_explain::{explain_result, summarize_result};
use dealername_lexicon::Lexicon;
use dealername_model::{BatchRequest, InputRecord, Lead, NameResult};
use dealername_pipeline::{process_batch, process_record, MemoryCache, PipelineConfig, ProcessingContext};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "eval")]
#[command(about = "Turn dealership domains into human-readable names")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Lexicon JSON file (defaults to the bundled one)
    #[arg(long, global = true)]
    lexicon: Option<PathBuf>,

    /// Never call the completion service
    #[arg(long, global = true)]
    no_llm: bool,

    /// OpenAI-compatible base URL
    #[arg(long, global = true, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    openai_url: String,

    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Chat model name
    #[arg(long, global = true, default_value = "gpt-4o-mini")]
    model: String,

    /// Records processed at once in a batch
    #[arg(long, global = true, default_value = "5")]
    concurrency: usize,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Name a single domain
    Name {
        domain: String,

        #[arg(long)]
        city: Option<String>,

        #[arg(long)]
        brand: Option<String>,

        /// Caller-supplied name used by the last-resort fallback
        #[arg(long)]
        fallback_name: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Name every lead in a JSON file (`{"leads": [...]}` or a bare array)
    Batch {
        #[arg(short, long)]
        input: PathBuf,

        /// Stop after this many seconds and return what is done
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run benchmark against test file
    Benchmark {
        /// Path to test YAML file
        #[arg(short, long)]
        test_file: PathBuf,
    },

    /// Show lexicon entry counts
    Lexicon,

    /// Check completion service health
    Health,
}

/// The completion service picked at startup.
enum Backend {
    OpenAi(OpenAiBackend),
    Offline(NoCompletion),
}

impl CompletionService for Backend {
    async fn complete(
        &self,
        request: &CompletionRequest,
        options: &CompletionOptions,
    ) -> Result<Completion, CompletionError> {
        match self {
            Self::OpenAi(backend) => backend.complete(request, options).await,
            Self::Offline(backend) => backend.complete(request, options).await,
        }
    }

    async fn health_check(&self) -> Result<(), CompletionError> {
        match self {
            Self::OpenAi(backend) => backend.health_check().await,
            Self::Offline(backend) => backend.health_check().await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::OpenAi(backend) => backend.name(),
            Self::Offline(backend) => backend.name(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BenchmarkFile {
    cases: Vec<BenchmarkCase>,
}

#[derive(Debug, Deserialize)]
struct BenchmarkCase {
    domain: String,
    expected: String,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    brand: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BatchInput {
    Envelope(BatchRequest),
    Records(Vec<Lead>),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let directive = if cli.verbose { "dealername=debug" } else { "dealername=info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let lexicon = match &cli.lexicon {
        Some(path) => Lexicon::from_path(path).with_context(|| format!("Failed to load lexicon {}", path.display()))?,
        None => Lexicon::builtin().context("Failed to load bundled lexicon")?,
    };

    let backend = if cli.no_llm {
        Backend::Offline(NoCompletion)
    } else {
        let config = OpenAiConfig {
            base_url: cli.openai_url.clone(),
            api_key: cli.api_key.clone(),
            ..Default::default()
        };
        Backend::OpenAi(OpenAiBackend::new(config).context("Failed to build completion client")?)
    };

    tracing::debug!(backend = backend.name(), "Completion service selected");

    let mut config = PipelineConfig {
        concurrency: cli.concurrency,
        use_completion: !cli.no_llm,
        ..Default::default()
    };
    config.completion.model = cli.model.clone();

    match cli.command {
        Commands::Name {
            domain,
            city,
            brand,
            fallback_name,
            format,
        } => {
            let mut record = InputRecord::new(domain);
            record.city = city;
            record.brand = brand;
            record.fallback_name = fallback_name;
            let ctx = ProcessingContext::new(Arc::new(lexicon), backend, MemoryCache::new(), config);
            run_name(&ctx, &record, &format).await?;
        }
        Commands::Batch {
            input,
            deadline_secs,
            format,
        } => {
            config.batch_deadline = deadline_secs.map(Duration::from_secs);
            let ctx = ProcessingContext::new(Arc::new(lexicon), backend, MemoryCache::new(), config);
            run_batch(&ctx, &input, &format).await?;
        }
        Commands::Benchmark { test_file } => {
            let ctx = ProcessingContext::new(Arc::new(lexicon), backend, MemoryCache::new(), config);
            run_benchmark(&ctx, &test_file).await?;
        }
        Commands::Lexicon => {
            run_lexicon(&lexicon);
        }
        Commands::Health => {
            run_health(&backend).await?;
        }
    }

    Ok(())
}

type Pipeline = ProcessingContext<Backend, MemoryCache>;

async fn run_name(ctx: &Pipeline, record: &InputRecord, format: &str) -> Result<()> {
    let result = process_record(ctx, record).await;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Domain: {}", record.domain);
    println!("---");
    print_result(&result);
    for explanation in explain_result(&result) {
        println!("   - {}: {}", explanation.summary, explanation.detail);
    }

    Ok(())
}

async fn run_batch(ctx: &Pipeline, input: &Path, format: &str) -> Result<()> {
    let raw = std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let leads = match serde_json::from_str(&raw).with_context(|| format!("Invalid batch file {}", input.display()))? {
        BatchInput::Envelope(request) => request.leads,
        BatchInput::Records(leads) => leads,
    };

    let response = process_batch(ctx, &leads).await;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    for (i, result) in response.results.iter().enumerate() {
        print!("\n{}. {} ", i + 1, result.domain);
        print_result(result);
    }

    println!("\n---");
    println!(
        "Total: {} of {} records named, {} for review{}",
        response.results.len(),
        leads.len(),
        response.manual_review_queue.len(),
        if response.partial { " (deadline reached)" } else { "" }
    );

    Ok(())
}

fn print_result(result: &NameResult) {
    println!("{}", summarize_result(result));
    println!("   Confidence: {} | Brand: {}", result.confidence, or_dash(&result.brand));
    if !result.flags.is_empty() {
        println!(
            "   Flags: {:?}",
            result.flags.iter().map(|f| f.label()).collect::<Vec<_>>()
        );
    }
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

async fn run_benchmark(ctx: &Pipeline, test_file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(test_file).with_context(|| format!("Failed to read {}", test_file.display()))?;
    let file: BenchmarkFile =
        serde_yaml::from_str(&raw).with_context(|| format!("Invalid benchmark file {}", test_file.display()))?;

    if file.cases.is_empty() {
        println!("No cases in {}", test_file.display());
        return Ok(());
    }

    let mut correct = 0usize;
    let mut total_confidence = 0u64;

    for case in &file.cases {
        let mut record = InputRecord::new(&case.domain);
        record.city = case.city.clone();
        record.brand = case.brand.clone();

        let result = process_record(ctx, &record).await;
        let hit = result.name.eq_ignore_ascii_case(case.expected.trim());
        if hit {
            correct += 1;
        }
        total_confidence += u64::from(result.confidence);

        println!(
            "{} {:<32} expected {:<24} got {:<24} ({})",
            if hit { "PASS" } else { "FAIL" },
            case.domain,
            case.expected,
            or_dash(&result.name),
            result.confidence
        );
    }

    let cases = file.cases.len();
    println!("\n---");
    println!(
        "Accuracy: {}/{} ({:.1}%)",
        correct,
        cases,
        100.0 * correct as f64 / cases as f64
    );
    println!("Mean confidence: {:.1}", total_confidence as f64 / cases as f64);

    Ok(())
}

fn run_lexicon(lexicon: &Lexicon) {
    let stats = lexicon.stats();
    println!("Brands:           {}", stats.brands);
    println!("Brand aliases:    {}", stats.aliases);
    println!("Cities:           {}", stats.cities);
    println!("Proper nouns:     {}", stats.proper_nouns);
    println!("First names:      {}", stats.first_names);
    println!("Last names:       {}", stats.last_names);
    println!("Generic words:    {}", stats.generic_words);
    println!("Overrides:        {}", stats.overrides);
    println!("Franchise groups: {}", stats.franchise_groups);
}

async fn run_health(backend: &Backend) -> Result<()> {
    print!("Checking {} completion service... ", backend.name());

    match backend.health_check().await {
        Ok(()) => {
            println!("OK");
            Ok(())
        }
        Err(e) => {
            println!("FAILED: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_benchmark_file_parses() {
        let raw = r#"
cases:
  - domain: napleshonda.com
    expected: Naples Honda
  - domain: kia.com
    expected: Naples Kia
    city: Naples
"#;
        let file: BenchmarkFile = serde_yaml::from_str(raw).unwrap();
        assert_eq!(file.cases.len(), 2);
        assert_eq!(file.cases[1].city.as_deref(), Some("Naples"));
        assert_eq!(file.cases[0].brand, None);
    }

    #[test]
    fn test_batch_input_accepts_both_shapes() {
        let envelope: BatchInput = serde_json::from_str(r#"{"leads":[{"domain":"a.com"}]}"#).unwrap();
        assert!(matches!(envelope, BatchInput::Envelope(ref r) if r.leads.len() == 1));

        let bare: BatchInput = serde_json::from_str(r#"[{"domain":"a.com"},{"domain":"b.com"}]"#).unwrap();
        assert!(matches!(bare, BatchInput::Records(ref r) if r.len() == 2));
    }

    #[test]
    fn test_cli_parses_name_command() {
        let cli = Cli::try_parse_from(["eval", "--no-llm", "name", "napleshonda.com", "--city", "Naples"]).unwrap();
        assert!(cli.no_llm);
        assert!(matches!(cli.command, Commands::Name { ref domain, .. } if domain == "napleshonda.com"));
    }
}
