//! Batch orchestration.

use dealername_completion::CompletionService;
use dealername_model::{BatchResponse, Lead, NameResult};
use futures::stream::{self, StreamExt};
use tokio::time::Instant;

use crate::{process_record, NameCache, ProcessingContext};

/// Name every record, at most `concurrency` at a time, in input order.
///
/// With a deadline, records still running when it passes are dropped and
/// records not yet started are skipped; the response is then `partial`.
/// Rejected records, including leads that did not parse as records, stay in
/// the output at their position with their error.
pub async fn process_batch<S, C>(ctx: &ProcessingContext<S, C>, leads: &[Lead]) -> BatchResponse
where
    S: CompletionService,
    C: NameCache,
{
    let started = Instant::now();
    let deadline = ctx.config.batch_deadline.map(|budget| started + budget);

    let outcomes: Vec<Option<NameResult>> = stream::iter(leads)
        .map(|lead| async move {
            let record = match lead.record() {
                Ok(record) => record,
                Err(rejected) => return Some(rejected),
            };
            match deadline {
                None => Some(process_record(ctx, record).await),
                Some(deadline) if Instant::now() >= deadline => None,
                Some(deadline) => tokio::time::timeout_at(deadline, process_record(ctx, record))
                    .await
                    .ok(),
            }
        })
        .buffered(ctx.config.concurrency.max(1))
        .collect()
        .await;

    let partial = outcomes.iter().any(Option::is_none);
    let results: Vec<NameResult> = outcomes.into_iter().flatten().collect();
    let manual_review_queue: Vec<NameResult> = results.iter().filter(|r| r.needs_review()).cloned().collect();

    tracing::info!(
        records = leads.len(),
        completed = results.len(),
        review = manual_review_queue.len(),
        partial,
        elapsed = ?started.elapsed(),
        "Batch complete"
    );

    BatchResponse {
        results,
        manual_review_queue,
        partial,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryCache, PipelineConfig};
    use dealername_completion::{Completion, CompletionError, CompletionOptions, CompletionRequest, NoCompletion};
    use dealername_lexicon::Lexicon;
    use dealername_model::{Flag, InputRecord, RecordId};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    /// Fails with `Unavailable` after a fixed delay.
    struct SlowCompletion {
        delay: Duration,
    }

    impl CompletionService for SlowCompletion {
        async fn complete(
            &self,
            _request: &CompletionRequest,
            _options: &CompletionOptions,
        ) -> Result<Completion, CompletionError> {
            tokio::time::sleep(self.delay).await;
            Err(CompletionError::Unavailable)
        }

        async fn health_check(&self) -> Result<(), CompletionError> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    fn context<S>(completion: S, config: PipelineConfig) -> ProcessingContext<S, MemoryCache> {
        ProcessingContext::new(Arc::new(Lexicon::builtin().unwrap()), completion, MemoryCache::new(), config)
    }

    fn leads(records: Vec<InputRecord>) -> Vec<Lead> {
        records.into_iter().map(Lead::from).collect()
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_keeps_rejects() {
        let ctx = context(NoCompletion, PipelineConfig::default());
        let records = vec![
            InputRecord::new("napleshonda.com").with_row_num(1),
            InputRecord::new("").with_row_num(2),
            InputRecord::new("graingernissan.com").with_row_num(3),
        ];
        let response = process_batch(&ctx, &leads(records)).await;

        assert!(!response.partial);
        assert_eq!(response.results.len(), 3);
        let rows: Vec<_> = response.results.iter().map(|r| r.row_num.clone()).collect();
        assert_eq!(
            rows,
            vec![Some(RecordId::Number(1)), Some(RecordId::Number(2)), Some(RecordId::Number(3))]
        );
        assert_eq!(response.results[1].name, "");
        assert!(response.results[1].has_flag(Flag::MissingDomain));
        assert_eq!(response.manual_review_queue.len(), 1);
    }

    #[tokio::test]
    async fn test_non_ascii_domain_does_not_abort_batch() {
        let ctx = context(NoCompletion, PipelineConfig::default());
        let records = vec![
            InputRecord::new("napleshonda.com").with_row_num(1),
            InputRecord::new("josé-ford.com").with_row_num(2),
            InputRecord::new("graingernissan.com").with_row_num(3),
        ];
        let response = process_batch(&ctx, &leads(records)).await;

        assert!(!response.partial);
        assert_eq!(response.results.len(), 3);
        assert_eq!(response.results[0].name, "Naples Honda");
        assert_eq!(response.results[1].domain, "josé-ford.com");
        assert_eq!(response.results[1].row_num, Some(RecordId::Number(2)));
        assert_eq!(response.results[2].name, "Grainger");
    }

    #[tokio::test]
    async fn test_unparseable_leads_are_rejected_in_place() {
        let ctx = context(NoCompletion, PipelineConfig::default());
        let batch = vec![
            Lead::from(InputRecord::new("napleshonda.com")),
            Lead::Invalid(serde_json::json!({ "domain": null, "rowNum": 2 })),
            Lead::Invalid(serde_json::json!({ "domain": 123, "rowNum": 3 })),
            Lead::from(InputRecord::new("graingernissan.com")),
        ];
        let response = process_batch(&ctx, &batch).await;

        assert_eq!(response.results.len(), 4);
        assert_eq!(response.results[0].name, "Naples Honda");
        assert!(response.results[1].has_flag(Flag::MissingDomain));
        assert_eq!(response.results[1].row_num, Some(RecordId::Number(2)));
        assert!(response.results[2].error.as_deref().unwrap().starts_with("Malformed input"));
        assert_eq!(response.results[3].name, "Grainger");
        assert_eq!(response.manual_review_queue.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let ctx = context(NoCompletion, PipelineConfig::default());
        let response = process_batch(&ctx, &[]).await;
        assert!(response.results.is_empty());
        assert!(!response.partial);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_returns_partial() {
        let config = PipelineConfig {
            batch_deadline: Some(Duration::from_secs(5)),
            concurrency: 1,
            ..Default::default()
        };
        let ctx = context(SlowCompletion { delay: Duration::from_secs(10) }, config);
        let records = vec![
            InputRecord::new("napleshonda.com"),
            InputRecord::new("zorb.com"),
            InputRecord::new("quix.com"),
        ];
        let response = process_batch(&ctx, &leads(records)).await;

        assert!(response.partial);
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].name, "Naples Honda");
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_calls_are_spaced() {
        let config = PipelineConfig {
            min_completion_interval: Duration::from_secs(3),
            ..Default::default()
        };
        let ctx = context(SlowCompletion { delay: Duration::ZERO }, config);
        let records = vec![InputRecord::new("zorb.com"), InputRecord::new("quix.com")];

        let start = Instant::now();
        let response = process_batch(&ctx, &leads(records)).await;

        assert_eq!(response.results.len(), 2);
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(response.results.iter().all(|r| r.has_flag(Flag::CompletionFailed)));
    }
}
