//! Chunked submission of upsert records under bounded concurrency.
//!
//! A pass worth of records is partitioned into `ceil(N / batch_size)` chunks.
//! Chunks run concurrently, capped by a semaphore at `max_in_flight` calls.
//! Each chunk call is bounded by a timeout and retried on transient errors;
//! once retries are exhausted the chunk's error fans out into a failure
//! outcome for every record in it. Results are reassembled in submission
//! order, so callers can zip outcomes against the records they submitted no
//! matter which chunk finished first.

use crate::error::{ConnectorError, ConnectorResult};
use crate::types::{RecordOutcome, UpsertRecord};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;

/// Retry behavior for transient chunk failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt, transient errors only.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling on the backoff delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

/// Submission policy for one pass worth of records.
#[derive(Debug, Clone)]
pub struct BatchPolicy {
    /// Records per chunk call.
    pub batch_size: usize,
    /// Chunk calls allowed in flight at once.
    pub max_in_flight: usize,
    /// Time budget for a single chunk attempt.
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: 500,
            max_in_flight: 4,
            call_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Submit `records` in chunks via `submit`, returning one outcome per record
/// in submission order.
///
/// A chunk-level fault (timeout, exhausted retries, lost task) becomes a
/// failure outcome for every record in that chunk and never aborts the
/// remaining chunks.
pub async fn run_chunked<F, Fut>(
    policy: &BatchPolicy,
    records: Vec<UpsertRecord>,
    submit: F,
) -> Vec<RecordOutcome>
where
    F: Fn(Vec<UpsertRecord>) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = ConnectorResult<Vec<RecordOutcome>>> + Send + 'static,
{
    if records.is_empty() {
        return Vec::new();
    }

    let batch_size = policy.batch_size.max(1);
    let semaphore = Arc::new(Semaphore::new(policy.max_in_flight.max(1)));
    let mut handles = Vec::new();

    for chunk in records.chunks(batch_size) {
        let chunk = chunk.to_vec();
        let chunk_len = chunk.len();
        let semaphore = Arc::clone(&semaphore);
        let submit = submit.clone();
        let policy = policy.clone();

        let handle = tokio::spawn(async move {
            // Hold the permit until the chunk call completes.
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return chunk_failures(chunk_len, "submission pool closed"),
            };
            submit_chunk(&policy, chunk, submit).await
        });
        handles.push((chunk_len, handle));
    }

    let mut outcomes = Vec::with_capacity(records.len());
    for (chunk_len, handle) in handles {
        match handle.await {
            Ok(chunk_outcomes) => outcomes.extend(chunk_outcomes),
            Err(join_error) => {
                tracing::error!(error = %join_error, "chunk task lost");
                outcomes.extend(chunk_failures(chunk_len, "chunk task lost"));
            }
        }
    }
    outcomes
}

/// One chunk: timeout per attempt, transient errors retried with backoff.
async fn submit_chunk<F, Fut>(
    policy: &BatchPolicy,
    chunk: Vec<UpsertRecord>,
    submit: F,
) -> Vec<RecordOutcome>
where
    F: Fn(Vec<UpsertRecord>) -> Fut,
    Fut: Future<Output = ConnectorResult<Vec<RecordOutcome>>>,
{
    let chunk_len = chunk.len();
    let mut delay = policy.retry.initial_delay;
    let mut attempt: u32 = 0;

    loop {
        let result = match timeout(policy.call_timeout, submit(chunk.clone())).await {
            Ok(result) => result,
            Err(_) => Err(ConnectorError::timeout(policy.call_timeout)),
        };

        match result {
            Ok(outcomes) => return align_outcomes(outcomes, chunk_len),
            Err(error) if error.is_transient() && attempt < policy.retry.max_retries => {
                attempt += 1;
                tracing::warn!(
                    error = %error,
                    attempt,
                    max_retries = policy.retry.max_retries,
                    "transient chunk failure, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = next_delay(&policy.retry, delay);
            }
            Err(error) => {
                tracing::warn!(
                    error = %error,
                    code = error.error_code(),
                    chunk_len,
                    "chunk failed, recording per-record failures"
                );
                return chunk_failures(chunk_len, &error.to_string());
            }
        }
    }
}

fn next_delay(retry: &RetryPolicy, current: Duration) -> Duration {
    let scaled = current.as_millis() as f64 * retry.backoff_multiplier;
    Duration::from_millis(scaled as u64).min(retry.max_delay)
}

/// Force the outcome list to line up with the chunk it answers. Missing
/// entries become failures; excess entries are dropped.
fn align_outcomes(mut outcomes: Vec<RecordOutcome>, expected: usize) -> Vec<RecordOutcome> {
    if outcomes.len() > expected {
        tracing::warn!(
            got = outcomes.len(),
            expected,
            "service returned extra outcomes, truncating"
        );
        outcomes.truncate(expected);
    }
    while outcomes.len() < expected {
        outcomes.push(RecordOutcome::failure("no outcome returned for record"));
    }
    outcomes
}

fn chunk_failures(len: usize, reason: &str) -> Vec<RecordOutcome> {
    vec![RecordOutcome::failure(reason); len]
}
