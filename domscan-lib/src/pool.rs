//! Bounded worker pool for concurrent WHOIS lookups.
//!
//! All requests are queued up front and drained by a fixed set of worker tasks.
//! Each worker performs the round-trip, classifies the response and publishes a
//! `LookupRecord` into a bounded channel. A supervisor task owns the worker set
//! and closes the channel once every worker has exited, so the `LookupStream`
//! ends exactly once and only after all records were delivered.

use crate::classifier::Classifier;
use crate::error::LookupError;
use crate::protocols::WhoisQuery;
use crate::types::{LookupRecord, LookupRequest};
use futures::{FutureExt, Stream};
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Completed lookup records, delivered in completion order.
///
/// The stream is finite and cannot be restarted. It must be drained: workers
/// wait for room in the channel before publishing the next record.
#[derive(Debug)]
pub struct LookupStream {
    receiver: mpsc::Receiver<LookupRecord>,
    expected: usize,
}

impl LookupStream {
    fn new(receiver: mpsc::Receiver<LookupRecord>, expected: usize) -> Self {
        Self { receiver, expected }
    }

    /// Receive the next record, `None` once every worker has finished.
    pub async fn recv(&mut self) -> Option<LookupRecord> {
        self.receiver.recv().await
    }

    /// Number of records this stream will yield in total.
    pub fn expected(&self) -> usize {
        self.expected
    }
}

impl Stream for LookupStream {
    type Item = LookupRecord;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.expected))
    }
}

type WorkQueue = Arc<Mutex<VecDeque<LookupRequest>>>;

/// Everything a worker needs, shared across the pool.
#[derive(Clone)]
struct WorkerContext {
    queue: WorkQueue,
    client: Arc<dyn WhoisQuery>,
    classifier: Arc<Classifier>,
    cancel: CancellationToken,
    sink: mpsc::Sender<LookupRecord>,
}

/// Fan `requests` out over `parallelism` workers.
///
/// Must be called from within a tokio runtime. A parallelism of zero is raised
/// to one. An empty request list yields an already closed stream.
pub(crate) fn spawn_pool(
    client: Arc<dyn WhoisQuery>,
    classifier: Arc<Classifier>,
    cancel: Option<CancellationToken>,
    requests: Vec<LookupRequest>,
    parallelism: usize,
    channel_capacity: Option<usize>,
) -> LookupStream {
    let total = requests.len();
    let parallelism = parallelism.max(1);
    let capacity = channel_capacity.unwrap_or(parallelism).max(1);
    let (sender, receiver) = mpsc::channel(capacity);

    if total == 0 {
        debug!("No lookup requests, closing stream immediately");
        return LookupStream::new(receiver, 0);
    }

    let context = WorkerContext {
        queue: Arc::new(Mutex::new(VecDeque::from(requests))),
        client,
        classifier,
        cancel: cancel.unwrap_or_default(),
        sink: sender,
    };
    // Workers beyond the number of requests would exit without doing anything
    let workers = parallelism.min(total);

    debug!(total, workers, capacity, "Starting lookup pool");

    tokio::spawn(supervise(context, workers, total));

    LookupStream::new(receiver, total)
}

/// Spawn the workers, wait for all of them, then close the result channel.
async fn supervise(context: WorkerContext, workers: usize, total: usize) {
    let mut set = JoinSet::new();
    for id in 0..workers {
        set.spawn(run_worker(id, context.clone()));
    }

    let mut published = 0usize;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(count) => published += count,
            Err(e) => warn!(error = %e, "Lookup worker terminated abnormally"),
        }
    }

    // Last sender: dropping it closes the stream
    drop(context);
    info!(total, published, "All lookup workers finished");
}

fn next_request(queue: &WorkQueue) -> Option<LookupRequest> {
    match queue.lock() {
        Ok(mut queue) => queue.pop_front(),
        Err(poisoned) => poisoned.into_inner().pop_front(),
    }
}

/// Pull requests until the queue is empty. Returns the number of records published.
async fn run_worker(id: usize, context: WorkerContext) -> usize {
    let mut published = 0;

    while let Some(request) = next_request(&context.queue) {
        let name = request.name().to_string();
        let record = match AssertUnwindSafe(process(request, &context)).catch_unwind().await {
            Ok(record) => record,
            Err(_) => {
                warn!(worker = id, domain = %name, "Lookup panicked");
                LookupRecord::failure(
                    name,
                    LookupError::internal("lookup panicked"),
                    Default::default(),
                )
            }
        };

        if context.sink.send(record).await.is_err() {
            debug!(worker = id, "Result stream dropped, worker stopping");
            break;
        }
        published += 1;
    }

    debug!(worker = id, published, "Lookup worker exiting");
    published
}

/// Round-trip, classify and wrap one request, strictly in that order.
async fn process(request: LookupRequest, context: &WorkerContext) -> LookupRecord {
    let name = request.into_name();
    let start = Instant::now();

    if context.cancel.is_cancelled() {
        return LookupRecord::failure(name.clone(), LookupError::cancelled(name), start.elapsed());
    }

    let outcome = tokio::select! {
        biased;
        _ = context.cancel.cancelled() => Err(LookupError::cancelled(name.as_str())),
        result = context.client.query(&name) => result,
    };
    let elapsed = start.elapsed();

    match outcome {
        Ok(response) => {
            let available = context.classifier.classify(&name, &response);
            debug!(domain = %name, available, ?elapsed, "Lookup completed");
            LookupRecord::success(name, response, available, elapsed)
        }
        Err(error) => {
            debug!(domain = %name, error = %error, "Lookup failed");
            LookupRecord::failure(name, error, elapsed)
        }
    }
}
