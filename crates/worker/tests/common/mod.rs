#![allow(dead_code)]

use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use vidgen_core::job::{JobRecord, JobStatus};
use vidgen_core::params::GenerationParams;
use vidgen_core::types::JobId;
use vidgen_worker::{
    GenerationError, GenerationOutput, GenerationRequest, Generator, JobQueue, ProgressReporter,
    QueueConfig,
};

/// How long helpers wait for the queue to reach an expected state.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Test generator driven by the prompt text.
///
/// Every job blocks until the test hands out a permit via [`release`].
/// Prompts select the behaviour:
///
/// - `fail...` returns a [`GenerationError`].
/// - `panic...` panics inside `execute`.
/// - `progress:<percent>:<message>` reports progress before blocking.
/// - anything else succeeds with the requested output path.
///
/// [`release`]: ScriptedGenerator::release
pub struct ScriptedGenerator {
    gate: Semaphore,
    active: AtomicUsize,
    peak: AtomicUsize,
    started: Mutex<Vec<String>>,
    init_delay: Duration,
    init_calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new() -> Arc<Self> {
        Self::with_init_delay(Duration::ZERO)
    }

    pub fn with_init_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            started: Mutex::new(Vec::new()),
            init_delay: delay,
            init_calls: AtomicUsize::new(0),
        })
    }

    /// Let `n` blocked or future jobs finish.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Highest number of simultaneously executing jobs seen.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Prompts in the order their jobs started executing.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn initialize(&self) -> Result<(), GenerationError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.init_delay).await;
        Ok(())
    }

    async fn execute(
        &self,
        request: GenerationRequest,
        progress: ProgressReporter,
    ) -> Result<GenerationOutput, GenerationError> {
        let prompt = request.params.prompt.clone();
        self.started.lock().unwrap().push(prompt.clone());
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_active, Ordering::SeqCst);

        if let Some(directive) = prompt.strip_prefix("progress:") {
            if let Some((percent, message)) = directive.split_once(':') {
                progress.report_text(percent.parse().unwrap(), message);
            }
        }

        self.gate.acquire().await.unwrap().forget();
        self.active.fetch_sub(1, Ordering::SeqCst);

        if prompt.starts_with("panic") {
            panic!("scripted panic");
        }
        if prompt.starts_with("fail") {
            return Err(GenerationError::Failed("scripted failure".into()));
        }
        Ok(GenerationOutput {
            path: request.output_path,
        })
    }
}

pub fn config(dir: &Path, max_concurrency: usize) -> QueueConfig {
    QueueConfig::new(dir).with_max_concurrency(max_concurrency)
}

pub fn params(prompt: &str) -> GenerationParams {
    GenerationParams::new(prompt)
}

/// Poll `check` until it yields a value or [`WAIT_TIMEOUT`] expires.
pub async fn eventually<T, F, Fut>(what: &str, mut check: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    loop {
        if let Some(value) = check().await {
            return value;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until `id` satisfies `pred` and return the matching snapshot.
pub async fn wait_for_job<P>(queue: &JobQueue, id: JobId, pred: P) -> JobRecord
where
    P: Fn(&JobRecord) -> bool,
{
    let pred = &pred;
    eventually("job state", || async move {
        let record = queue.get_status(id).await.unwrap();
        pred(&record).then_some(record)
    })
    .await
}

pub async fn wait_for_status(queue: &JobQueue, id: JobId, status: JobStatus) -> JobRecord {
    wait_for_job(queue, id, |r| r.status == status).await
}

/// Create `path` with the given age.
pub fn write_aged(path: &Path, age: Duration) {
    let file = std::fs::File::create(path).unwrap();
    file.set_len(8).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}
