//! Shared fixtures: a scripted in-process extractor and polling helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mdq_core::error::ExtractorError;
use mdq_core::extractor::{
    ExtractorAdapter, FormatInfo, MediaInfo, ProgressSink, RetrievalOutcome, RetrievalRequest,
};
use mdq_core::job::{JobId, JobRecord};
use mdq_core::Orchestrator;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// How a scripted retrieval ends after its progress steps.
#[derive(Debug, Clone)]
pub enum Ending {
    Succeed,
    Fail(String),
    Panic,
    /// Block until the test releases a permit, then succeed.
    WaitForRelease,
    /// Block until the job is cancelled.
    WaitForCancel,
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub steps: Vec<u8>,
    pub step_delay: Duration,
    pub ending: Ending,
    pub analyze_error: Option<String>,
    pub analyze_delay: Duration,
}

impl Plan {
    pub fn succeed(steps: &[u8]) -> Self {
        Self {
            steps: steps.to_vec(),
            step_delay: Duration::from_millis(5),
            ending: Ending::Succeed,
            analyze_error: None,
            analyze_delay: Duration::ZERO,
        }
    }

    /// Report every step back to back without yielding.
    pub fn burst(mut self) -> Self {
        self.step_delay = Duration::ZERO;
        self
    }

    pub fn analyze_delay(mut self, delay: Duration) -> Self {
        self.analyze_delay = delay;
        self
    }

    pub fn ending(mut self, ending: Ending) -> Self {
        self.ending = ending;
        self
    }

    pub fn analyze_error(mut self, message: &str) -> Self {
        self.analyze_error = Some(message.to_string());
        self
    }
}

/// In-process adapter whose behaviour is scripted per URL.
pub struct ScriptedAdapter {
    plans: Mutex<HashMap<String, Plan>>,
    default_plan: Plan,
    release: Semaphore,
    running: AtomicUsize,
    peak: AtomicUsize,
    analyze_calls: AtomicUsize,
    requests: Mutex<Vec<RetrievalRequest>>,
}

impl ScriptedAdapter {
    pub fn new(default_plan: Plan) -> Arc<Self> {
        Arc::new(Self {
            plans: Mutex::new(HashMap::new()),
            default_plan,
            release: Semaphore::new(0),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            analyze_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn plan(&self, url: &str, plan: Plan) {
        self.plans.lock().unwrap().insert(url.to_string(), plan);
    }

    /// Let `n` blocked `WaitForRelease` retrievals finish.
    pub fn release(&self, n: usize) {
        self.release.add_permits(n);
    }

    pub fn peak_running(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn analyze_calls(&self) -> usize {
        self.analyze_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RetrievalRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn plan_for(&self, url: &str) -> Plan {
        self.plans
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| self.default_plan.clone())
    }
}

struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ExtractorAdapter for ScriptedAdapter {
    async fn analyze(&self, url: &str) -> Result<MediaInfo, ExtractorError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        let plan = self.plan_for(url);
        if !plan.analyze_delay.is_zero() {
            tokio::time::sleep(plan.analyze_delay).await;
        }
        if let Some(message) = plan.analyze_error {
            return Err(ExtractorError::Rejected(message));
        }
        Ok(MediaInfo {
            title: format!("media at {url}"),
            duration: Some("3:45".to_string()),
            thumbnail: None,
            formats: vec![
                FormatInfo {
                    format_id: "18".into(),
                    container: "mp4".into(),
                    resolution_or_bitrate: Some("640x360".into()),
                    approx_size_bytes: Some(1_000),
                },
                FormatInfo {
                    format_id: "22".into(),
                    container: "mp4".into(),
                    resolution_or_bitrate: Some("1280x720".into()),
                    approx_size_bytes: Some(5_000),
                },
                FormatInfo {
                    format_id: "140".into(),
                    container: "m4a".into(),
                    resolution_or_bitrate: Some("128kbps".into()),
                    approx_size_bytes: Some(800),
                },
            ],
        })
    }

    async fn retrieve(
        &self,
        request: &RetrievalRequest,
        sink: ProgressSink,
        cancel: CancellationToken,
    ) -> RetrievalOutcome {
        self.requests.lock().unwrap().push(request.clone());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _running = RunningGuard(&self.running);

        let plan = self.plan_for(&request.url);
        for step in plan.steps {
            if cancel.is_cancelled() {
                return RetrievalOutcome::Cancelled;
            }
            sink.report(step);
            if plan.step_delay.is_zero() {
                continue;
            }
            tokio::select! {
                _ = cancel.cancelled() => return RetrievalOutcome::Cancelled,
                _ = tokio::time::sleep(plan.step_delay) => {}
            }
        }

        match plan.ending {
            Ending::Succeed => RetrievalOutcome::Success,
            Ending::Fail(message) => RetrievalOutcome::Failure(message),
            Ending::Panic => panic!("scripted extractor panic"),
            Ending::WaitForRelease => {
                tokio::select! {
                    _ = cancel.cancelled() => RetrievalOutcome::Cancelled,
                    permit = self.release.acquire() => {
                        if let Ok(permit) = permit {
                            permit.forget();
                        }
                        RetrievalOutcome::Success
                    }
                }
            }
            Ending::WaitForCancel => {
                cancel.cancelled().await;
                RetrievalOutcome::Cancelled
            }
        }
    }
}

pub fn start(adapter: &Arc<ScriptedAdapter>, max_concurrent: usize) -> Orchestrator {
    let adapter: Arc<dyn ExtractorAdapter> = adapter.clone();
    Orchestrator::start(max_concurrent, 64, adapter)
}

/// Poll `id` until `pred` holds, panicking after a few seconds.
pub async fn wait_for<F>(orch: &Orchestrator, id: &JobId, pred: F) -> JobRecord
where
    F: Fn(&JobRecord) -> bool,
{
    for _ in 0..500 {
        let record = orch.status(id).expect("job exists");
        if pred(&record) {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting on {id}: {:?}", orch.status(id));
}

pub async fn wait_terminal(orch: &Orchestrator, id: &JobId) -> JobRecord {
    wait_for(orch, id, |r| r.is_terminal()).await
}

/// Poll the orchestrator until `pred` holds for its state counts.
pub async fn wait_until<F>(orch: &Orchestrator, pred: F)
where
    F: Fn(&Orchestrator) -> bool,
{
    for _ in 0..500 {
        if pred(orch) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out: counts {:?}", orch.counts());
}
