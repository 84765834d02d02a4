//! Story runner: install interceptions, mount, play, then compare a capture
//! against the stored baseline.

use std::sync::Arc;
use std::time::Duration;

use load_waiter::LoadReport;
use network_intercept::{
    Fetcher, InterceptError, InterceptGuard, InterceptLayer, InterceptSnapshot, OfflineTransport,
    Transport,
};
use serde::Serialize;
use storygate_core_types::StoryId;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use visual_snapshot::{SnapshotOutcome, SnapshotStore};

use crate::config::HarnessConfig;
use crate::errors::HarnessError;
use crate::page::Page;
use crate::stories::{PlayStep, Story};
use crate::transport::HttpTransport;

/// Result of a story's play step.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlayOutcome {
    /// The story has no play step
    Skipped,
    Passed { report: LoadReport },
    Failed { error: String, timed_out: bool },
}

impl PlayOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, PlayOutcome::Failed { .. })
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct StoryReport {
    pub id: StoryId,
    pub play: PlayOutcome,
    /// `None` when the play step failed and no capture was taken
    pub snapshot: Option<SnapshotOutcome>,
    /// Status line of the card at capture time
    pub status_text: String,
    pub intercept: InterceptSnapshot,
    pub duration_ms: u64,
    /// Set when the story could not be completed, e.g. an unreadable baseline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StoryReport {
    pub fn passed(&self) -> bool {
        self.error.is_none()
            && !self.play.is_failure()
            && self.snapshot.as_ref().is_some_and(SnapshotOutcome::is_pass)
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub reports: Vec<StoryReport>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn push(&mut self, report: StoryReport) {
        if report.passed() {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.reports.push(report);
    }
}

pub struct StoryRunner {
    config: HarnessConfig,
    transport: Arc<dyn Transport>,
    store: SnapshotStore,
    cancel: CancellationToken,
}

impl StoryRunner {
    pub fn new(config: HarnessConfig, transport: Arc<dyn Transport>) -> Self {
        let store = SnapshotStore::new(config.snapshots.clone());
        Self {
            config,
            transport,
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// Runner with the transport `config` asks for: offline or real HTTP.
    pub fn from_config(config: HarnessConfig) -> Result<Self, HarnessError> {
        let transport: Arc<dyn Transport> = if config.offline {
            info!("Network disabled; only intercepted requests will succeed");
            Arc::new(OfflineTransport)
        } else {
            Arc::new(HttpTransport::new(Duration::from_millis(
                config.request_timeout_ms,
            ))?)
        };
        Ok(Self::new(config, transport))
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Cancelling this token aborts the current play step and skips the
    /// remaining stories.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run one story on a fresh page with its own interception layer.
    pub async fn run_story(&self, story: &Story) -> Result<StoryReport, HarnessError> {
        let span = info_span!("story", id = %story.id);
        self.run_story_inner(story).instrument(span).await
    }

    async fn run_story_inner(&self, story: &Story) -> Result<StoryReport, HarnessError> {
        let started = Instant::now();

        let layer = InterceptLayer::with_config(self.config.intercept.clone());
        let _guards = story
            .intercepts
            .iter()
            .map(|spec| Ok(layer.register(spec.rule()?)))
            .collect::<Result<Vec<InterceptGuard>, InterceptError>>()?;

        let fetcher = Arc::new(Fetcher::new(
            Arc::clone(&layer),
            Arc::clone(&self.transport),
        ));
        let page = Page::new(fetcher);
        let mut card = story.args.mount(&page);

        let play = match &story.play {
            None => PlayOutcome::Skipped,
            Some(PlayStep::WaitForImages(strategy)) => {
                match strategy
                    .run_until(page.document().as_ref(), self.cancel.child_token())
                    .await
                {
                    Ok(report) => PlayOutcome::Passed { report },
                    Err(err) => PlayOutcome::Failed {
                        timed_out: err.is_timeout(),
                        error: err.to_string(),
                    },
                }
            }
        };
        card.settle().await;

        let (snapshot, error) = if play.is_failure() {
            warn!("Play step failed; skipping snapshot");
            (None, None)
        } else {
            match page
                .capture_full_page()
                .and_then(|capture| self.store.check(story.id.as_str(), &capture))
            {
                Ok(outcome) => (Some(outcome), None),
                Err(err) => {
                    error!(error = %err, "Snapshot check failed");
                    (None, Some(err.to_string()))
                }
            }
        };

        let report = StoryReport {
            id: story.id.clone(),
            play,
            snapshot,
            status_text: card.status(),
            intercept: layer.snapshot(),
            duration_ms: started.elapsed().as_millis() as u64,
            error,
        };
        page.close();

        if report.passed() {
            info!(duration_ms = report.duration_ms, "Story passed");
        } else {
            warn!(duration_ms = report.duration_ms, "Story failed");
        }
        Ok(report)
    }

    /// Run `stories` in order. A failing story, or one that errors, does not
    /// stop the run.
    pub async fn run_all(&self, stories: &[&Story]) -> RunSummary {
        let mut summary = RunSummary::default();
        for story in stories {
            if self.cancel.is_cancelled() {
                warn!(remaining = stories.len() - summary.reports.len(), "Run cancelled");
                break;
            }
            let started = Instant::now();
            let report = match self.run_story(story).await {
                Ok(report) => report,
                Err(err) => {
                    error!(story = %story.id, error = %err, "Story could not run");
                    StoryReport {
                        id: story.id.clone(),
                        play: PlayOutcome::Skipped,
                        snapshot: None,
                        status_text: String::new(),
                        intercept: InterceptSnapshot::default(),
                        duration_ms: started.elapsed().as_millis() as u64,
                        error: Some(err.to_string()),
                    }
                }
            };
            summary.push(report);
        }
        info!(
            passed = summary.passed,
            failed = summary.failed,
            "Story run complete"
        );
        summary
    }
}
