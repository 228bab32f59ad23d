//! Pipeline coordinator
//!
//! Owns the shared fetch client and output layout for one invocation and
//! sequences the phases:
//! - Acquiring the single-run lock
//! - Discovery, followed by the frontier viability gate
//! - Extraction into the day's snapshot
//! - The quality report with completeness checks

use crate::config::Config;
use crate::fetch::FetchClient;
use crate::model::{DiscoverySummary, Frontier};
use crate::output::{
    build_quality_report, compare_with_previous_snapshot, verify_completeness, BaselineCheck,
    QualityReport,
};
use crate::pipeline::discovery::run_discovery;
use crate::pipeline::extraction::{run_extraction_phase, ExtractionPhase};
use crate::site::SiteUrls;
use crate::storage::{load_frontier, write_json_atomic, OutputLayout, PipelineLock, StorageError};
use crate::ScoutError;
use chrono::Utc;
use std::time::Duration;

/// Format of run identifiers, e.g. `20250301T060000Z`
pub const RUN_ID_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// How long to wait for another run to release the lock
const LOCK_WAIT: Duration = Duration::from_secs(10);

/// Which phases to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Discovery then extraction
    Full,
    /// Discovery only
    DiscoverOnly,
    /// Extraction from the persisted frontier
    ExtractOnly,
}

/// Per-invocation switches
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Ignore checkpoints even when resume is enabled in the config
    pub fresh: bool,

    /// Cap the query sweep to this many queries
    pub sample: Option<usize>,

    /// Explicit baseline total the run must reach
    pub baseline: Option<usize>,
}

/// Summary of a finished invocation
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub mode: RunMode,
    pub frontier_size: usize,
    pub records: usize,
    pub failures: usize,
    pub report: Option<QualityReport>,

    /// Baseline check of a discovery-only run, against the frontier size
    pub frontier_baseline: Option<BaselineCheck>,
}

impl RunOutcome {
    /// True when the run finished but fell short of a baseline
    pub fn below_baseline(&self) -> bool {
        self.report.as_ref().is_some_and(QualityReport::below_baseline)
            || self
                .frontier_baseline
                .as_ref()
                .is_some_and(|b| b.status.is_regression())
    }

    /// Process exit code: `0` on success, `2` when below baseline
    pub fn exit_code(&self) -> i32 {
        if self.below_baseline() {
            2
        } else {
            0
        }
    }
}

/// Main pipeline coordinator structure
pub struct Coordinator {
    config: Config,
    config_hash: String,
    options: RunOptions,
    client: FetchClient,
    site: SiteUrls,
    layout: OutputLayout,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The run configuration
    /// * `config_hash` - Hash of the config file, stamped on the quality report
    /// * `options` - Per-invocation switches
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(ScoutError)` - The site URL or HTTP client could not be built
    pub fn new(
        config: Config,
        config_hash: String,
        options: RunOptions,
    ) -> Result<Self, ScoutError> {
        let site = SiteUrls::new(&config.site.base_url)?;
        let client = FetchClient::from_config(&config)?;
        let layout = OutputLayout::new(&config.output.output_dir);

        Ok(Self {
            config,
            config_hash,
            options,
            client,
            site,
            layout,
        })
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    fn resume(&self) -> bool {
        self.config.output.resume && !self.options.fresh
    }

    async fn acquire_lock(&self) -> Result<PipelineLock, ScoutError> {
        let stale_after = Duration::from_secs(self.config.output.stale_lock_secs);
        PipelineLock::acquire(&self.layout.lock_path(), LOCK_WAIT, stale_after)
            .await
            .map_err(|e| match e {
                StorageError::LockHeld(holder) => ScoutError::LockHeld(holder),
                other => other.into(),
            })
    }

    /// Aborts when the frontier is too small to be a plausible listing
    fn check_viable(&self, frontier: &Frontier) -> Result<(), ScoutError> {
        let minimum = self.config.discovery.min_viable_frontier;
        if frontier.len() < minimum {
            tracing::error!(
                "Frontier has {} items, below the minimum of {}",
                frontier.len(),
                minimum
            );
            return Err(ScoutError::FrontierTooSmall {
                found: frontier.len(),
                minimum,
            });
        }
        Ok(())
    }

    /// Runs the requested phases under the pipeline lock
    pub async fn run(&self, mode: RunMode) -> Result<RunOutcome, ScoutError> {
        let _lock = self.acquire_lock().await?;
        let run_id = Utc::now().format(RUN_ID_FORMAT).to_string();
        let resume = self.resume();
        tracing::info!("Starting {:?} run {} (resume: {})", mode, run_id, resume);

        let (frontier, summary) = match mode {
            RunMode::Full | RunMode::DiscoverOnly => {
                let discovery = run_discovery(
                    &self.config,
                    &self.client,
                    &self.site,
                    &self.layout,
                    &run_id,
                    self.options.sample,
                    resume,
                )
                .await?;
                (discovery.frontier, Some(discovery.summary))
            }
            RunMode::ExtractOnly => {
                let frontier = load_frontier(&self.layout)?;
                tracing::info!("Loaded persisted frontier with {} items", frontier.len());
                (frontier, None)
            }
        };

        self.check_viable(&frontier)?;

        if mode == RunMode::DiscoverOnly {
            let frontier_baseline = self
                .options
                .baseline
                .map(|baseline| verify_completeness(frontier.len(), baseline));
            return Ok(RunOutcome {
                run_id,
                mode,
                frontier_size: frontier.len(),
                records: 0,
                failures: 0,
                report: None,
                frontier_baseline,
            });
        }

        let phase = run_extraction_phase(
            &self.config,
            &self.client,
            &self.site,
            &self.layout,
            &frontier,
            &run_id,
            resume,
        )
        .await?;

        let report = self.build_report(&run_id, &phase, summary.as_ref());
        write_json_atomic(&self.layout.quality_report_path(), &report)?;
        tracing::info!(
            "Quality report written to {}",
            self.layout.quality_report_path().display()
        );

        Ok(RunOutcome {
            run_id,
            mode,
            frontier_size: frontier.len(),
            records: phase.records.len(),
            failures: phase.failures.len(),
            report: Some(report),
            frontier_baseline: None,
        })
    }

    fn build_report(
        &self,
        run_id: &str,
        phase: &ExtractionPhase,
        summary: Option<&DiscoverySummary>,
    ) -> QualityReport {
        let mut report = build_quality_report(&phase.records, &phase.failures);
        if let Some(summary) = summary {
            report = report.with_discovery(summary);
        }

        let block = self.client.block_snapshot();
        if block.should_escalate {
            tracing::warn!(
                "Blocked responses at {:.2}%, browser escalation recommended",
                block.blocked_percent
            );
        }

        report.run_id = Some(run_id.to_string());
        report.config_hash = Some(self.config_hash.clone());
        report.browser_escalation_recommended = Some(block.should_escalate);
        report.blocked_percent = Some(block.blocked_percent);

        report.completeness = match compare_with_previous_snapshot(
            &self.layout,
            phase.snapshot_date,
            phase.records.len(),
        ) {
            Ok(completeness) => {
                if completeness.status.is_regression() {
                    tracing::warn!(
                        "Record count dropped from {:?} to {} since the previous snapshot",
                        completeness.previous_count,
                        completeness.current_count
                    );
                }
                Some(completeness)
            }
            Err(e) => {
                tracing::warn!("Completeness comparison failed: {}", e);
                None
            }
        };

        report.baseline = self.options.baseline.map(|baseline| {
            let check = verify_completeness(phase.records.len(), baseline);
            if check.status.is_regression() {
                tracing::warn!(
                    "Record count {} is below the baseline of {}",
                    check.current_total,
                    check.baseline_total
                );
            }
            check
        });

        report
    }
}

/// Runs the pipeline once
///
/// # Example
///
/// ```no_run
/// use skillscout::config::load_config_with_hash;
/// use skillscout::pipeline::{run_pipeline, RunMode, RunOptions};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("skillscout.toml"))?;
/// let outcome = run_pipeline(config, hash, RunOptions::default(), RunMode::Full).await?;
/// std::process::exit(outcome.exit_code());
/// # }
/// ```
pub async fn run_pipeline(
    config: Config,
    config_hash: String,
    options: RunOptions,
    mode: RunMode,
) -> Result<RunOutcome, ScoutError> {
    let coordinator = Coordinator::new(config, config_hash, options)?;
    coordinator.run(mode).await
}
