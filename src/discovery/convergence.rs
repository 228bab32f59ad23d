//! Convergence controller for the paginated listing
//!
//! The listing is not a stable snapshot: repeated crawls of it surface
//! different items. The controller re-runs the crawl until the set of repos
//! stops growing and per-pass id growth drops under a threshold.
//!
//! # State machine
//!
//! ```text
//! RunningPrimary ──converged──────────────────────────────▶ Done
//!       │
//!       └─passes exhausted─▶ FallbackTriggered ─▶ RunningPostFallback ─▶ Done
//! ```
//!
//! Primary passes are numbered `1..=passes_max`. The fallback query set runs
//! as pass `passes_max + 1`, and the post-fallback passes follow from
//! `passes_max + 2`.

use crate::config::ConvergenceConfig;
use crate::discovery::listing::crawl_listing_once;
use crate::discovery::search::run_fallback_queries;
use crate::fetch::FetchClient;
use crate::model::{ConvergenceReason, ConvergenceReport, Frontier, PassSummary, RepoSet};
use crate::site::SiteUrls;
use crate::FetchResult;
use chrono::Utc;
use std::future::Future;

/// A source of full listing passes
pub trait ListingSource {
    /// Crawls the complete listing once
    fn crawl_pass(
        &self,
        pass_number: u32,
    ) -> impl Future<Output = FetchResult<(Frontier, RepoSet)>> + Send;

    /// Runs the broad fallback queries; failures are isolated per query
    fn fallback_queries(
        &self,
        queries: &[String],
        pass_number: u32,
    ) -> impl Future<Output = (Frontier, RepoSet)> + Send;
}

/// The live site as a [`ListingSource`]
#[derive(Debug, Clone)]
pub struct SiteListing {
    pub client: FetchClient,
    pub site: SiteUrls,
    pub max_pages: u32,
    pub search_query_limit: u32,
}

impl ListingSource for SiteListing {
    fn crawl_pass(
        &self,
        pass_number: u32,
    ) -> impl Future<Output = FetchResult<(Frontier, RepoSet)>> + Send {
        crawl_listing_once(&self.client, &self.site, pass_number, self.max_pages)
    }

    fn fallback_queries(
        &self,
        queries: &[String],
        pass_number: u32,
    ) -> impl Future<Output = (Frontier, RepoSet)> + Send {
        run_fallback_queries(
            &self.client,
            &self.site,
            queries,
            self.search_query_limit,
            pass_number,
        )
    }
}

/// Controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    RunningPrimary,
    FallbackTriggered,
    RunningPostFallback,
    Done,
}

/// Running aggregate and streak bookkeeping across passes
#[derive(Debug, Default)]
pub struct ConvergenceTracker {
    aggregate: Frontier,
    repos: RepoSet,
    summaries: Vec<PassSummary>,
    stable_repo_streak: u32,
    prev_repo_count: usize,
}

impl ConvergenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one pass into the aggregate (first writer wins) and records its summary
    pub fn record_pass(&mut self, pass_number: u32, items: Frontier, repos: RepoSet) -> &PassSummary {
        let previous_ids = self.aggregate.len();
        let previous_repos = self.repos.len();

        for (id, item) in items {
            self.aggregate.entry(id).or_insert(item);
        }
        self.repos.extend(repos);

        let new_ids = self.aggregate.len() - previous_ids;
        let new_repos = self.repos.len() - previous_repos;
        let growth_pct = if previous_ids == 0 {
            0.0
        } else {
            new_ids as f64 * 100.0 / previous_ids as f64
        };

        if self.repos.len() == self.prev_repo_count {
            self.stable_repo_streak += 1;
        } else {
            self.stable_repo_streak = 1;
        }
        self.prev_repo_count = self.repos.len();

        self.summaries.push(PassSummary {
            pass_number,
            ids_seen: self.aggregate.len(),
            repos_seen: self.repos.len(),
            new_ids,
            new_repos,
            growth_pct,
        });
        &self.summaries[self.summaries.len() - 1]
    }

    /// Folds fallback results into the aggregate without recording a pass
    ///
    /// The repo streak baseline is left untouched, so repos added here reset
    /// the streak on the next pass.
    pub fn absorb(&mut self, items: Frontier, repos: RepoSet) {
        for (id, item) in items {
            self.aggregate.entry(id).or_insert(item);
        }
        self.repos.extend(repos);
    }

    /// True when the latest pass meets both convergence gates
    pub fn is_converged(&self, config: &ConvergenceConfig) -> bool {
        match self.summaries.last() {
            Some(last) => {
                self.stable_repo_streak >= config.converge_repos
                    && last.growth_pct <= config.converge_growth
            }
            None => false,
        }
    }

    pub fn stable_repo_streak(&self) -> u32 {
        self.stable_repo_streak
    }

    pub fn aggregate(&self) -> &Frontier {
        &self.aggregate
    }

    pub fn repos(&self) -> &RepoSet {
        &self.repos
    }

    pub fn summaries(&self) -> &[PassSummary] {
        &self.summaries
    }

    pub fn into_parts(self) -> (Frontier, RepoSet, Vec<PassSummary>) {
        (self.aggregate, self.repos, self.summaries)
    }
}

/// Output of a convergence run
#[derive(Debug)]
pub struct ConvergenceOutcome {
    pub items: Frontier,
    pub repos: RepoSet,
    pub report: ConvergenceReport,
}

/// Drives repeated listing passes until convergence or exhaustion
pub struct ConvergenceController<'a, S> {
    source: &'a S,
    config: &'a ConvergenceConfig,
    state: ControllerState,
}

impl<'a, S: ListingSource> ConvergenceController<'a, S> {
    pub fn new(source: &'a S, config: &'a ConvergenceConfig) -> Self {
        Self {
            source,
            config,
            state: ControllerState::RunningPrimary,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    fn transition(&mut self, next: ControllerState) {
        tracing::info!("Convergence: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Runs one pass; a failed crawl counts as an empty pass
    async fn run_pass(&self, tracker: &mut ConvergenceTracker, pass_number: u32) {
        let (items, repos) = match self.source.crawl_pass(pass_number).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    "Listing pass {} failed, continuing with empty results: {}",
                    pass_number,
                    e
                );
                Default::default()
            }
        };

        let summary = tracker.record_pass(pass_number, items, repos);
        tracing::info!(
            "Pass {}: {} ids ({} new, {:.2}% growth), {} repos ({} new)",
            summary.pass_number,
            summary.ids_seen,
            summary.new_ids,
            summary.growth_pct,
            summary.repos_seen,
            summary.new_repos
        );
    }

    /// Runs the controller to completion
    pub async fn run(&mut self, run_id: &str) -> ConvergenceOutcome {
        let started_at = Utc::now();
        let mut tracker = ConvergenceTracker::new();
        let mut reason = ConvergenceReason::MaxPassesReached;
        let mut converged = false;
        let mut fallback_used = false;

        for pass_number in 1..=self.config.passes_max {
            self.run_pass(&mut tracker, pass_number).await;
            if tracker.is_converged(self.config) {
                converged = true;
                reason = ConvergenceReason::ReposStableAndGrowthThresholdMet;
                break;
            }
        }

        if !converged {
            self.transition(ControllerState::FallbackTriggered);
            fallback_used = true;

            let fallback_pass = self.config.passes_max + 1;
            let (items, repos) = self
                .source
                .fallback_queries(&self.config.fallback_queries, fallback_pass)
                .await;
            tracing::info!(
                "Fallback queries returned {} items across {} repos",
                items.len(),
                repos.len()
            );
            tracker.absorb(items, repos);

            self.transition(ControllerState::RunningPostFallback);
            let post_passes = self.config.converge_repos.max(2);
            for offset in 0..post_passes {
                let pass_number = self.config.passes_max + 2 + offset;
                self.run_pass(&mut tracker, pass_number).await;
                if tracker.is_converged(self.config) {
                    converged = true;
                    reason = ConvergenceReason::ConvergedAfterSearchFallback;
                    break;
                }
            }
        }

        self.transition(ControllerState::Done);

        let (items, repos, pass_summaries) = tracker.into_parts();
        let report = ConvergenceReport {
            run_id: run_id.to_string(),
            started_at,
            finished_at: Utc::now(),
            passes_executed: pass_summaries.len() as u32,
            converged,
            reason,
            total_ids: items.len(),
            total_repos: repos.len(),
            pass_summaries,
            fallback_used,
        };

        tracing::info!(
            "Convergence finished: converged={} reason={} ids={} repos={}",
            report.converged,
            report.reason,
            report.total_ids,
            report.total_repos
        );

        ConvergenceOutcome {
            items,
            repos,
            report,
        }
    }
}
