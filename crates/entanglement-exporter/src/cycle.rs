//! One collection cycle: collect, evaluate every project, publish.

use crate::{EntanglementMetrics, RelationSource};
use entanglement_core::{EntanglementError, Result, Snapshot};
use entanglement_graph::{evaluate_project, PartitionReport, ProjectEvaluation};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct CycleOptions {
    pub interval: Duration,
    pub timeout: Duration,
    /// Partitions scoring above this are logged.
    pub score_log_limit: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub projects: usize,
    pub partitions: usize,
    pub reported_partitions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleSummary),
    /// The cycle did not finish in time; nothing was published.
    TimedOut,
}

/// Evaluates all projects of `snapshot` in parallel, ordered by project id.
pub fn evaluate_snapshot(snapshot: &Snapshot, score_log_limit: u64) -> Vec<ProjectEvaluation> {
    let mut evaluations: Vec<ProjectEvaluation> = snapshot
        .par_iter()
        .map(|(_, project)| evaluate_project(project, score_log_limit))
        .collect();
    evaluations.sort_by(|a, b| a.project_id.cmp(&b.project_id));
    evaluations
}

/// Runs one full cycle. Metrics are only touched once every project has been evaluated.
pub async fn run_cycle<S>(
    source: &S,
    score_log_limit: u64,
    metrics: &EntanglementMetrics,
) -> Result<CycleSummary>
where
    S: RelationSource + ?Sized,
{
    let snapshot = source.collect().await?;
    let evaluations =
        tokio::task::spawn_blocking(move || evaluate_snapshot(&snapshot, score_log_limit))
            .await
            .map_err(|e| EntanglementError::Server(format!("evaluation task failed: {e}")))?;

    let mut summary = CycleSummary {
        projects: evaluations.len(),
        ..CycleSummary::default()
    };
    for evaluation in &evaluations {
        summary.partitions += evaluation.partition_count;
        summary.reported_partitions += evaluation.reports.len();
        for report in &evaluation.reports {
            log_report(report);
        }
    }

    metrics.publish(&evaluations);
    Ok(summary)
}

/// Like [`run_cycle`], but gives up after `timeout`.
pub async fn run_timed_cycle<S>(
    source: &S,
    options: &CycleOptions,
    metrics: &EntanglementMetrics,
) -> Result<CycleOutcome>
where
    S: RelationSource + ?Sized,
{
    match tokio::time::timeout(
        options.timeout,
        run_cycle(source, options.score_log_limit, metrics),
    )
    .await
    {
        Ok(result) => result.map(CycleOutcome::Completed),
        Err(_) => Ok(CycleOutcome::TimedOut),
    }
}

/// Runs a cycle on every tick until a cycle fails.
pub async fn run_scrape_loop(
    source: Arc<dyn RelationSource>,
    options: CycleOptions,
    metrics: Arc<EntanglementMetrics>,
) -> Result<()> {
    let mut ticker = tokio::time::interval(options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let started = Instant::now();
        match run_timed_cycle(source.as_ref(), &options, &metrics).await {
            Ok(CycleOutcome::Completed(summary)) => info!(
                projects = summary.projects,
                partitions = summary.partitions,
                reported = summary.reported_partitions,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "collection cycle completed"
            ),
            Ok(CycleOutcome::TimedOut) => warn!(
                timeout_secs = options.timeout.as_secs(),
                "collection cycle timed out, results discarded"
            ),
            Err(e) => {
                error!("collection cycle failed: {}", e);
                return Err(e);
            }
        }
    }
}

fn log_report(report: &PartitionReport) {
    info!(
        project_id = %report.project_id,
        groups = report.partition_size(),
        score = report.score,
        "{}",
        report
    );
}
