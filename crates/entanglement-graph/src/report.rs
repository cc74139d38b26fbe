use crate::{Factor, Partition, Score};
use std::cmp::Reverse;
use std::fmt;

/// How many factors a [`PartitionReport`] lists at most.
pub const MAX_REPORTED_REASONS: usize = 3;

/// Human-readable summary of one partition's entanglement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionReport {
    pub project_id: String,
    /// Group names, sorted.
    pub group_names: Vec<String>,
    pub score: u64,
    /// Reasons of the highest-valued factors, highest first.
    pub reasons: Vec<String>,
}

impl PartitionReport {
    pub fn partition_size(&self) -> usize {
        self.group_names.len()
    }
}

impl fmt::Display for PartitionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "project {} contains a partition of {} security groups ({}) with entanglement {}; top {} reasons: {}",
            self.project_id,
            self.partition_size(),
            self.group_names.join(", "),
            self.score,
            self.reasons.len(),
            self.reasons.join(", "),
        )
    }
}

/// Per-project aggregate over all partition scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectEntanglement {
    pub max: u64,
    pub total: u64,
}

/// Folds partition scores into the project's maximum and total.
pub fn aggregate<'s>(scores: impl IntoIterator<Item = &'s Score>) -> ProjectEntanglement {
    scores
        .into_iter()
        .fold(ProjectEntanglement::default(), |acc, score| ProjectEntanglement {
            max: acc.max.max(score.value),
            total: acc.total.saturating_add(score.value),
        })
}

/// Orders factors by descending value; equal values are ordered by reason.
pub fn rank_factors(factors: &[Factor]) -> Vec<&Factor> {
    let mut ranked: Vec<&Factor> = factors.iter().collect();
    ranked.sort_by(|a, b| {
        Reverse(a.value)
            .cmp(&Reverse(b.value))
            .then_with(|| a.reason.cmp(&b.reason))
    });
    ranked
}

impl Partition<'_> {
    /// Summarizes `score` for logging; lists the top [`MAX_REPORTED_REASONS`] factors.
    pub fn summarize(&self, score: &Score, project_id: &str) -> PartitionReport {
        PartitionReport {
            project_id: project_id.to_string(),
            group_names: self.names().map(str::to_string).collect(),
            score: score.value,
            reasons: rank_factors(&score.factors)
                .into_iter()
                .take(MAX_REPORTED_REASONS)
                .map(|factor| factor.reason.clone())
                .collect(),
        }
    }
}
