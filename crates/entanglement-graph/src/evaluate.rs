use crate::{aggregate, partition_security_groups, PartitionReport, ProjectEntanglement};
use entanglement_core::Project;

/// Outcome of scoring every partition of one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectEvaluation {
    pub project_id: String,
    pub entanglement: ProjectEntanglement,
    pub partition_count: usize,
    /// Summaries of partitions scoring above the log limit, highest score first.
    pub reports: Vec<PartitionReport>,
}

/// Partitions and scores `project`, summarizing partitions whose score exceeds `score_log_limit`.
pub fn evaluate_project(project: &Project, score_log_limit: u64) -> ProjectEvaluation {
    let partitions = partition_security_groups(project);
    let scores: Vec<_> = partitions.iter().map(|p| p.score()).collect();

    let mut reports: Vec<PartitionReport> = partitions
        .iter()
        .zip(&scores)
        .filter(|(_, score)| score.value > score_log_limit)
        .map(|(partition, score)| partition.summarize(score, &project.uuid))
        .collect();
    reports.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.group_names.cmp(&b.group_names))
    });

    ProjectEvaluation {
        project_id: project.uuid.clone(),
        entanglement: aggregate(&scores),
        partition_count: partitions.len(),
        reports,
    }
}
