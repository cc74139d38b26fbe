use entanglement_core::{EntanglementError, Result};
use entanglement_graph::ProjectEvaluation;
use parking_lot::Mutex;
use prometheus::{Encoder, GaugeVec, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::collections::HashSet;
use tracing::debug;

const PROJECT_LABEL: &str = "project_id";

/// Metric registry of the exporter.
///
/// Created once at startup, written by [`EntanglementMetrics::publish`] once per
/// cycle and read by the scrape handler.
pub struct EntanglementMetrics {
    registry: Registry,
    max_entanglement: GaugeVec,
    total_entanglement: GaugeVec,
    cycles_total: IntCounter,
    projects: IntGauge,
    // project ids with series currently exported; also serializes publishers
    published: Mutex<HashSet<String>>,
}

impl EntanglementMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let max_entanglement = GaugeVec::new(
            Opts::new(
                "security_group_max_entanglement",
                "Highest entanglement score for an inter-connected set of security groups in this project.",
            ),
            &[PROJECT_LABEL],
        )
        .map_err(metrics_error)?;
        let total_entanglement = GaugeVec::new(
            Opts::new(
                "security_group_total_entanglement",
                "Sum of entanglement scores for all inter-connected sets of security groups in this project.",
            ),
            &[PROJECT_LABEL],
        )
        .map_err(metrics_error)?;
        let cycles_total = IntCounter::new(
            "security_group_entanglement_cycles_total",
            "Number of completed collection cycles.",
        )
        .map_err(metrics_error)?;
        let projects = IntGauge::new(
            "security_group_entanglement_projects",
            "Number of projects seen in the last completed collection cycle.",
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(max_entanglement.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(total_entanglement.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(cycles_total.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(projects.clone()))
            .map_err(metrics_error)?;

        #[cfg(target_os = "linux")]
        registry
            .register(Box::new(
                prometheus::process_collector::ProcessCollector::for_self(),
            ))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            max_entanglement,
            total_entanglement,
            cycles_total,
            projects,
            published: Mutex::new(HashSet::new()),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Publishes the results of one complete cycle.
    ///
    /// Series of projects missing from `evaluations` are removed.
    pub fn publish(&self, evaluations: &[ProjectEvaluation]) {
        let mut published = self.published.lock();

        let current: HashSet<String> = evaluations
            .iter()
            .map(|e| e.project_id.clone())
            .collect();
        for evaluation in evaluations {
            let labels = [evaluation.project_id.as_str()];
            self.max_entanglement
                .with_label_values(&labels)
                .set(evaluation.entanglement.max as f64);
            self.total_entanglement
                .with_label_values(&labels)
                .set(evaluation.entanglement.total as f64);
        }

        for stale in published.difference(&current) {
            debug!(project_id = %stale, "removing series of vanished project");
            let labels = [stale.as_str()];
            for gauge in [&self.max_entanglement, &self.total_entanglement] {
                if let Err(e) = gauge.remove_label_values(&labels) {
                    debug!(project_id = %stale, "no series to remove: {}", e);
                }
            }
        }
        *published = current;

        self.projects.set(evaluations.len() as i64);
        self.cycles_total.inc();
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_total.get()
    }

    pub fn last_cycle_projects(&self) -> i64 {
        self.projects.get()
    }

    /// Renders all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| EntanglementError::Metrics(e.to_string()))
    }
}

fn metrics_error(e: prometheus::Error) -> EntanglementError {
    EntanglementError::Metrics(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use entanglement_graph::ProjectEntanglement;

    fn evaluation(project_id: &str, max: u64, total: u64) -> ProjectEvaluation {
        ProjectEvaluation {
            project_id: project_id.to_string(),
            entanglement: ProjectEntanglement { max, total },
            partition_count: 1,
            reports: Vec::new(),
        }
    }

    #[test]
    fn publish_sets_gauges_per_project() {
        let metrics = EntanglementMetrics::new().unwrap();
        metrics.publish(&[evaluation("p1", 21, 30), evaluation("p2", 0, 0)]);

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"security_group_max_entanglement{project_id="p1"} 21"#));
        assert!(text.contains(r#"security_group_total_entanglement{project_id="p1"} 30"#));
        assert!(text.contains(r#"security_group_max_entanglement{project_id="p2"} 0"#));
        assert_eq!(metrics.cycles_completed(), 1);
        assert_eq!(metrics.last_cycle_projects(), 2);
    }

    #[test]
    fn vanished_projects_are_removed() {
        let metrics = EntanglementMetrics::new().unwrap();
        metrics.publish(&[evaluation("p1", 1, 1), evaluation("p2", 2, 2)]);
        metrics.publish(&[evaluation("p2", 5, 7)]);

        let text = metrics.render().unwrap();
        assert!(!text.contains(r#"project_id="p1""#));
        assert!(text.contains(r#"security_group_total_entanglement{project_id="p2"} 7"#));
        assert_eq!(metrics.cycles_completed(), 2);
    }

    #[test]
    fn empty_cycle_clears_every_series() {
        let metrics = EntanglementMetrics::new().unwrap();
        metrics.publish(&[evaluation("p1", 1, 1), evaluation("p2", 2, 2)]);
        metrics.publish(&[]);
        metrics.publish(&[]);

        let text = metrics.render().unwrap();
        assert!(!text.contains("project_id="));
        assert_eq!(metrics.last_cycle_projects(), 0);
        assert_eq!(metrics.cycles_completed(), 3);
    }
}
