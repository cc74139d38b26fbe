use crate::Partition;
use std::fmt;

/// An aspect of a partition's topology that contributes to its entanglement score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Factor {
    pub value: u64,
    pub reason: String,
}

impl Factor {
    pub fn new(value: u64, reason: impl Into<String>) -> Self {
        Self {
            value,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// The entanglement score of a partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Score {
    pub value: u64,
    pub factors: Vec<Factor>,
}

impl Score {
    pub fn from_factors(factors: Vec<Factor>) -> Self {
        let value = factors
            .iter()
            .fold(0u64, |sum, factor| sum.saturating_add(factor.value));
        Self { value, factors }
    }
}

impl Partition<'_> {
    /// Computes this partition's entanglement score.
    ///
    /// The shared-port factor (if any) comes first, followed by one factor per
    /// directed rule reference into a group with ports, ordered by group names.
    pub fn score(&self) -> Score {
        let mut factors = Vec::new();
        if let Some(factor) = self.shared_port_factor() {
            factors.push(factor);
        }
        factors.extend(self.reference_factors());
        Score::from_factors(factors)
    }

    fn shared_port_factor(&self) -> Option<Factor> {
        let groups: Vec<_> = self.groups().collect();
        let mut pairs = 0u64;
        for (i, group) in groups.iter().enumerate() {
            for other in &groups[i + 1..] {
                if group.shared_ports_with(&other.name) > 0 {
                    pairs += 1;
                }
            }
        }

        (pairs > 0).then(|| {
            Factor::new(
                pairs,
                format!("{pairs} pairs of security groups are shared by ports"),
            )
        })
    }

    fn reference_factors(&self) -> Vec<Factor> {
        let mut factors = Vec::new();
        for group in self.groups() {
            for other in self.groups() {
                let references = group.references_to(&other.name);
                if references == 0 || other.port_count == 0 {
                    continue;
                }
                factors.push(Factor::new(
                    other.port_count.saturating_mul(references),
                    format!(
                        "security group {} has {} rules referencing security group {} which contains {} ports",
                        group.name, references, other.name, other.port_count,
                    ),
                ));
            }
        }
        factors
    }
}
