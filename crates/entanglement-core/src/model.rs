use std::collections::HashMap;
use tracing::debug;

/// A security group together with the relation counts collected for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityGroup {
    pub name: String,
    /// Number of ports bound to this group.
    pub port_count: u64,
    /// How many ports are shared with another security group (key = remote group name).
    /// Symmetric: the builder always writes both directions.
    pub shared_port_count: HashMap<String, u64>,
    /// How many rules of this group reference another security group as their
    /// remote group (key = remote group name).
    pub reference_count: HashMap<String, u64>,
}

impl SecurityGroup {
    pub fn new(name: impl Into<String>, port_count: u64) -> Self {
        Self {
            name: name.into(),
            port_count,
            ..Self::default()
        }
    }

    pub fn shared_ports_with(&self, other: &str) -> u64 {
        self.shared_port_count.get(other).copied().unwrap_or(0)
    }

    pub fn references_to(&self, other: &str) -> u64 {
        self.reference_count.get(other).copied().unwrap_or(0)
    }

    /// Whether a relation edge connects `self` and `other`, in either direction.
    pub fn is_related_to(&self, other: &SecurityGroup) -> bool {
        self.shared_ports_with(&other.name) > 0
            || self.references_to(&other.name) > 0
            || other.references_to(&self.name) > 0
    }
}

/// All security groups of one project, keyed by group name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Project {
    pub uuid: String,
    pub groups: HashMap<String, SecurityGroup>,
}

impl Project {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            groups: HashMap::new(),
        }
    }

    pub fn with_groups(
        uuid: impl Into<String>,
        groups: impl IntoIterator<Item = SecurityGroup>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            groups: groups.into_iter().map(|g| (g.name.clone(), g)).collect(),
        }
    }

    /// Group names in lexicographic order.
    pub fn sorted_group_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.groups.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Everything collected in one cycle, keyed by project id.
pub type Snapshot = HashMap<String, Project>;

/// Assembles a [`Snapshot`] from relation rows of an untrusted store.
///
/// Groups must be added before the rows relating them. Relation rows naming a
/// project or group that was never added are dropped and counted.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    projects: Snapshot,
    skipped_rows: usize,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group(&mut self, project_id: &str, group_name: &str, port_count: u64) {
        let project = self
            .projects
            .entry(project_id.to_string())
            .or_insert_with(|| Project::new(project_id));
        project
            .groups
            .insert(group_name.to_string(), SecurityGroup::new(group_name, port_count));
    }

    /// Records `port_count` ports bound to both groups. Returns false if the row was skipped.
    pub fn add_shared_ports(
        &mut self,
        project_id: &str,
        first: &str,
        second: &str,
        port_count: u64,
    ) -> bool {
        let Some(project) = self.projects.get_mut(project_id) else {
            return self.skip("shared ports", project_id, first, second);
        };
        if !project.groups.contains_key(first) || !project.groups.contains_key(second) {
            return self.skip("shared ports", project_id, first, second);
        }

        if let Some(group) = project.groups.get_mut(first) {
            group.shared_port_count.insert(second.to_string(), port_count);
        }
        if let Some(group) = project.groups.get_mut(second) {
            group.shared_port_count.insert(first.to_string(), port_count);
        }
        true
    }

    /// Records `rule_count` rules in `group` referencing `remote`. Returns false if the row was skipped.
    pub fn add_references(
        &mut self,
        project_id: &str,
        group: &str,
        remote: &str,
        rule_count: u64,
    ) -> bool {
        let Some(project) = self.projects.get_mut(project_id) else {
            return self.skip("remote references", project_id, group, remote);
        };
        if !project.groups.contains_key(remote) {
            return self.skip("remote references", project_id, group, remote);
        }
        match project.groups.get_mut(group) {
            Some(g) => {
                g.reference_count.insert(remote.to_string(), rule_count);
                true
            }
            None => self.skip("remote references", project_id, group, remote),
        }
    }

    /// Counts a row that was dropped before reaching the builder (e.g. NULL columns).
    pub fn record_skipped(&mut self) {
        self.skipped_rows += 1;
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    pub fn finish(self) -> Snapshot {
        self.projects
    }

    fn skip(&mut self, kind: &str, project_id: &str, a: &str, b: &str) -> bool {
        debug!(project_id, kind, a, b, "skipping relation row for unknown project or group");
        self.skipped_rows += 1;
        false
    }
}
