use entanglement_core::{Project, SecurityGroup};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// A set of interconnected security groups.
///
/// All groups form a connected graph, either via remote references in a
/// security group rule or via ports that are bound to several groups. The map
/// key is the group's name; the groups themselves are borrowed from the
/// [`Project`] they belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition<'a> {
    groups: BTreeMap<&'a str, &'a SecurityGroup>,
}

impl<'a> Partition<'a> {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&'a SecurityGroup> {
        self.groups.get(name).copied()
    }

    /// Group names in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.groups.keys().copied()
    }

    /// Groups ordered by name.
    pub fn groups(&self) -> impl Iterator<Item = &'a SecurityGroup> + '_ {
        self.groups.values().copied()
    }

    fn insert(&mut self, group: &'a SecurityGroup) {
        self.groups.insert(group.name.as_str(), group);
    }
}

impl<'a> FromIterator<&'a SecurityGroup> for Partition<'a> {
    fn from_iter<I: IntoIterator<Item = &'a SecurityGroup>>(iter: I) -> Self {
        let mut partition = Partition::default();
        for group in iter {
            partition.insert(group);
        }
        partition
    }
}

/// Separates the security groups of `project` into [`Partition`]s.
///
/// Every group ends up in exactly one partition. Seeds are taken in name
/// order, but callers must not rely on the order of the returned partitions.
pub fn partition_security_groups(project: &Project) -> Vec<Partition<'_>> {
    let adjacency = relation_adjacency(project);
    let mut partitioned: HashSet<&str> = HashSet::with_capacity(project.groups.len());
    let mut result = Vec::new();

    for seed in project.sorted_group_names() {
        if !partitioned.insert(seed) {
            continue;
        }

        let mut partition = Partition::default();
        let mut worklist = vec![seed];
        while let Some(name) = worklist.pop() {
            if let Some(group) = project.groups.get(name) {
                partition.insert(group);
            }
            for &neighbor in adjacency.get(name).into_iter().flatten() {
                // also swallows self-relations
                if partitioned.insert(neighbor) {
                    worklist.push(neighbor);
                }
            }
        }
        result.push(partition);
    }

    debug!(
        project_id = %project.uuid,
        groups = project.groups.len(),
        partitions = result.len(),
        "partitioned security groups"
    );
    result
}

/// Undirected adjacency lists over the relation edges of `project`.
///
/// Relations naming a group that is not part of the project are ignored.
fn relation_adjacency(project: &Project) -> HashMap<&str, Vec<&str>> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::with_capacity(project.groups.len());

    for (name, group) in &project.groups {
        let related = group
            .shared_port_count
            .iter()
            .chain(group.reference_count.iter())
            .filter(|(_, count)| **count > 0);

        for (other, _) in related {
            let Some((other, _)) = project.groups.get_key_value(other.as_str()) else {
                continue;
            };
            adjacency.entry(name.as_str()).or_default().push(other.as_str());
            adjacency.entry(other.as_str()).or_default().push(name.as_str());
        }
    }

    adjacency
}
