//! Reads security groups and their relations out of the Neutron database.

use async_trait::async_trait;
use entanglement_core::{DatabaseSchema, EntanglementError, Result, Snapshot, SnapshotBuilder};
use secrecy::{ExposeSecret, SecretString};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, warn};

/// Anything that can produce a full relation snapshot for one cycle.
#[async_trait]
pub trait RelationSource: Send + Sync {
    async fn collect(&self) -> Result<Snapshot>;
}

const SECURITY_GROUPS_QUERY: &str = "
    SELECT g.project_id, g.name, COUNT(b.port_id)
      FROM securitygroups g
      JOIN securitygroupportbindings b ON b.security_group_id = g.id
     GROUP BY g.project_id, g.name
";

const SHARED_PORTS_QUERY: &str = "
    SELECT COUNT(b1.port_id),
        (SELECT name FROM securitygroups WHERE id = b1.security_group_id),
        (SELECT name FROM securitygroups WHERE id = b2.security_group_id),
        (SELECT project_id FROM securitygroups WHERE id = b1.security_group_id)
      FROM securitygroupportbindings b1
      JOIN securitygroupportbindings b2 ON b1.port_id = b2.port_id AND b1.security_group_id < b2.security_group_id
     GROUP BY b1.security_group_id, b2.security_group_id
";

const REMOTE_REFERENCES_QUERY: &str = "
    SELECT g1.project_id, g1.name, g2.name, COUNT(*)
      FROM securitygrouprules r
      JOIN securitygroups g1 ON g1.id = r.security_group_id
      JOIN securitygroups g2 ON g2.id = r.remote_group_id
     WHERE r.remote_group_id IS NOT NULL
     GROUP BY g1.project_id, g1.name, g2.name
";

/// The three collection queries, rewritten for one database schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaQueries {
    pub security_groups: String,
    pub shared_ports: String,
    pub remote_references: String,
}

impl SchemaQueries {
    pub fn for_schema(schema: DatabaseSchema) -> Self {
        Self {
            security_groups: schema.apply_to(SECURITY_GROUPS_QUERY),
            shared_ports: schema.apply_to(SHARED_PORTS_QUERY),
            remote_references: schema.apply_to(REMOTE_REFERENCES_QUERY),
        }
    }
}

/// [`RelationSource`] backed by the Neutron PostgreSQL database.
///
/// Opens a fresh connection for every collection.
pub struct PostgresSource {
    uri: SecretString,
    queries: SchemaQueries,
}

impl PostgresSource {
    pub fn new(uri: SecretString, schema: DatabaseSchema) -> Self {
        Self {
            uri,
            queries: SchemaQueries::for_schema(schema),
        }
    }
}

#[async_trait]
impl RelationSource for PostgresSource {
    async fn collect(&self) -> Result<Snapshot> {
        let (client, connection) = tokio_postgres::connect(self.uri.expose_secret(), NoTls)
            .await
            .map_err(|e| database("cannot connect to Neutron DB", e))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("Neutron DB connection error: {}", e);
            }
        });

        collect_from(&client, &self.queries).await
    }
}

async fn collect_from(client: &Client, queries: &SchemaQueries) -> Result<Snapshot> {
    let mut builder = SnapshotBuilder::new();

    // list all security groups in all projects
    for row in query(client, &queries.security_groups).await? {
        apply_group_row(&mut builder, text(&row, 0)?, text(&row, 1)?, count(&row, 2)?);
    }

    // count ports shared by multiple security groups
    for row in query(client, &queries.shared_ports).await? {
        apply_shared_ports_row(
            &mut builder,
            text(&row, 3)?,
            text(&row, 1)?,
            text(&row, 2)?,
            count(&row, 0)?,
        );
    }

    // find security groups with rules referencing other security groups
    for row in query(client, &queries.remote_references).await? {
        apply_reference_row(
            &mut builder,
            text(&row, 0)?,
            text(&row, 1)?,
            text(&row, 2)?,
            count(&row, 3)?,
        );
    }

    if builder.skipped_rows() > 0 {
        debug!(
            skipped = builder.skipped_rows(),
            "ignored inconsistent rows from Neutron DB"
        );
    }
    Ok(builder.finish())
}

// Rows with a NULL key column are counted as skipped.

fn apply_group_row(
    builder: &mut SnapshotBuilder,
    project_id: Option<String>,
    name: Option<String>,
    port_count: u64,
) {
    match (project_id, name) {
        (Some(project_id), Some(name)) => builder.add_group(&project_id, &name, port_count),
        _ => builder.record_skipped(),
    }
}

fn apply_shared_ports_row(
    builder: &mut SnapshotBuilder,
    project_id: Option<String>,
    first: Option<String>,
    second: Option<String>,
    port_count: u64,
) {
    let (Some(project_id), Some(first), Some(second)) = (project_id, first, second) else {
        builder.record_skipped();
        return;
    };
    builder.add_shared_ports(&project_id, &first, &second, port_count);
}

fn apply_reference_row(
    builder: &mut SnapshotBuilder,
    project_id: Option<String>,
    group: Option<String>,
    remote: Option<String>,
    rule_count: u64,
) {
    let (Some(project_id), Some(group), Some(remote)) = (project_id, group, remote) else {
        builder.record_skipped();
        return;
    };
    builder.add_references(&project_id, &group, &remote, rule_count);
}

async fn query(client: &Client, sql: &str) -> Result<Vec<Row>> {
    client
        .query(sql, &[])
        .await
        .map_err(|e| database("cannot query Neutron DB", e))
}

fn text(row: &Row, idx: usize) -> Result<Option<String>> {
    row.try_get(idx)
        .map_err(|e| database("unexpected column type", e))
}

fn count(row: &Row, idx: usize) -> Result<u64> {
    let value: i64 = row
        .try_get(idx)
        .map_err(|e| database("unexpected column type", e))?;
    Ok(u64::try_from(value).unwrap_or(0))
}

fn database(context: &str, e: tokio_postgres::Error) -> EntanglementError {
    EntanglementError::Database(format!("{context}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use entanglement_core::NeutronRelease;

    #[test]
    fn old_schema_queries_use_tenant_id() {
        let queries = SchemaQueries::for_schema(NeutronRelease::Liberty.schema());
        for sql in [
            &queries.security_groups,
            &queries.shared_ports,
            &queries.remote_references,
        ] {
            assert!(sql.contains("tenant_id"));
            assert!(!sql.contains("project_id"));
        }
    }

    fn some(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn null_group_rows_are_skipped() {
        let mut b = SnapshotBuilder::new();
        apply_group_row(&mut b, some("p1"), some("web"), 3);
        apply_group_row(&mut b, None, some("orphan"), 1);
        apply_group_row(&mut b, some("p1"), None, 1);

        assert_eq!(b.skipped_rows(), 2);
        let snapshot = b.finish();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["p1"].sorted_group_names(), vec!["web"]);
    }

    #[test]
    fn shared_ports_with_deleted_group_are_skipped() {
        let mut b = SnapshotBuilder::new();
        apply_group_row(&mut b, some("p1"), some("web"), 3);
        apply_group_row(&mut b, some("p1"), some("db"), 2);

        // scalar subqueries yield NULL once a bound group is gone
        apply_shared_ports_row(&mut b, some("p1"), some("web"), None, 4);
        apply_shared_ports_row(&mut b, None, some("web"), some("db"), 4);
        assert_eq!(b.skipped_rows(), 2);

        // unknown group is skipped by the builder
        apply_shared_ports_row(&mut b, some("p1"), some("web"), some("cache"), 4);
        assert_eq!(b.skipped_rows(), 3);

        apply_shared_ports_row(&mut b, some("p1"), some("web"), some("db"), 2);
        assert_eq!(b.skipped_rows(), 3);
        let snapshot = b.finish();
        assert_eq!(snapshot["p1"].groups["web"].shared_ports_with("db"), 2);
        assert_eq!(snapshot["p1"].groups["db"].shared_ports_with("web"), 2);
    }

    #[test]
    fn reference_rows_with_nulls_or_unknown_groups_are_skipped() {
        let mut b = SnapshotBuilder::new();
        apply_group_row(&mut b, some("p1"), some("app"), 1);
        apply_group_row(&mut b, some("p1"), some("web"), 4);

        apply_reference_row(&mut b, None, some("app"), some("web"), 1);
        apply_reference_row(&mut b, some("p1"), None, some("web"), 1);
        apply_reference_row(&mut b, some("p1"), some("app"), None, 1);
        apply_reference_row(&mut b, some("p9"), some("app"), some("web"), 1);
        apply_reference_row(&mut b, some("p1"), some("app"), some("web"), 3);

        assert_eq!(b.skipped_rows(), 4);
        let snapshot = b.finish();
        assert_eq!(snapshot["p1"].groups["app"].references_to("web"), 3);
    }

    #[test]
    fn new_schema_queries_are_unchanged() {
        let queries = SchemaQueries::for_schema(NeutronRelease::Pike.schema());
        assert_eq!(queries.security_groups, SECURITY_GROUPS_QUERY);
        assert_eq!(queries.shared_ports, SHARED_PORTS_QUERY);
        assert_eq!(queries.remote_references, REMOTE_REFERENCES_QUERY);
    }
}
