use entanglement_core::{Project, SecurityGroup, SnapshotBuilder};
use entanglement_graph::*;

fn shared_pair_project() -> SnapshotBuilder {
    let mut b = SnapshotBuilder::new();
    b.add_group("p", "A", 0);
    b.add_group("p", "B", 0);
    b.add_shared_ports("p", "A", "B", 5);
    b
}

fn project(builder: SnapshotBuilder) -> Project {
    builder.finish().remove("p").unwrap()
}

#[test]
fn shared_ports_form_one_pair() {
    let project = project(shared_pair_project());

    let partitions = partition_security_groups(&project);
    assert_eq!(partitions.len(), 1);
    assert_eq!(partitions[0].names().collect::<Vec<_>>(), vec!["A", "B"]);

    let score = partitions[0].score();
    assert_eq!(score.value, 1);
    assert_eq!(score.factors.len(), 1);
    assert_eq!(score.factors[0].value, 1);
    assert!(score.factors[0].reason.contains("1 pairs"));
}

#[test]
fn unrelated_groups_are_singletons() {
    let project = Project::with_groups(
        "p",
        ["A", "B", "C"].map(|name| SecurityGroup::new(name, 3)),
    );

    let partitions = partition_security_groups(&project);
    assert_eq!(partitions.len(), 3);
    for partition in &partitions {
        assert_eq!(partition.len(), 1);
        let score = partition.score();
        assert_eq!(score.value, 0);
        assert!(score.factors.is_empty());
    }
}

#[test]
fn reference_is_weighted_by_target_ports() {
    let mut b = SnapshotBuilder::new();
    b.add_group("p", "B", 0);
    b.add_group("p", "C", 10);
    b.add_references("p", "B", "C", 2);
    let project = project(b);

    let partitions = partition_security_groups(&project);
    assert_eq!(partitions.len(), 1);
    let score = partitions[0].score();
    assert_eq!(score.factors.len(), 1);
    assert_eq!(score.factors[0].value, 20);
    assert_eq!(
        score.factors[0].reason,
        "security group B has 2 rules referencing security group C which contains 10 ports"
    );
    assert_eq!(score.value, 20);
}

#[test]
fn bridge_group_joins_partitions() {
    let mut b = shared_pair_project();
    b.add_group("p", "C", 10);
    b.add_references("p", "B", "C", 2);
    let project = project(b);

    let partitions = partition_security_groups(&project);
    assert_eq!(partitions.len(), 1);
    assert_eq!(partitions[0].names().collect::<Vec<_>>(), vec!["A", "B", "C"]);

    let score = partitions[0].score();
    assert_eq!(score.value, 21);
    // pairing factor is emitted first
    assert_eq!(score.factors[0].value, 1);
    assert_eq!(score.factors[1].value, 20);

    let eval = evaluate_project(&project, 20);
    assert_eq!(eval.entanglement, ProjectEntanglement { max: 21, total: 21 });
    assert_eq!(eval.reports.len(), 1);
    assert_eq!(eval.reports[0].reasons.len(), 2);
}

#[test]
fn symmetric_shared_ports_count_once() {
    let project = project(shared_pair_project());
    let partitions = partition_security_groups(&project);
    let score = partitions[0].score();
    assert_eq!(score.factors[0].value, 1);
}

#[test]
fn one_way_reference_yields_one_factor() {
    let mut b = SnapshotBuilder::new();
    b.add_group("p", "A", 1);
    b.add_group("p", "B", 4);
    b.add_references("p", "A", "B", 3);
    let project = project(b);

    let partitions = partition_security_groups(&project);
    let score = partitions[0].score();
    assert_eq!(score.factors.len(), 1);
    assert_eq!(score.factors[0].value, 12);
}
