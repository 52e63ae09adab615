//! Tests for edge derivation and graph queries.
mod common;
use common::sample_records;
use kensa::graph::node_references;
use kensa::prelude::*;

fn menu_record() -> NodeRecord {
    NodeRecord::new(200, NodeKind::Decision, "Menu")
        .with_message("Pick one")
        .with_next_nodes([201, 999])
        .with_route("fallback", 202)
        .with_rich_content(
            "listpicker",
            r#"{"options": [{"label": "Talk to a human about my invoice please", "dest": 203}, {"label": "Ghost", "dest": 404}]}"#,
        )
}

fn menu_records() -> Vec<NodeRecord> {
    let mut records = vec![menu_record()];
    for number in 201..=203 {
        records.push(
            NodeRecord::new(number, NodeKind::Decision, "Leaf")
                .with_message("Done")
                .with_column(Column::NodeTags, "end"),
        );
    }
    records
}

#[test]
fn test_edges_from_all_three_encodings_in_order() {
    let graph = GraphBuilder::new(&menu_records()).build();
    let edges: Vec<(i64, EdgeOrigin)> = graph
        .edges_from(200)
        .map(|e| (e.target, e.origin))
        .collect();

    assert_eq!(
        edges,
        vec![
            (201, EdgeOrigin::NextNode),
            (202, EdgeOrigin::WhatNextRoute),
            (203, EdgeOrigin::RichContentOption),
        ]
    );
}

#[test]
fn test_dangling_targets_are_dropped_but_still_referenced() {
    let records = menu_records();
    let graph = GraphBuilder::new(&records).build();

    assert!(graph.edges().iter().all(|e| graph.contains(e.target)));
    let declared: Vec<i64> = node_references(&records[0]).iter().map(|r| r.target).collect();
    assert_eq!(declared, vec![201, 999, 202, 203, 404]);
}

#[test]
fn test_option_labels_are_truncated_only_for_display() {
    let graph = GraphBuilder::new(&menu_records()).build();
    let edge = graph
        .edges_from(200)
        .find(|e| e.origin == EdgeOrigin::RichContentOption)
        .unwrap();

    assert_eq!(
        edge.label.as_deref(),
        Some("Talk to a human about my invoice please")
    );
    let shown = edge.display_label().unwrap();
    assert!(shown.ends_with("..."));
    assert_eq!(shown.chars().count(), 24);
}

#[test]
fn test_graph_queries() {
    let graph = GraphBuilder::new(&sample_records()).build();

    assert_eq!(graph.successors(101), vec![102, 99990]);
    assert_eq!(graph.predecessors(1), vec![99990]);
    assert_eq!(graph.in_degree(100), 1);
    assert_eq!(graph.out_degree(102), 0);
    assert_eq!(graph.node(101).map(|n| n.name.as_str()), Some("Check email"));
    assert!(graph.node(5).is_none());
}

#[test]
fn test_graph_scoped_to_one_flow_drops_cross_flow_edges() {
    let plan = FlowPlan::new([FlowDescriptor::new("main", "", 100)]).unwrap();
    let records = sample_records();
    let partition = FlowPartition::new(&records, &plan);
    let graph = GraphBuilder::new(partition.records_of("main")).build();

    assert_eq!(graph.nodes().len(), 3);
    assert!(graph.edges().iter().all(|e| e.target != 99990));
    assert_eq!(graph.edges().len(), 2);
}

#[test]
fn test_adjacency_queries_agree_with_edge_list() {
    let records = vec![
        NodeRecord::new(1, NodeKind::Decision, "Start")
            .with_message("Hi")
            .with_next_nodes([2])
            .with_route("again", 2),
        NodeRecord::new(2, NodeKind::Decision, "Loop")
            .with_message("Again?")
            .with_next_nodes([1, 2]),
    ];
    let graph = GraphBuilder::new(&records).build();

    let into_two: Vec<(i64, EdgeOrigin)> = graph.edges_to(2).map(|e| (e.source, e.origin)).collect();
    assert_eq!(
        into_two,
        vec![
            (1, EdgeOrigin::NextNode),
            (1, EdgeOrigin::WhatNextRoute),
            (2, EdgeOrigin::NextNode),
        ]
    );
    assert_eq!(graph.in_degree(2), 3);
    assert_eq!(graph.out_degree(2), 2);
    assert_eq!(graph.predecessors(2), vec![1, 2]);
    assert_eq!(graph.successors(1), vec![2]);
    assert_eq!(graph.edges_from(42).count(), 0);
    assert_eq!(graph.in_degree(42), 0);
    for edge in graph.edges() {
        assert!(graph.edges_from(edge.source).any(|e| e == edge));
        assert!(graph.edges_to(edge.target).any(|e| e == edge));
    }
}
