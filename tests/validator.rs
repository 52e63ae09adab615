//! Tests for the structural checks and their auto-fixes.
mod common;
use common::{csv_from_lines, csv_line, sample_csv, sample_records};
use kensa::graph::node_references;
use kensa::prelude::*;

fn validator() -> StructuralValidator {
    StructuralValidator::default()
}

fn csv(records: Vec<NodeRecord>) -> String {
    Artifact::from_records(records).to_csv()
}

/// `1 -> 105 -> 999`, where 999 does not exist.
fn dangling_csv() -> String {
    csv_from_lines(&[
        csv_line(&[
            (Column::Number, "1"),
            (Column::Kind, "D"),
            (Column::Name, "Start"),
            (Column::NextNodes, "105"),
            (Column::Message, "Welcome, friend"),
        ]),
        csv_line(&[
            (Column::Number, "105"),
            (Column::Kind, "D"),
            (Column::Name, "Ask"),
            (Column::NextNodes, "999"),
            (Column::Message, "Anything else?"),
        ]),
        csv_line(&[
            (Column::Number, "99990"),
            (Column::Kind, "A"),
            (Column::Name, "Error handler"),
            (Column::Command, "HandleBotError"),
            (Column::WhatNext, "error~1"),
        ]),
    ])
}

/// Several fixable defects at once.
fn messy_records() -> Vec<NodeRecord> {
    vec![
        NodeRecord::new(1, NodeKind::Decision, "Start")
            .with_message("Hi")
            .with_next_nodes([100, 777, 778]),
        NodeRecord::new(100, NodeKind::Action, "Lookup")
            .with_command("LookupOrder")
            .with_route("found", 555),
        NodeRecord::new(101, NodeKind::Decision, "Result")
            .with_message("Here it is")
            .with_next_nodes([888])
            .with_column(Column::Behaviors, "end"),
        NodeRecord::new(99990, NodeKind::Action, "Error handler")
            .with_command("HandleBotError")
            .with_route("error", 1),
    ]
}

#[test]
fn test_sample_artifact_is_valid() {
    let report = validator().validate(&sample_csv(), false);
    assert!(report.valid, "{:?}", report.issues);
    assert!(report.issues.is_empty());
    assert!(report.fixed_artifact.is_none());
}

#[test]
fn test_dangling_reference_is_fixed() {
    let report = validator().validate(&dangling_csv(), true);

    assert!(!report.valid);
    let issue = report.issues.iter().find(|i| i.node == 105).unwrap();
    assert_eq!(issue.field, Column::NextNodes);
    assert!(issue.auto_fixable);
    assert_eq!(
        report.applied_fixes,
        vec!["Node 105: re-pointed dangling next node 999 to 99990"]
    );

    let fixed = Artifact::parse(report.fixed_artifact.as_deref().unwrap());
    let node = fixed.get(105).unwrap();
    assert!(!node.next_nodes.contains(&999));

    let graph = GraphBuilder::new(fixed.records()).build();
    assert!(
        node_references(node)
            .iter()
            .all(|r| graph.contains(r.target))
    );
    assert!(graph.edges_from(105).all(|e| graph.contains(e.target)));
}

#[test]
fn test_dangling_reference_with_valid_sibling_is_dropped() {
    let records = vec![
        NodeRecord::new(1, NodeKind::Decision, "Start")
            .with_message("Hi")
            .with_next_nodes([2, 999]),
        NodeRecord::new(2, NodeKind::Decision, "Next")
            .with_message("Bye")
            .with_column(Column::NodeTags, "end"),
    ];
    let report = validator().validate(&csv(records), true);

    assert_eq!(
        report.applied_fixes,
        vec!["Node 1: removed dangling next node 999"]
    );
    let fixed = Artifact::parse(report.fixed_artifact.as_deref().unwrap());
    assert_eq!(fixed.get(1).unwrap().next_nodes, vec![2]);
}

#[test]
fn test_auto_fix_is_idempotent() {
    let validator = validator();
    let first = validator.validate(&csv(messy_records()), true);
    assert!(first.fixable_count() > 0);
    let fixed = first.fixed_artifact.clone().unwrap();

    let second = validator.validate(&fixed, true);
    assert_eq!(second.fixable_count(), 0);
    assert!(second.applied_fixes.is_empty());
    assert_eq!(second.fixed_artifact.as_deref(), Some(fixed.as_str()));
}

#[test]
fn test_auto_fix_never_renumbers_or_deletes() {
    let report = validator().validate(&csv(messy_records()), true);
    let fixed = Artifact::parse(report.fixed_artifact.as_deref().unwrap());

    let before: Vec<i64> = messy_records().iter().map(|r| r.number).collect();
    let after: Vec<i64> = fixed.records().iter().map(|r| r.number).collect();
    assert_eq!(before, after);
}

#[test]
fn test_messy_artifact_fixes() {
    let report = validator().validate(&csv(messy_records()), true);
    let fixed = Artifact::parse(report.fixed_artifact.as_deref().unwrap());

    assert_eq!(fixed.get(1).unwrap().next_nodes, vec![100]);
    let lookup = fixed.get(100).unwrap();
    assert_eq!(lookup.what_next[0].target, 99990);
    assert!(lookup.what_next.iter().any(|r| r.label == "error" && r.target == 99990));
    assert_eq!(fixed.get(101).unwrap().next_nodes, vec![99990]);

    // 101 is still unreferenced; orphans are never auto-fixed.
    let orphan = report
        .manual_issues()
        .find(|i| i.node == 101 && i.field == Column::Number);
    assert!(orphan.is_some());
}

#[test]
fn test_required_fields_are_reported() {
    let records = vec![
        NodeRecord::new(1, NodeKind::Decision, "Silent").with_next_nodes([2]),
        NodeRecord::new(2, NodeKind::Action, "Nothing to run").with_route("error", 1),
    ];
    let report = validator().validate(&csv(records), true);

    let message = report.issues.iter().find(|i| i.node == 1).unwrap();
    assert_eq!(message.field, Column::Message);
    assert!(!message.auto_fixable);
    let command = report.issues.iter().find(|i| i.node == 2).unwrap();
    assert_eq!(command.field, Column::Command);
    assert!(!command.auto_fixable);
}

#[test]
fn test_rich_content_satisfies_decision_content() {
    let records = vec![
        NodeRecord::new(1, NodeKind::Decision, "Menu")
            .with_rich_content("listpicker", r#"{"options": [{"label": "Go", "dest": 2}]}"#),
        NodeRecord::new(2, NodeKind::Decision, "End")
            .with_message("Bye")
            .with_column(Column::NodeTags, "end"),
    ];
    let report = validator().validate(&csv(records), false);
    assert!(report.valid, "{:?}", report.issues);
}

#[test]
fn test_dangling_rich_content_destination_is_manual() {
    let records = vec![
        NodeRecord::new(1, NodeKind::Decision, "Menu")
            .with_rich_content("listpicker", r#"{"options": [{"label": "Lost", "dest": 404}]}"#)
            .with_next_nodes([2]),
        NodeRecord::new(2, NodeKind::Decision, "End")
            .with_message("Bye")
            .with_column(Column::NodeTags, "end"),
    ];
    let report = validator().validate(&csv(records), true);

    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].field, Column::RichContent);
    assert!(!report.issues[0].auto_fixable);
    assert!(report.applied_fixes.is_empty());
}

#[test]
fn test_orphans_ignore_entry_points_and_self_loops() {
    let records = vec![
        NodeRecord::new(5, NodeKind::Decision, "Start")
            .with_message("Hi")
            .with_next_nodes([6]),
        NodeRecord::new(6, NodeKind::Decision, "Loop")
            .with_message("Again?")
            .with_next_nodes([6]),
        NodeRecord::new(7, NodeKind::Decision, "Island")
            .with_message("Nobody comes here")
            .with_next_nodes([7]),
        NodeRecord::new(-1, NodeKind::Action, "Hook")
            .with_command("SetVar")
            .with_route("error", 5),
    ];
    let report = validator().validate(&csv(records), false);

    let orphans: Vec<i64> = report
        .issues
        .iter()
        .filter(|i| i.message.contains("not referenced"))
        .map(|i| i.node)
        .collect();
    assert_eq!(orphans, vec![7]);
}

#[test]
fn test_terminal_decision_needs_endpoint_tag() {
    let untagged = vec![
        NodeRecord::new(1, NodeKind::Decision, "Start")
            .with_message("Hi")
            .with_next_nodes([2]),
        NodeRecord::new(2, NodeKind::Decision, "Stop").with_message("Bye"),
    ];
    let report = validator().validate(&csv(untagged.clone()), false);
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].node, 2);
    assert_eq!(report.issues[0].field, Column::NextNodes);

    let mut tagged = untagged;
    tagged[1] = tagged[1].clone().with_column(Column::Behaviors, "xfer_to_agent, END");
    assert!(validator().validate(&csv(tagged), false).valid);
}

#[test]
fn test_duplicate_numbers_are_reported_once() {
    let mut records = sample_records();
    records.push(
        NodeRecord::new(100, NodeKind::Decision, "Copy")
            .with_message("Again")
            .with_next_nodes([101]),
    );
    let report = validator().validate(&csv(records), true);
    let duplicates: Vec<_> = report
        .issues
        .iter()
        .filter(|i| i.message.contains("more than once"))
        .collect();

    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].node, 100);
    assert!(!duplicates[0].auto_fixable);
}

#[test]
fn test_missing_error_route_gets_fallback() {
    let mut records = sample_records();
    records[2] = NodeRecord::new(101, NodeKind::Action, "Check email")
        .with_command("ValidateEmail")
        .with_route("success", 102);
    let report = validator().validate(&csv(records), true);

    assert_eq!(report.fixable_count(), 1);
    assert_eq!(
        report.applied_fixes,
        vec!["Node 101: added 'error' route to 99990"]
    );
    let fixed = validator().validate(report.fixed_artifact.as_deref().unwrap(), false);
    assert!(fixed.valid, "{:?}", fixed.issues);
}

#[test]
fn test_nearest_node_is_used_without_configured_fallback() {
    let records = vec![
        NodeRecord::new(1, NodeKind::Decision, "Start")
            .with_message("Hi")
            .with_next_nodes([10]),
        NodeRecord::new(10, NodeKind::Decision, "Ask")
            .with_message("Which?")
            .with_next_nodes([400, 600])
            .with_route("yes", 500),
        NodeRecord::new(400, NodeKind::Decision, "Low")
            .with_message("Low")
            .with_column(Column::NodeTags, "end"),
        NodeRecord::new(600, NodeKind::Decision, "High")
            .with_message("High")
            .with_column(Column::NodeTags, "end"),
    ];
    let report = validator().validate(&csv(records.clone()), true);
    assert_eq!(
        report.applied_fixes,
        vec!["Node 10: re-pointed route 'yes' from 500 to 400"]
    );

    let pinned = StructuralValidator::new(ValidatorConfig {
        fallback_node: Some(600),
        ..Default::default()
    });
    let report = pinned.validate(&csv(records), true);
    assert_eq!(
        report.applied_fixes,
        vec!["Node 10: re-pointed route 'yes' from 500 to 600"]
    );
}

#[test]
fn test_issue_display_names_node_and_column() {
    let report = validator().validate(&dangling_csv(), false);
    let text = report.issues[0].to_string();
    assert!(text.starts_with("Node 105 [Next Nodes]"));
}

#[test]
fn test_auto_fix_keeps_quoted_commas_in_one_field() {
    let mut columns = vec![String::new(); Column::ALL.len()];
    columns[Column::Number.index()] = "105".to_string();
    columns[Column::Kind.index()] = "D".to_string();
    columns[Column::Name.index()] = "Ask".to_string();
    columns[Column::NextNodes.index()] = "999".to_string();
    columns[Column::Message.index()] = r#"Say "yes, please" now"#.to_string();
    columns[Column::NodeTags.index()] = "end".to_string();
    let text = csv_from_lines(&[
        csv_line(&[
            (Column::Number, "1"),
            (Column::Kind, "D"),
            (Column::Name, "Start"),
            (Column::NextNodes, "105"),
            (Column::Message, "Hi"),
        ]),
        columns.join(","),
    ]);
    assert_eq!(
        Artifact::parse(&text).get(105).unwrap().message.as_deref(),
        Some(r#"Say "yes, please" now"#)
    );

    let report = validator().validate(&text, true);
    let fixed = Artifact::parse(report.fixed_artifact.as_deref().unwrap());
    let record = fixed.get(105).unwrap();

    assert_eq!(record.next_nodes, vec![1]);
    assert_eq!(record.message.as_deref(), Some(r#"Say "yes, please" now"#));
    assert_eq!(record.column(Column::NodeTags), "end");
    assert!(fixed.skipped().is_empty());
}
