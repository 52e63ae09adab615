use super::fixes::Fix;
use super::{ValidationIssue, ValidatorConfig};
use crate::artifact::{Column, NodeKind, NodeRecord};
use crate::graph::{BotGraph, EdgeOrigin, GraphBuilder, node_references};
use ahash::{AHashMap, AHashSet};

/// An issue plus the deterministic repair for it, when one exists.
pub(super) struct Finding {
    pub issue: ValidationIssue,
    pub fix: Option<Fix>,
}

impl Finding {
    fn manual(node: i64, field: Column, message: String) -> Self {
        Self {
            issue: ValidationIssue {
                node,
                field,
                message,
                auto_fixable: false,
            },
            fix: None,
        }
    }

    fn fixable(node: i64, field: Column, message: String, fix: Option<Fix>) -> Self {
        Self {
            issue: ValidationIssue {
                node,
                field,
                message,
                auto_fixable: fix.is_some(),
            },
            fix,
        }
    }
}

/// Runs every check over the records. Each check is independent.
pub(super) fn run_all(records: &[NodeRecord], config: &ValidatorConfig) -> Vec<Finding> {
    let known: AHashSet<i64> = records.iter().map(|r| r.number).collect();
    let graph = GraphBuilder::new(records).build();

    let mut findings = Vec::new();
    check_duplicate_numbers(records, &mut findings);
    check_dangling_references(records, &known, config, &mut findings);
    check_required_fields(records, &mut findings);
    check_orphans(records, &graph, &mut findings);
    check_terminal_decisions(records, &graph, config, &mut findings);
    check_error_routes(records, &known, config, &mut findings);
    findings
}

fn check_duplicate_numbers(records: &[NodeRecord], findings: &mut Vec<Finding>) {
    let mut seen: AHashMap<i64, usize> = AHashMap::new();
    for record in records {
        let count = seen.entry(record.number).or_insert(0);
        *count += 1;
        if *count == 2 {
            findings.push(Finding::manual(
                record.number,
                Column::Number,
                format!("Node number {} is declared more than once", record.number),
            ));
        }
    }
}

fn check_dangling_references(
    records: &[NodeRecord],
    known: &AHashSet<i64>,
    config: &ValidatorConfig,
    findings: &mut Vec<Finding>,
) {
    for (position, record) in records.iter().enumerate() {
        let has_valid_next = record.next_nodes.iter().any(|t| known.contains(t));
        let mut first_dangling_next = true;

        for reference in node_references(record) {
            if known.contains(&reference.target) {
                continue;
            }
            let target = reference.target;
            match reference.origin {
                EdgeOrigin::NextNode => {
                    // With no valid sibling the first dangling entry is re-pointed so the
                    // node keeps an exit; every other dangling entry is dropped.
                    let fix = if has_valid_next || !first_dangling_next {
                        Some(Fix::DropNextNode { position, target })
                    } else {
                        resolve_fallback(record.number, target, known, config)
                            .map(|to| Fix::RepointNextNode {
                                position,
                                from: target,
                                to,
                            })
                    };
                    first_dangling_next = false;
                    findings.push(Finding::fixable(
                        record.number,
                        Column::NextNodes,
                        format!("Next node {} does not exist", target),
                        fix,
                    ));
                }
                EdgeOrigin::WhatNextRoute => {
                    let label = reference.label.unwrap_or_default();
                    let fix = resolve_fallback(record.number, target, known, config).map(|to| {
                        Fix::RepointRoute {
                            position,
                            label: label.clone(),
                            from: target,
                            to,
                        }
                    });
                    findings.push(Finding::fixable(
                        record.number,
                        Column::WhatNext,
                        format!("Route '{}' points to missing node {}", label, target),
                        fix,
                    ));
                }
                EdgeOrigin::RichContentOption => {
                    findings.push(Finding::manual(
                        record.number,
                        Column::RichContent,
                        format!(
                            "Option '{}' points to missing node {}",
                            reference.label.unwrap_or_default(),
                            target
                        ),
                    ));
                }
            }
        }
    }
}

fn check_required_fields(records: &[NodeRecord], findings: &mut Vec<Finding>) {
    for record in records {
        match record.kind {
            NodeKind::Decision => {
                if record.message.is_none() && record.rich_content.is_none() {
                    findings.push(Finding::manual(
                        record.number,
                        Column::Message,
                        "Decision node has neither a message nor rich content".to_string(),
                    ));
                }
            }
            NodeKind::Action => {
                if record.command.is_none() {
                    findings.push(Finding::manual(
                        record.number,
                        Column::Command,
                        "Action node has no command".to_string(),
                    ));
                }
            }
        }
    }
}

/// Entry points: the lowest non-system number and every system node.
fn entry_points(records: &[NodeRecord]) -> AHashSet<i64> {
    let mut entries: AHashSet<i64> = records
        .iter()
        .filter(|r| r.is_system())
        .map(|r| r.number)
        .collect();
    if let Some(start) = records.iter().filter(|r| !r.is_system()).map(|r| r.number).min() {
        entries.insert(start);
    }
    entries
}

fn check_orphans(records: &[NodeRecord], graph: &BotGraph, findings: &mut Vec<Finding>) {
    let entries = entry_points(records);
    let mut reported = AHashSet::new();
    for record in records {
        if entries.contains(&record.number) || !reported.insert(record.number) {
            continue;
        }
        let referenced = graph
            .edges_to(record.number)
            .any(|edge| edge.source != record.number);
        if !referenced {
            findings.push(Finding::manual(
                record.number,
                Column::Number,
                format!("Node {} is not referenced by any other node", record.number),
            ));
        }
    }
}

fn check_terminal_decisions(
    records: &[NodeRecord],
    graph: &BotGraph,
    config: &ValidatorConfig,
    findings: &mut Vec<Finding>,
) {
    let mut reported = AHashSet::new();
    for record in records {
        if record.kind != NodeKind::Decision || !reported.insert(record.number) {
            continue;
        }
        if graph.out_degree(record.number) > 0 || config.is_endpoint(record) {
            continue;
        }
        findings.push(Finding::manual(
            record.number,
            Column::NextNodes,
            "Decision node has no outgoing path and is not tagged as an endpoint".to_string(),
        ));
    }
}

fn check_error_routes(
    records: &[NodeRecord],
    known: &AHashSet<i64>,
    config: &ValidatorConfig,
    findings: &mut Vec<Finding>,
) {
    for (position, record) in records.iter().enumerate() {
        if record.kind != NodeKind::Action || record.command.is_none() {
            continue;
        }
        let has_error_route = record
            .what_next
            .iter()
            .any(|route| route.label.eq_ignore_ascii_case(crate::constants::ERROR_ROUTE_LABEL));
        if has_error_route {
            continue;
        }
        let fix = resolve_fallback(record.number, record.number, known, config)
            .map(|to| Fix::InsertErrorRoute { position, to });
        findings.push(Finding::fixable(
            record.number,
            Column::WhatNext,
            format!(
                "Action node has no '{}' route",
                crate::constants::ERROR_ROUTE_LABEL
            ),
            fix,
        ));
    }
}

/// The configured fallback if it exists, else the existing node numerically
/// nearest to `near` (lower wins ties). Never the source node itself.
fn resolve_fallback(
    source: i64,
    near: i64,
    known: &AHashSet<i64>,
    config: &ValidatorConfig,
) -> Option<i64> {
    if let Some(fallback) = config.fallback_node {
        if fallback != source && known.contains(&fallback) {
            return Some(fallback);
        }
    }
    known
        .iter()
        .copied()
        .filter(|&n| n != source)
        .min_by_key(|&n| ((n - near).abs(), n))
}
