use super::{BotGraph, Edge, EdgeOrigin};
use crate::artifact::{NodeRecord, RichContent};
use ahash::{AHashMap, AHashSet};
use tracing::debug;

/// A branch target declared by a record, before existence is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReference {
    pub target: i64,
    pub origin: EdgeOrigin,
    pub label: Option<String>,
}

/// Every branch target a record declares, in declaration order: next-node list
/// first, then what-next routes, then rich-content option destinations.
pub fn node_references(record: &NodeRecord) -> Vec<NodeReference> {
    let mut references: Vec<NodeReference> = record
        .next_nodes
        .iter()
        .map(|&target| NodeReference {
            target,
            origin: EdgeOrigin::NextNode,
            label: None,
        })
        .collect();

    references.extend(record.what_next.iter().map(|route| NodeReference {
        target: route.target,
        origin: EdgeOrigin::WhatNextRoute,
        label: Some(route.label.clone()),
    }));

    if let Some(content) = RichContent::parse(
        record.rich_content_type.as_deref(),
        record.rich_content.as_deref(),
    ) {
        references.extend(
            content
                .destinations()
                .into_iter()
                .map(|(label, target)| NodeReference {
                    target,
                    origin: EdgeOrigin::RichContentOption,
                    label: Some(label),
                }),
        );
    }
    references
}

/// Derives the edge set of a record sequence.
///
/// The builder never fails. References to numbers outside the given records are
/// dropped; the structural validator reports them independently.
pub struct GraphBuilder<'a> {
    records: &'a [NodeRecord],
}

impl<'a> GraphBuilder<'a> {
    /// `records` may be a whole artifact or one flow's bucket.
    pub fn new(records: &'a [NodeRecord]) -> Self {
        Self { records }
    }

    pub fn build(&self) -> BotGraph {
        let known: AHashSet<i64> = self.records.iter().map(|r| r.number).collect();
        let mut edges = Vec::new();
        let mut dropped = 0usize;

        for record in self.records {
            for reference in node_references(record) {
                if !known.contains(&reference.target) {
                    dropped += 1;
                    debug!(
                        source = record.number,
                        target = reference.target,
                        origin = ?reference.origin,
                        "dropping edge to unknown node"
                    );
                    continue;
                }
                edges.push(Edge {
                    source: record.number,
                    target: reference.target,
                    origin: reference.origin,
                    label: reference.label,
                });
            }
        }

        let mut index = AHashMap::with_capacity(self.records.len());
        for (position, record) in self.records.iter().enumerate() {
            index.entry(record.number).or_insert(position);
        }

        let mut outgoing: AHashMap<i64, Vec<usize>> = AHashMap::new();
        let mut incoming: AHashMap<i64, Vec<usize>> = AHashMap::new();
        for (position, edge) in edges.iter().enumerate() {
            outgoing.entry(edge.source).or_default().push(position);
            incoming.entry(edge.target).or_default().push(position);
        }

        debug!(
            nodes = self.records.len(),
            edges = edges.len(),
            dropped,
            "graph built"
        );
        BotGraph {
            nodes: self.records.to_vec(),
            index,
            edges,
            outgoing,
            incoming,
        }
    }
}
