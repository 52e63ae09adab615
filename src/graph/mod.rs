//! The conversation graph: node records plus the labeled edges derived from their
//! next-node lists, what-next tables and rich-content options.

use crate::artifact::NodeRecord;
use crate::constants::EDGE_LABEL_DISPLAY_LEN;
use ahash::AHashMap;
use std::fmt;

mod builder;

pub use builder::{GraphBuilder, NodeReference, node_references};

/// Which column an edge was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeOrigin {
    NextNode,
    WhatNextRoute,
    RichContentOption,
}

impl fmt::Display for EdgeOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeOrigin::NextNode => write!(f, "next-node"),
            EdgeOrigin::WhatNextRoute => write!(f, "what-next"),
            EdgeOrigin::RichContentOption => write!(f, "rich-content"),
        }
    }
}

/// A directed edge. `label` holds the full route or option label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub source: i64,
    pub target: i64,
    pub origin: EdgeOrigin,
    pub label: Option<String>,
}

impl Edge {
    /// The label shortened for display. The stored label is never truncated.
    pub fn display_label(&self) -> Option<String> {
        let label = self.label.as_deref()?;
        if label.chars().count() <= EDGE_LABEL_DISPLAY_LEN {
            return Some(label.to_string());
        }
        let short: String = label.chars().take(EDGE_LABEL_DISPLAY_LEN - 3).collect();
        Some(format!("{}...", short))
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} [{}", self.source, self.target, self.origin)?;
        if let Some(label) = self.display_label() {
            write!(f, ": {}", label)?;
        }
        write!(f, "]")
    }
}

/// An immutable snapshot of nodes and edges. Every edge target is a node of the
/// graph. Repairs never touch a graph; they edit the artifact and rebuild.
#[derive(Debug, Clone)]
pub struct BotGraph {
    nodes: Vec<NodeRecord>,
    index: AHashMap<i64, usize>,
    edges: Vec<Edge>,
    /// Edge positions by source and by target, each in edge order.
    outgoing: AHashMap<i64, Vec<usize>>,
    incoming: AHashMap<i64, Vec<usize>>,
}

impl BotGraph {
    pub fn nodes(&self) -> &[NodeRecord] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, number: i64) -> Option<&NodeRecord> {
        self.index.get(&number).map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, number: i64) -> bool {
        self.index.contains_key(&number)
    }

    /// Outgoing edges in declaration order (left-to-right branch order).
    pub fn edges_from(&self, number: i64) -> impl Iterator<Item = &Edge> {
        self.adjacent(&self.outgoing, number)
    }

    pub fn edges_to(&self, number: i64) -> impl Iterator<Item = &Edge> {
        self.adjacent(&self.incoming, number)
    }

    fn adjacent<'a>(
        &'a self,
        adjacency: &'a AHashMap<i64, Vec<usize>>,
        number: i64,
    ) -> impl Iterator<Item = &'a Edge> {
        adjacency
            .get(&number)
            .into_iter()
            .flatten()
            .map(move |&position| &self.edges[position])
    }

    pub fn successors(&self, number: i64) -> Vec<i64> {
        let mut out: Vec<i64> = Vec::new();
        for edge in self.edges_from(number) {
            if !out.contains(&edge.target) {
                out.push(edge.target);
            }
        }
        out
    }

    pub fn predecessors(&self, number: i64) -> Vec<i64> {
        let mut out: Vec<i64> = Vec::new();
        for edge in self.edges_to(number) {
            if !out.contains(&edge.source) {
                out.push(edge.source);
            }
        }
        out
    }

    pub fn in_degree(&self, number: i64) -> usize {
        self.incoming.get(&number).map_or(0, Vec::len)
    }

    pub fn out_degree(&self, number: i64) -> usize {
        self.outgoing.get(&number).map_or(0, Vec::len)
    }
}
