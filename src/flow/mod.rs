//! Flows: named, contiguous ranges of node numbers.
//!
//! A flow owns every node number in `[start_node, next.start_node)`; the last flow
//! owns up to the system threshold. Numbers below the first flow's start
//! (startup nodes) and system numbers belong to no flow.

use crate::constants::{FLOW_BLOCK_SIZE, SYSTEM_NODE_THRESHOLD};
use crate::error::FlowError;
use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::ops::Range;

mod partition;

pub use partition::{FlowBucket, FlowPartition};

/// A logical unit of conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "startNode")]
    pub start_node: i64,
}

impl FlowDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, start_node: i64) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            start_node,
        }
    }
}

/// A validated, ordered set of flows.
///
/// Descriptors may be given in any order; they are sorted by start node. Two flows
/// sharing a start node, two flows sharing a name, and starts outside
/// `[0, SYSTEM_NODE_THRESHOLD)` are rejected, so ownership ranges never overlap.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlowPlan {
    flows: Vec<FlowDescriptor>,
}

impl FlowPlan {
    pub fn new(flows: impl IntoIterator<Item = FlowDescriptor>) -> Result<Self, FlowError> {
        let mut flows: Vec<FlowDescriptor> = flows.into_iter().collect();
        flows.sort_by_key(|f| f.start_node);

        let mut names = AHashSet::new();
        for flow in &flows {
            if !(0..SYSTEM_NODE_THRESHOLD).contains(&flow.start_node) {
                return Err(FlowError::StartOutOfRange {
                    name: flow.name.clone(),
                    start_node: flow.start_node,
                    threshold: SYSTEM_NODE_THRESHOLD,
                });
            }
            if !names.insert(flow.name.as_str()) {
                return Err(FlowError::DuplicateName(flow.name.clone()));
            }
        }
        if let Some(pair) = flows.windows(2).find(|w| w[0].start_node == w[1].start_node) {
            return Err(FlowError::OverlappingStart {
                first: pair[0].name.clone(),
                second: pair[1].name.clone(),
                start_node: pair[0].start_node,
            });
        }

        Ok(Self { flows })
    }

    /// Appends a flow at the next free block of `FLOW_BLOCK_SIZE` numbers.
    pub fn allocate(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<&FlowDescriptor, FlowError> {
        let name = name.into();
        if self.flows.iter().any(|f| f.name == name) {
            return Err(FlowError::DuplicateName(name));
        }
        let start_node = match self.flows.last() {
            Some(last) => (last.start_node / FLOW_BLOCK_SIZE + 1) * FLOW_BLOCK_SIZE,
            None => FLOW_BLOCK_SIZE,
        };
        if start_node >= SYSTEM_NODE_THRESHOLD {
            return Err(FlowError::RangeExhausted);
        }
        self.flows
            .push(FlowDescriptor::new(name, description, start_node));
        Ok(&self.flows[self.flows.len() - 1])
    }

    pub fn flows(&self) -> &[FlowDescriptor] {
        &self.flows
    }

    pub fn get(&self, name: &str) -> Option<&FlowDescriptor> {
        self.flows.iter().find(|f| f.name == name)
    }

    /// The half-open number range owned by the flow at `index`.
    pub fn range_of(&self, index: usize) -> Option<Range<i64>> {
        let start = self.flows.get(index)?.start_node;
        let end = self
            .flows
            .get(index + 1)
            .map(|next| next.start_node)
            .unwrap_or(SYSTEM_NODE_THRESHOLD);
        Some(start..end)
    }

    /// Index of the flow owning `number`, found by binary search over start nodes.
    pub fn owner_index(&self, number: i64) -> Option<usize> {
        if number < 0 || number >= SYSTEM_NODE_THRESHOLD {
            return None;
        }
        let after = self.flows.partition_point(|f| f.start_node <= number);
        after.checked_sub(1)
    }

    pub fn owner_of(&self, number: i64) -> Option<&FlowDescriptor> {
        self.owner_index(number).map(|i| &self.flows[i])
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}
