use super::{FlowDescriptor, FlowPlan};
use crate::artifact::NodeRecord;

/// The records owned by one flow, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowBucket {
    pub flow: FlowDescriptor,
    pub records: Vec<NodeRecord>,
}

/// The result of assigning records to flows.
///
/// Pure and deterministic: the same records and plan always produce the same
/// buckets, in plan order. Startup and system records land in `unassigned` and
/// never in a flow bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowPartition {
    buckets: Vec<FlowBucket>,
    unassigned: Vec<NodeRecord>,
}

impl FlowPartition {
    pub fn new(records: &[NodeRecord], plan: &FlowPlan) -> Self {
        let mut buckets: Vec<FlowBucket> = plan
            .flows()
            .iter()
            .map(|flow| FlowBucket {
                flow: flow.clone(),
                records: Vec::new(),
            })
            .collect();
        let mut unassigned = Vec::new();

        for record in records {
            match plan.owner_index(record.number) {
                Some(index) => buckets[index].records.push(record.clone()),
                None => unassigned.push(record.clone()),
            }
        }

        Self {
            buckets,
            unassigned,
        }
    }

    pub fn buckets(&self) -> &[FlowBucket] {
        &self.buckets
    }

    pub fn bucket(&self, name: &str) -> Option<&FlowBucket> {
        self.buckets.iter().find(|b| b.flow.name == name)
    }

    /// Records owned by the named flow; empty when the flow is unknown.
    pub fn records_of(&self, name: &str) -> &[NodeRecord] {
        self.bucket(name).map(|b| b.records.as_slice()).unwrap_or(&[])
    }

    /// Startup and system records.
    pub fn unassigned(&self) -> &[NodeRecord] {
        &self.unassigned
    }
}
