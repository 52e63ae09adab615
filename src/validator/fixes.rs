use crate::artifact::{Artifact, WhatNextRoute};
use crate::constants::ERROR_ROUTE_LABEL;
use tracing::debug;

/// A deterministic edit of one record, addressed by its position in the artifact.
///
/// Positions rather than node numbers are used so duplicated numbers can never
/// redirect a fix to the wrong row. No fix changes a node number or removes a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Fix {
    DropNextNode {
        position: usize,
        target: i64,
    },
    RepointNextNode {
        position: usize,
        from: i64,
        to: i64,
    },
    RepointRoute {
        position: usize,
        label: String,
        from: i64,
        to: i64,
    },
    InsertErrorRoute {
        position: usize,
        to: i64,
    },
}

impl Fix {
    fn position(&self) -> usize {
        match self {
            Fix::DropNextNode { position, .. }
            | Fix::RepointNextNode { position, .. }
            | Fix::RepointRoute { position, .. }
            | Fix::InsertErrorRoute { position, .. } => *position,
        }
    }

    /// Applies the edit. Returns a description when the record actually changed.
    pub(super) fn apply(&self, artifact: &mut Artifact) -> Option<String> {
        let record = artifact.record_at_mut(self.position())?;
        let node = record.number;

        match self {
            Fix::DropNextNode { target, .. } => {
                let index = record.next_nodes.iter().position(|n| n == target)?;
                record.next_nodes.remove(index);
                Some(format!("Node {}: removed dangling next node {}", node, target))
            }
            Fix::RepointNextNode { from, to, .. } => {
                let slot = record.next_nodes.iter_mut().find(|n| **n == *from)?;
                *slot = *to;
                Some(format!(
                    "Node {}: re-pointed dangling next node {} to {}",
                    node, from, to
                ))
            }
            Fix::RepointRoute {
                label, from, to, ..
            } => {
                let route = record
                    .what_next
                    .iter_mut()
                    .find(|r| r.label == *label && r.target == *from)?;
                route.target = *to;
                Some(format!(
                    "Node {}: re-pointed route '{}' from {} to {}",
                    node, label, from, to
                ))
            }
            Fix::InsertErrorRoute { to, .. } => {
                if record
                    .what_next
                    .iter()
                    .any(|r| r.label.eq_ignore_ascii_case(ERROR_ROUTE_LABEL))
                {
                    return None;
                }
                record.what_next.push(WhatNextRoute {
                    label: ERROR_ROUTE_LABEL.to_string(),
                    target: *to,
                });
                Some(format!(
                    "Node {}: added '{}' route to {}",
                    node, ERROR_ROUTE_LABEL, to
                ))
            }
        }
    }
}

/// Applies fixes in order, collecting the descriptions of the ones that took effect.
pub(super) fn apply_all<'a>(
    artifact: &mut Artifact,
    fixes: impl IntoIterator<Item = &'a Fix>,
) -> Vec<String> {
    let mut applied = Vec::new();
    for fix in fixes {
        match fix.apply(artifact) {
            Some(description) => {
                debug!(%description, "auto-fix applied");
                applied.push(description);
            }
            None => debug!(?fix, "auto-fix had nothing to change"),
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{NodeKind, NodeRecord};

    fn artifact() -> Artifact {
        Artifact::from_records([NodeRecord::new(105, NodeKind::Decision, "Ask")
            .with_message("Hi")
            .with_next_nodes([999, 999])])
    }

    #[test]
    fn repoint_then_drop_handles_repeated_targets() {
        let mut artifact = artifact();
        let fixes = [
            Fix::RepointNextNode {
                position: 0,
                from: 999,
                to: 106,
            },
            Fix::DropNextNode {
                position: 0,
                target: 999,
            },
        ];
        let applied = apply_all(&mut artifact, &fixes);
        assert_eq!(applied.len(), 2);
        assert_eq!(artifact.records()[0].next_nodes, vec![106]);
    }

    #[test]
    fn error_route_is_not_inserted_twice() {
        let mut artifact = artifact();
        let fix = Fix::InsertErrorRoute { position: 0, to: 1 };
        assert!(fix.apply(&mut artifact).is_some());
        assert!(fix.apply(&mut artifact).is_none());
        assert_eq!(artifact.records()[0].what_next.len(), 1);
    }

    #[test]
    fn out_of_range_position_is_ignored() {
        let mut artifact = artifact();
        let fix = Fix::DropNextNode {
            position: 7,
            target: 999,
        };
        assert!(fix.apply(&mut artifact).is_none());
    }
}
