//! Classification of Action-node commands into runtime-provided and custom scripts.

use crate::artifact::{Artifact, NodeKind, NodeRecord};
use crate::constants::{NOOP_COMMAND, SYSTEM_COMMANDS};
use crate::repair::RepairReport;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScriptClass {
    System,
    Custom,
}

/// Classifies a command by exact, case-sensitive membership in the system allow-list.
pub fn classify(command: &str) -> ScriptClass {
    if SYSTEM_COMMANDS.contains(&command) {
        ScriptClass::System
    } else {
        ScriptClass::Custom
    }
}

/// A command used by the artifact, with the nodes that call it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptReference {
    pub name: String,
    pub class: ScriptClass,
    /// Always false for system commands.
    pub uploaded: bool,
    pub nodes: Vec<i64>,
}

/// The source of a custom script, shipped to the compiler with the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSource {
    pub name: String,
    pub source: String,
}

impl ScriptSource {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Result of [`ScriptAnalyzer::detect`]. Names appear in first-use order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ScriptInventory {
    pub system_commands: Vec<String>,
    pub custom_commands: Vec<String>,
    /// Custom commands with no confirmed upload.
    pub missing_uploads: Vec<String>,
    /// Uploaded scripts no Action node refers to any more, sorted by name.
    pub unused_uploads: Vec<String>,
    pub references: Vec<ScriptReference>,
}

/// Result of [`remove_custom_script`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRemoval {
    pub artifact_text: String,
    pub nodes_modified: Vec<i64>,
}

/// Tracks which custom scripts the compiler has accepted and computes the upload delta.
#[derive(Debug, Clone, Default)]
pub struct ScriptAnalyzer {
    uploaded: BTreeSet<String>,
}

impl ScriptAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_uploaded<I, S>(uploaded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            uploaded: uploaded.into_iter().map(Into::into).collect(),
        }
    }

    /// Records that the compiler accepted this script's source.
    pub fn mark_uploaded(&mut self, name: impl Into<String>) {
        self.uploaded.insert(name.into());
    }

    /// Marks every custom script shipped with an accepted repair as uploaded.
    /// Reports of unaccepted artifacts change nothing. Returns how many names
    /// were new.
    pub fn record_accepted(&mut self, report: &RepairReport) -> usize {
        if !report.valid {
            return 0;
        }
        let mut added = 0;
        for name in &report.accepted_scripts {
            if classify(name) == ScriptClass::Custom && self.uploaded.insert(name.clone()) {
                added += 1;
            }
        }
        added
    }

    pub fn forget_upload(&mut self, name: &str) -> bool {
        self.uploaded.remove(name)
    }

    pub fn is_uploaded(&self, name: &str) -> bool {
        self.uploaded.contains(name)
    }

    pub fn detect(&self, artifact_text: &str) -> ScriptInventory {
        self.detect_records(Artifact::parse(artifact_text).records())
    }

    pub fn detect_records(&self, records: &[NodeRecord]) -> ScriptInventory {
        let mut references: Vec<ScriptReference> = Vec::new();
        for record in records.iter().filter(|r| r.kind == NodeKind::Action) {
            let Some(name) = record.command.as_deref().map(str::trim) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            match references.iter_mut().find(|r| r.name == name) {
                Some(reference) => reference.nodes.push(record.number),
                None => {
                    let class = classify(name);
                    references.push(ScriptReference {
                        name: name.to_string(),
                        class,
                        uploaded: class == ScriptClass::Custom && self.is_uploaded(name),
                        nodes: vec![record.number],
                    });
                }
            }
        }

        let names_of = |class: ScriptClass| -> Vec<String> {
            references
                .iter()
                .filter(|r| r.class == class)
                .map(|r| r.name.clone())
                .collect()
        };

        let inventory = ScriptInventory {
            system_commands: names_of(ScriptClass::System),
            custom_commands: names_of(ScriptClass::Custom),
            missing_uploads: references
                .iter()
                .filter(|r| r.class == ScriptClass::Custom && !r.uploaded)
                .map(|r| r.name.clone())
                .collect(),
            unused_uploads: self
                .uploaded
                .iter()
                .filter(|name| !references.iter().any(|r| &r.name == *name))
                .cloned()
                .collect(),
            references,
        };

        debug!(
            system = inventory.system_commands.len(),
            custom = inventory.custom_commands.len(),
            missing = inventory.missing_uploads.len(),
            "scripts detected"
        );
        inventory
    }
}

/// Replaces a custom command with the no-op command on every Action node that uses it.
///
/// Only those nodes are re-encoded; every other row is written back untouched.
/// System commands are never removed.
pub fn remove_custom_script(artifact_text: &str, name: &str) -> ScriptRemoval {
    let mut artifact = Artifact::parse(artifact_text);
    let nodes_modified = remove_from_artifact(&mut artifact, name);
    ScriptRemoval {
        artifact_text: artifact.to_csv(),
        nodes_modified,
    }
}

/// In-place variant of [`remove_custom_script`].
pub fn remove_from_artifact(artifact: &mut Artifact, name: &str) -> Vec<i64> {
    let name = name.trim();
    if classify(name) == ScriptClass::System {
        warn!(script = name, "refusing to remove a system command");
        return Vec::new();
    }

    let positions: Vec<usize> = artifact
        .records()
        .iter()
        .positions(|r| {
            r.kind == NodeKind::Action && r.command.as_deref().map(str::trim) == Some(name)
        })
        .collect();

    let mut nodes_modified = Vec::with_capacity(positions.len());
    for position in positions {
        if let Some(record) = artifact.record_at_mut(position) {
            record.command = Some(NOOP_COMMAND.to_string());
            nodes_modified.push(record.number);
        }
    }
    debug!(script = name, nodes = ?nodes_modified, "custom script removed");
    nodes_modified
}
