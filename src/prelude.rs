//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the kensa crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use kensa::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let csv = std::fs::read_to_string("path/to/bot.csv")?;
//! let inventory = ScriptAnalyzer::new().detect(&csv);
//! println!("{}", ReportFormatter::format_inventory(&inventory));
//! # Ok(())
//! # }
//! ```

// Artifact model
pub use crate::artifact::{Artifact, Column, NodeKind, NodeRecord, RichContent, WhatNextRoute};

// Flows and graph
pub use crate::flow::{FlowDescriptor, FlowPartition, FlowPlan};
pub use crate::graph::{BotGraph, Edge, EdgeOrigin, GraphBuilder};

// Local analysis
pub use crate::scripts::{ScriptAnalyzer, ScriptInventory, ScriptSource, remove_custom_script};
pub use crate::validator::{StructuralValidator, ValidationIssue, ValidationReport, ValidatorConfig};

// Remote collaborators and the repair loop
pub use crate::patch::{PatchRequest, PatchResponse, PatchService};
pub use crate::remote::{
    CompilerMessage, CompilerOutcome, Credential, DeploymentTarget, RemoteCompiler, Submission,
};
pub use crate::repair::{
    RepairConfig, RepairEvent, RepairOrchestrator, RepairOutcome, RepairPhase, RepairReport,
    RepairRequest, SuspendedRepair,
};

// Configuration, errors and formatting
pub use crate::config::KensaConfig;
pub use crate::error::{CompilerError, ConfigError, FlowError, PatchError, RepairError};
pub use crate::report::ReportFormatter;

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
