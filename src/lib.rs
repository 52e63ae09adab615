//! # Kensa - Validation and Repair for Tabular Bot Definitions
//!
//! **Kensa** reads the flat CSV artifact a conversational-bot runtime compiles,
//! turns it into a graph of Decision and Action nodes, checks it locally, and drives
//! it to acceptance by the runtime's authoritative compiler with AI-directed patches.
//!
//! ## Core Workflow
//!
//! 1.  **Parse**: [`artifact::Artifact::parse`] turns text into ordered [`artifact::NodeRecord`]s.
//!     Malformed rows are skipped, never fatal, and untouched rows serialize back verbatim.
//! 2.  **Partition**: a [`flow::FlowPlan`] assigns node numbers to named flows by range.
//! 3.  **Build the graph**: [`graph::GraphBuilder`] derives labeled edges from next-node
//!     lists, what-next routes and rich-content option destinations.
//! 4.  **Validate**: [`validator::StructuralValidator`] reports dangling references, missing
//!     fields, orphans and dead ends, and applies conservative fixes on request.
//! 5.  **Repair**: [`repair::RepairOrchestrator`] sanitizes, fixes, submits to a
//!     [`remote::RemoteCompiler`] and patches through a [`patch::PatchService`] until the
//!     artifact is accepted or the iteration budget runs out.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kensa::prelude::*;
//!
//! let csv = std::fs::read_to_string("bot.csv")?;
//!
//! let validator = StructuralValidator::default();
//! let report = validator.validate(&csv, true);
//! println!("{}", ReportFormatter::format_validation(&report));
//!
//! if let Some(fixed) = report.fixed_artifact {
//!     let graph = GraphBuilder::new(Artifact::parse(&fixed).records()).build();
//!     println!("{} nodes, {} edges", graph.nodes().len(), graph.edges().len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The library never installs a `tracing` subscriber; binaries decide how logs are shown.

pub mod artifact;
pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod flow;
pub mod graph;
pub mod patch;
pub mod prelude;
pub mod remote;
pub mod repair;
pub mod report;
pub mod scripts;
pub mod validator;
