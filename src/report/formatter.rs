use crate::flow::FlowPartition;
use crate::graph::BotGraph;
use crate::repair::{RepairOutcome, RepairReport};
use crate::scripts::ScriptInventory;
use crate::validator::ValidationReport;
use itertools::Itertools;
use std::fmt::Write;

/// Formats validation, repair and analysis results into human-readable text.
pub struct ReportFormatter;

impl ReportFormatter {
    pub fn format_validation(report: &ValidationReport) -> String {
        let mut out = String::new();
        if report.valid {
            out.push_str("Artifact is structurally valid.\n");
        } else {
            let _ = writeln!(
                out,
                "{} issue(s) found, {} auto-fixable:",
                report.issues.len(),
                report.fixable_count()
            );
            for issue in &report.issues {
                let marker = if issue.auto_fixable { "fixable" } else { "manual" };
                let _ = writeln!(out, "  [{}] {}", marker, issue);
            }
        }
        if !report.applied_fixes.is_empty() {
            let _ = writeln!(out, "Applied {} fix(es):", report.applied_fixes.len());
            for fix in &report.applied_fixes {
                let _ = writeln!(out, "  - {}", fix);
            }
        }
        out
    }

    pub fn format_repair(outcome: &RepairOutcome) -> String {
        let mut out = String::new();
        match outcome {
            RepairOutcome::Done(report) => {
                let _ = writeln!(
                    out,
                    "Accepted as version {} after {} iteration(s).",
                    report.version_id.as_deref().unwrap_or("?"),
                    report.iterations
                );
                Self::push_report_body(&mut out, report);
            }
            RepairOutcome::Exhausted(report) => {
                let _ = writeln!(
                    out,
                    "Gave up after {} iteration(s); the last submitted artifact is kept.",
                    report.iterations
                );
                Self::push_report_body(&mut out, report);
            }
            RepairOutcome::Cancelled(report) => {
                let _ = writeln!(out, "Cancelled at iteration {}.", report.iterations);
                Self::push_report_body(&mut out, report);
            }
            RepairOutcome::Failed { report, error } => {
                let _ = writeln!(out, "Failed: {}", error);
                Self::push_report_body(&mut out, report);
            }
            RepairOutcome::NeedsCredential(suspended) => {
                let _ = writeln!(
                    out,
                    "Suspended at iteration {}: the compiler rejected the credential.",
                    suspended.iteration()
                );
            }
        }
        out
    }

    fn push_report_body(out: &mut String, report: &RepairReport) {
        if !report.fixes_applied.is_empty() {
            let _ = writeln!(out, "Fixes:");
            for fix in &report.fixes_applied {
                let _ = writeln!(out, "  - {}", fix);
            }
        }
        if !report.accepted_scripts.is_empty() {
            let _ = writeln!(out, "Uploaded scripts: {}", report.accepted_scripts.join(", "));
        }
        if !report.remaining_errors.is_empty() {
            let _ = writeln!(out, "Remaining errors:");
            for error in &report.remaining_errors {
                let _ = writeln!(out, "  - {}", error);
            }
        }
    }

    pub fn format_inventory(inventory: &ScriptInventory) -> String {
        let list = |names: &[String]| {
            if names.is_empty() {
                "(none)".to_string()
            } else {
                names.join(", ")
            }
        };
        format!(
            "System commands: {}\nCustom commands: {}\nMissing uploads: {}\nUnused uploads:  {}\n",
            list(&inventory.system_commands),
            list(&inventory.custom_commands),
            list(&inventory.missing_uploads),
            list(&inventory.unused_uploads),
        )
    }

    pub fn format_partition(partition: &FlowPartition) -> String {
        let mut out = String::new();
        for bucket in partition.buckets() {
            let numbers = bucket.records.iter().map(|r| r.number).join(", ");
            let _ = writeln!(
                out,
                "{} (from {}): {} node(s) [{}]",
                bucket.flow.name,
                bucket.flow.start_node,
                bucket.records.len(),
                numbers
            );
        }
        let unassigned = partition.unassigned().iter().map(|r| r.number).join(", ");
        let _ = writeln!(
            out,
            "unassigned: {} node(s) [{}]",
            partition.unassigned().len(),
            unassigned
        );
        out
    }

    /// One line per node with its outgoing edges, in declaration order.
    pub fn format_graph(graph: &BotGraph) -> String {
        let mut out = String::new();
        for node in graph.nodes() {
            let _ = writeln!(out, "{} {} {}", node.number, node.kind.code(), node.name);
            for edge in graph.edges_from(node.number) {
                let _ = writeln!(out, "    {}", edge);
            }
        }
        out
    }
}
