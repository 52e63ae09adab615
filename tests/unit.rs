//! Unit tests for the smaller building blocks of kensa.
mod common;
use common::sample_records;
use kensa::cache::{Fingerprint, PreviewCache};
use kensa::prelude::*;
use kensa::repair::sanitize;
use std::time::Duration;

#[test]
fn test_fingerprint_is_stable_and_part_sensitive() {
    let a = Fingerprint::new("billing", "Invoices", "ACME support bot");
    let b = Fingerprint::new("billing", "Invoices", "ACME support bot");
    assert_eq!(a, b);
    assert_eq!(a.as_str().len(), 64);
    assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));

    // Moving text across part boundaries yields a different key.
    assert_ne!(
        Fingerprint::new("ab", "c", ""),
        Fingerprint::new("a", "bc", "")
    );
    assert_ne!(a, Fingerprint::new("billing", "Invoices", "Other bot"));
}

#[test]
fn test_preview_cache_generates_once() {
    let mut cache: PreviewCache<String> = PreviewCache::new();
    let key = Fingerprint::new("faq", "", "");
    let mut calls = 0;

    for _ in 0..3 {
        let value = cache.get_or_insert_with(key.clone(), || {
            calls += 1;
            "preview".to_string()
        });
        assert_eq!(value, "preview");
    }
    assert_eq!(calls, 1);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.remove(&key).as_deref(), Some("preview"));
    assert!(cache.is_empty());
}

#[test]
fn test_error_display() {
    let flow = FlowError::OverlappingStart {
        first: "billing".to_string(),
        second: "support".to_string(),
        start_node: 200,
    };
    assert!(flow.to_string().contains("billing"));
    assert!(flow.to_string().contains("200"));

    let exhausted = RepairError::RetryBudgetExhausted {
        attempts: 6,
        last: "connection reset".to_string(),
    };
    assert!(exhausted.to_string().contains('6'));
    assert!(exhausted.to_string().contains("connection reset"));

    let patch: RepairError = PatchError::Unauthorized("bad key".to_string()).into();
    assert!(patch.to_string().starts_with("Patch service failed"));
}

#[test]
fn test_transient_classification() {
    assert!(CompilerError::Network("reset".into()).is_transient());
    assert!(CompilerError::Timeout(Duration::from_secs(1)).is_transient());
    assert!(!CompilerError::Protocol("bad".into()).is_transient());

    let server_side = PatchError::Api {
        status: 502,
        message: String::new(),
    };
    let client_side = PatchError::Api {
        status: 400,
        message: String::new(),
    };
    assert!(server_side.is_transient());
    assert!(!client_side.is_transient());
    assert!(!PatchError::Malformed("no csv".into()).is_transient());
}

#[test]
fn test_sanitize_strips_invisible_characters() {
    let dirty = "\u{feff}1,D,Start\r\n2,D,Hi\u{00a0}there\u{200b}\u{0007}\r3,D,End\tTab\n";
    let clean = sanitize(dirty);

    assert_eq!(clean.text, "1,D,Start\n2,D,Hi there\n3,D,End\tTab\n");
    assert!(clean.changed());
    assert_eq!(clean.replaced, 1);
    assert_eq!(clean.line_endings, 2);
    assert!(clean.describe().unwrap().starts_with("Sanitized artifact"));

    let again = sanitize(&clean.text);
    assert!(!again.changed());
    assert_eq!(again.describe(), None);
}

#[test]
fn test_transient_backoff_is_capped() {
    let config = RepairConfig::default();
    assert_eq!(config.transient_backoff(1), Duration::from_secs(2));
    assert_eq!(config.transient_backoff(3), Duration::from_secs(8));
    assert_eq!(config.transient_backoff(40), Duration::from_secs(60));
}

#[test]
fn test_phase_terminality() {
    assert!(RepairPhase::Done.is_terminal());
    assert!(RepairPhase::Cancelled.is_terminal());
    assert!(!RepairPhase::NeedsCredential.is_terminal());
    assert!(!RepairPhase::Patching.is_terminal());
    assert_eq!(RepairPhase::RemoteValidating.to_string(), "remote-validating");
}

#[test]
fn test_credential_debug_is_redacted() {
    let credential = Credential::new("super-secret");
    assert_eq!(credential.token(), "super-secret");
    assert!(!format!("{:?}", credential).contains("super-secret"));
}

#[test]
fn test_config_file_errors() {
    let missing = KensaConfig::from_file("/definitely/not/here.json").unwrap_err();
    assert!(matches!(missing, ConfigError::Io { .. }));

    let malformed = KensaConfig::from_json("{ not json").unwrap_err();
    assert!(matches!(malformed, ConfigError::Parse(_)));

    let config = KensaConfig::from_json(r#"{"compiler": {"target": "production"}}"#).unwrap();
    assert_eq!(config.compiler.target, DeploymentTarget::Production);
    assert_eq!(config.repair, RepairConfig::default());
}

#[test]
fn test_format_validation() {
    let valid = ValidationReport {
        valid: true,
        ..Default::default()
    };
    assert_eq!(
        ReportFormatter::format_validation(&valid),
        "Artifact is structurally valid.\n"
    );

    let report = StructuralValidator::default().validate(
        &Artifact::from_records([
            NodeRecord::new(1, NodeKind::Decision, "Start")
                .with_message("Hi")
                .with_next_nodes([2, 3, 4]),
            NodeRecord::new(2, NodeKind::Decision, "End")
                .with_message("Bye")
                .with_column(Column::NodeTags, "end"),
        ])
        .to_csv(),
        true,
    );
    let text = ReportFormatter::format_validation(&report);
    assert!(text.starts_with("2 issue(s) found, 2 auto-fixable:"));
    assert!(text.contains("[fixable] Node 1 [Next Nodes]"));
    assert!(text.contains("Applied 2 fix(es):"));
}

#[test]
fn test_format_graph_lists_edges_under_nodes() {
    let graph = GraphBuilder::new(&sample_records()).build();
    let text = ReportFormatter::format_graph(&graph);

    assert!(text.starts_with("1 D Welcome\n    1 -> 100 [next-node]\n"));
    assert!(text.contains("    101 -> 102 [what-next: success]\n"));
}

#[test]
fn test_format_partition_and_inventory() {
    let plan = FlowPlan::new([FlowDescriptor::new("main", "", 100)]).unwrap();
    let records = sample_records();
    let text = ReportFormatter::format_partition(&FlowPartition::new(&records, &plan));
    assert_eq!(
        text,
        "main (from 100): 3 node(s) [100, 101, 102]\nunassigned: 2 node(s) [1, 99990]\n"
    );

    let inventory = ScriptAnalyzer::new().detect_records(&records);
    let text = ReportFormatter::format_inventory(&inventory);
    assert!(text.contains("System commands: ValidateEmail, HandleBotError"));
    assert!(text.contains("Custom commands: (none)"));
}

#[test]
fn test_format_repair_outcomes() {
    let report = RepairReport {
        iterations: 2,
        version_id: Some("v9".to_string()),
        fixes_applied: vec!["Node 1: added message".to_string()],
        ..Default::default()
    };
    let text = ReportFormatter::format_repair(&RepairOutcome::Done(report.clone()));
    assert!(text.starts_with("Accepted as version v9 after 2 iteration(s)."));
    assert!(text.contains("  - Node 1: added message"));

    let text = ReportFormatter::format_repair(&RepairOutcome::Failed {
        report,
        error: RepairError::Compiler(CompilerError::Protocol("unexpected status 404".into())),
    });
    assert!(text.starts_with("Failed: Remote compiler failed"));
}
