use clap::Parser;
use kensa::artifact::{Artifact, Column, NodeKind, NodeRecord};
use kensa::constants::DEFAULT_FALLBACK_NODE;
use kensa::flow::FlowPlan;
use rand::Rng;
use rand::rngs::ThreadRng;
use std::fs;

const SYSTEM_STEPS: &[&str] = &["SetVar", "GetValue", "ValidateEmail", "SendEmail"];
const CUSTOM_STEPS: &[&str] = &["SendInvoice", "LookupOrder", "CreateTicket"];

/// A CLI tool to generate synthetic bot artifacts for the kensa validator
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// The path to write the generated CSV file to
    #[arg(short, long, default_value = "generated_bot.csv")]
    output: String,

    /// Where to write the matching flow descriptors JSON
    #[arg(long, default_value = "generated_flows.json")]
    flows_output: String,

    /// Number of flows to generate
    #[arg(long, default_value_t = 3)]
    flows: usize,

    /// Minimum number of nodes per flow
    #[arg(long, default_value_t = 3)]
    min: usize,

    /// Maximum number of nodes per flow (below the block size)
    #[arg(long, default_value_t = 12)]
    max: usize,

    /// Number of structural defects to inject
    #[arg(long, default_value_t = 0)]
    defects: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut rng = rand::rng();

    if cli.min == 0 || cli.min > cli.max || cli.max >= 100 {
        eprintln!(
            "Error: expected 0 < --min ({}) <= --max ({}) < 100",
            cli.min, cli.max
        );
        std::process::exit(1);
    }

    println!(
        "Generating {} flow(s) with {} to {} nodes each...",
        cli.flows, cli.min, cli.max
    );

    let mut plan = FlowPlan::default();
    for index in 0..cli.flows {
        plan.allocate(format!("flow_{}", index + 1), format!("Generated flow {}", index + 1))?;
    }

    let mut records = vec![
        NodeRecord::new(1, NodeKind::Decision, "Welcome")
            .with_message("Hi! How can I help you today?")
            .with_next_nodes(plan.flows().first().map(|f| f.start_node)),
    ];
    let starts: Vec<i64> = plan.flows().iter().map(|f| f.start_node).collect();
    for (index, start) in starts.iter().enumerate() {
        let count = rng.random_range(cli.min..=cli.max);
        let exit = starts.get(index + 1).copied();
        records.extend(generate_flow(&mut rng, *start, count, exit));
        println!("-> Generated {} node(s) for flow starting at {}.", count, start);
    }
    records.push(
        NodeRecord::new(DEFAULT_FALLBACK_NODE, NodeKind::Action, "Error handler")
            .with_command("HandleBotError")
            .with_route("error", 1),
    );

    for _ in 0..cli.defects {
        let description = inject_defect(&mut rng, &mut records);
        println!("-> Injected defect: {}", description);
    }

    fs::write(&cli.output, Artifact::from_records(records).to_csv())?;
    fs::write(&cli.flows_output, serde_json::to_string_pretty(plan.flows())?)?;

    println!(
        "Successfully wrote '{}' and '{}'",
        cli.output, cli.flows_output
    );
    Ok(())
}

/// A chain of nodes from `start`. The last node continues to `exit` or is tagged as an end.
fn generate_flow(rng: &mut ThreadRng, start: i64, count: usize, exit: Option<i64>) -> Vec<NodeRecord> {
    let mut records = Vec::with_capacity(count);
    for offset in 0..count as i64 {
        let number = start + offset;
        let is_last = offset == count as i64 - 1;
        let next = if is_last { exit } else { Some(number + 1) };

        let record = if !is_last && rng.random_bool(0.3) {
            let command = if rng.random_bool(0.25) {
                CUSTOM_STEPS[rng.random_range(0..CUSTOM_STEPS.len())]
            } else {
                SYSTEM_STEPS[rng.random_range(0..SYSTEM_STEPS.len())]
            };
            NodeRecord::new(number, NodeKind::Action, format!("Step {}", number))
                .with_command(command)
                .with_route("success", number + 1)
                .with_route("error", DEFAULT_FALLBACK_NODE)
        } else {
            let record = NodeRecord::new(number, NodeKind::Decision, format!("Ask {}", number))
                .with_message(format!("Question {}, please answer", number))
                .with_next_nodes(next);
            if next.is_none() {
                record.with_column(Column::NodeTags, "end")
            } else {
                record
            }
        };
        records.push(record);
    }
    records
}

fn inject_defect(rng: &mut ThreadRng, records: &mut [NodeRecord]) -> String {
    let index = rng.random_range(1..records.len().saturating_sub(1).max(2));
    let Some(record) = records.get_mut(index) else {
        return "none (artifact too small)".to_string();
    };
    match rng.random_range(0..3) {
        0 => {
            let target = 90_000 + rng.random_range(0..999);
            record.next_nodes.push(target);
            format!("node {} points to missing node {}", record.number, target)
        }
        1 if record.kind == NodeKind::Action => {
            record.what_next.retain(|r| r.label != "error");
            format!("node {} lost its error route", record.number)
        }
        _ => {
            record.message = None;
            record.rich_content = None;
            if record.kind == NodeKind::Action {
                record.command = None;
            }
            format!("node {} lost its required content", record.number)
        }
    }
}
