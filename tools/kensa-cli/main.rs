use clap::{Parser, Subcommand, ValueEnum};
use kensa::config::KensaConfig;
use kensa::flow::FlowDescriptor;
use kensa::patch::ChatPatchService;
use kensa::prelude::*;
use kensa::remote::HttpCompiler;
use kensa::repair::create_event_channel;
use std::fs;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TargetCli {
    Sandbox,
    Production,
}

impl From<TargetCli> for DeploymentTarget {
    fn from(target: TargetCli) -> Self {
        match target {
            TargetCli::Sandbox => DeploymentTarget::Sandbox,
            TargetCli::Production => DeploymentTarget::Production,
        }
    }
}

/// Validate, inspect and repair tabular bot definitions
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Optional JSON configuration file; KENSA_* environment variables override it
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the structural checks
    Validate {
        artifact: String,
        /// Apply the available auto-fixes
        #[arg(long)]
        fix: bool,
        /// Where to write the fixed artifact (stdout when omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Print nodes and their outgoing edges
    Graph {
        artifact: String,
        /// Flow descriptors JSON, needed with --flow
        #[arg(long)]
        flows: Option<String>,
        /// Restrict the graph to one flow's nodes
        #[arg(long)]
        flow: Option<String>,
    },
    /// Assign nodes to flows by number range
    Partition {
        artifact: String,
        /// Flow descriptors JSON: [{"name", "description", "start_node"}]
        #[arg(long)]
        flows: String,
    },
    /// List system and custom scripts
    Scripts {
        artifact: String,
        /// Custom scripts already uploaded, comma separated
        #[arg(long, value_delimiter = ',')]
        uploaded: Vec<String>,
    },
    /// Replace a custom script with the no-op command
    RemoveScript {
        artifact: String,
        name: String,
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Sanitize, fix, submit and patch until the compiler accepts the artifact
    Repair {
        artifact: String,
        #[arg(long)]
        bot_id: String,
        /// Custom script sources as NAME=PATH, repeatable
        #[arg(long = "script")]
        scripts: Vec<String>,
        /// File describing the project, passed to the patch service
        #[arg(long)]
        context: Option<String>,
        #[arg(long, value_enum, default_value = "sandbox")]
        target: TargetCli,
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());

    match cli.command {
        Command::Validate {
            artifact,
            fix,
            output,
        } => run_validate(&config, &artifact, fix, output),
        Command::Graph {
            artifact,
            flows,
            flow,
        } => run_graph(&artifact, flows, flow),
        Command::Partition { artifact, flows } => run_partition(&artifact, &flows),
        Command::Scripts { artifact, uploaded } => {
            let text = read_file(&artifact);
            let inventory = ScriptAnalyzer::with_uploaded(uploaded).detect(&text);
            print!("{}", ReportFormatter::format_inventory(&inventory));
        }
        Command::RemoveScript {
            artifact,
            name,
            output,
        } => {
            let removal = remove_custom_script(&read_file(&artifact), &name);
            eprintln!(
                "Replaced '{}' on {} node(s): {:?}",
                name,
                removal.nodes_modified.len(),
                removal.nodes_modified
            );
            write_output(output, &removal.artifact_text);
        }
        Command::Repair {
            artifact,
            bot_id,
            scripts,
            context,
            target,
            output,
        } => {
            let request = RepairRequest::new(bot_id, read_file(&artifact))
                .with_scripts(scripts.iter().map(|spec| load_script(spec)).collect())
                .with_context(context.map(|path| read_file(&path)).unwrap_or_default())
                .with_target(target.into());
            run_repair(&config, request, output).await;
        }
    }
}

fn run_validate(config: &KensaConfig, path: &str, fix: bool, output: Option<String>) {
    let text = read_file(path);
    let start = Instant::now();
    let validator = StructuralValidator::new(config.validator.clone());
    let report = validator.validate(&text, fix);
    let duration = start.elapsed();

    eprint!("{}", ReportFormatter::format_validation(&report));
    eprintln!("Checked in {:?}", duration);

    if let Some(fixed) = &report.fixed_artifact {
        write_output(output, fixed);
    }
    if !report.valid && !fix {
        std::process::exit(2);
    }
}

fn run_graph(path: &str, flows_path: Option<String>, flow: Option<String>) {
    let artifact = Artifact::parse(&read_file(path));
    let graph = match flow {
        Some(name) => {
            let flows_path = flows_path
                .unwrap_or_else(|| exit_with_error("--flow requires --flows <descriptors.json>"));
            let partition = FlowPartition::new(artifact.records(), &load_plan(&flows_path));
            if partition.bucket(&name).is_none() {
                exit_with_error(&format!("Unknown flow '{}'", name));
            }
            GraphBuilder::new(partition.records_of(&name)).build()
        }
        None => GraphBuilder::new(artifact.records()).build(),
    };
    print!("{}", ReportFormatter::format_graph(&graph));
    println!(
        "{} node(s), {} edge(s)",
        graph.nodes().len(),
        graph.edges().len()
    );
}

fn run_partition(path: &str, flows_path: &str) {
    let artifact = Artifact::parse(&read_file(path));
    let partition = FlowPartition::new(artifact.records(), &load_plan(flows_path));
    print!("{}", ReportFormatter::format_partition(&partition));
}

async fn run_repair(config: &KensaConfig, request: RepairRequest, output: Option<String>) {
    let compiler_config = config
        .compiler_config()
        .unwrap_or_else(|e| exit_with_error(&e.to_string()));
    let patch_config = config
        .patch_config()
        .unwrap_or_else(|e| exit_with_error(&e.to_string()));
    let mut credential = config
        .credential()
        .unwrap_or_else(|_| Credential::new(prompt_for_input("Enter compiler API token", None)));

    let (events, mut receiver) = create_event_channel();
    let progress = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            if let RepairEvent::PhaseEntered {
                iteration, phase, ..
            } = event
            {
                eprintln!("  [{}] {}", iteration, phase);
            }
        }
    });

    let orchestrator = RepairOrchestrator::new(
        Arc::new(HttpCompiler::new(compiler_config)),
        Arc::new(ChatPatchService::new(patch_config)),
    )
    .with_config(config.repair.clone())
    .with_validator(config.validator.clone())
    .with_events(events);

    let start = Instant::now();
    let mut outcome = orchestrator.run(request, &credential).await;
    while let RepairOutcome::NeedsCredential(suspended) = outcome {
        eprintln!(
            "The compiler rejected the token at iteration {}.",
            suspended.iteration()
        );
        credential = Credential::new(prompt_for_input("Enter a new compiler API token", None));
        outcome = orchestrator.resume(suspended, &credential).await;
    }
    drop(orchestrator);
    let _ = progress.await;

    eprint!("{}", ReportFormatter::format_repair(&outcome));
    eprintln!("Finished in {:?}", start.elapsed());
    let report = outcome.report();
    write_output(output, &report.artifact_text);
    if !report.valid {
        std::process::exit(2);
    }
}

fn load_config(path: Option<&str>) -> KensaConfig {
    let config = match path {
        Some(path) => KensaConfig::from_file(path).unwrap_or_else(|e| exit_with_error(&e.to_string())),
        None => KensaConfig::default(),
    };
    config.with_env_overrides()
}

fn load_plan(path: &str) -> FlowPlan {
    let descriptors: Vec<FlowDescriptor> = serde_json::from_str(&read_file(path))
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to parse flows JSON: {}", e)));
    FlowPlan::new(descriptors).unwrap_or_else(|e| exit_with_error(&e.to_string()))
}

fn load_script(spec: &str) -> ScriptSource {
    let (name, path) = spec
        .split_once('=')
        .unwrap_or_else(|| exit_with_error(&format!("Expected NAME=PATH, got '{}'", spec)));
    ScriptSource::new(name.trim(), read_file(path.trim()))
}

fn read_file(path: &str) -> String {
    fs::read_to_string(path)
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to read '{}': {}", path, e)))
}

fn write_output(path: Option<String>, text: &str) {
    match path {
        Some(path) => fs::write(&path, text)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to write '{}': {}", path, e))),
        None => print!("{}", text),
    }
}

/// A helper function to prompt the user and read a line of input.
fn prompt_for_input(prompt_text: &str, default: Option<&str>) -> String {
    let mut line = String::new();
    let default_prompt = default.map_or("".to_string(), |d| format!(" [default: {}]", d));

    eprint!("> {}{}: ", prompt_text, default_prompt);
    let _ = io::stderr().flush();

    if let Err(e) = io::stdin().read_line(&mut line) {
        exit_with_error(&format!("Failed to read input: {}", e));
    }
    let trimmed = line.trim().to_string();

    if trimmed.is_empty() {
        default.unwrap_or("").to_string()
    } else {
        trimmed
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
