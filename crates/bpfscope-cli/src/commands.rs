use bpfscope_core::ops::{execute, EntryVerb, Operation, Outcome};
use bpfscope_core::{render_json, render_text, status_line, ParseError, ToolConfig};
use bpfscope_sys::LinuxKernel;
use bpfscope_types::Namespace;
use colored::Colorize;
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let op = build_operation(&cli.command)?;
    debug!(?op, "parsed command");

    let kernel = LinuxKernel::with_paths(
        config.possible_cpus_path.clone(),
        config.proc_fd_dir.clone(),
    );
    let outcome = execute(&kernel, &config, &op)?;
    print_outcome(&outcome, config.output)
}

fn load_config(cli: &Cli) -> anyhow::Result<ToolConfig> {
    let mut config = ToolConfig::load(cli.config.as_deref())?;
    if let Some(format) = cli.format {
        config.output = format.into();
    }
    Ok(config)
}

impl From<OutputFormat> for bpfscope_core::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => Self::Text,
            OutputFormat::Json => Self::Json,
        }
    }
}

/// Turn the free-form arguments of a subcommand into an operation.
pub fn build_operation(command: &Command) -> Result<Operation, ParseError> {
    match command {
        Command::Prog(cmd) => match cmd {
            ProgCommand::Show(t) => Operation::show(Namespace::Program, &t.args),
            ProgCommand::Dump(t) => Operation::dump_insns(&t.args),
            ProgCommand::Pin(t) => Operation::pin(Namespace::Program, &t.args),
        },
        Command::Map(cmd) => match cmd {
            MapCommand::Show(t) => Operation::show(Namespace::Map, &t.args),
            MapCommand::Dump(t) => Operation::dump_map(&t.args),
            MapCommand::Update(t) => Operation::entry(EntryVerb::Update, &t.args),
            MapCommand::Lookup(t) => Operation::entry(EntryVerb::Lookup, &t.args),
            MapCommand::Getnext(t) => Operation::entry(EntryVerb::GetNext, &t.args),
            MapCommand::Delete(t) => Operation::entry(EntryVerb::Delete, &t.args),
            MapCommand::Pin(t) => Operation::pin(Namespace::Map, &t.args),
        },
    }
}

fn print_outcome(outcome: &Outcome, format: bpfscope_core::OutputFormat) -> anyhow::Result<()> {
    match format {
        bpfscope_core::OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&render_json(outcome))?);
        }
        bpfscope_core::OutputFormat::Text => {
            print!("{}", render_text(outcome));
            if let Some(line) = status_line(outcome) {
                let marker = match outcome {
                    Outcome::NoInsns { .. } => "!".yellow().bold(),
                    _ => "✓".green().bold(),
                };
                println!("{marker} {line}");
            }
        }
    }
    Ok(())
}
