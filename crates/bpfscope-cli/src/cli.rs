use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "bpfscope",
    about = "Inspect and manage BPF programs and maps",
    version,
    infer_subcommands = true,
    after_help = "Global options go before the command: `bpfscope -v map dump id 1`."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format; overrides the config file
    #[arg(long, global = true)]
    pub format: Option<OutputFormat>,

    /// Config file; defaults to $BPFSCOPE_CONFIG
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Inspect and manage BPF programs
    #[command(subcommand, alias = "program")]
    Prog(ProgCommand),
    /// Inspect and manage BPF maps
    #[command(subcommand)]
    Map(MapCommand),
}

#[derive(Subcommand)]
pub enum ProgCommand {
    /// Show one program, or all: [id ID | tag TAG | pinned PATH]
    Show(Tokens),
    /// Dump an instruction image: {xlated|jited} REF file PATH
    Dump(Tokens),
    /// Pin a program: REF PATH
    Pin(Tokens),
}

#[derive(Subcommand)]
pub enum MapCommand {
    /// Show one map, or all: [id ID | pinned PATH]
    Show(Tokens),
    /// Print every entry: REF
    Dump(Tokens),
    /// Insert or replace an entry: REF key BYTES value BYTES [any|noexist|exist]
    Update(Tokens),
    /// Print one entry: REF key BYTES
    Lookup(Tokens),
    /// Print the key after a key, or the first key: REF [key BYTES]
    Getnext(Tokens),
    /// Remove an entry: REF key BYTES
    Delete(Tokens),
    /// Pin a map: REF PATH
    Pin(Tokens),
}

/// Free-form arguments, parsed by the command's own grammar.
///
/// Everything after the subcommand is taken verbatim, so a global flag placed
/// after the reference lands here and is rejected as an extra argument.
#[derive(Args, Debug)]
pub struct Tokens {
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(cmd: &Command) -> &[String] {
        match cmd {
            Command::Prog(ProgCommand::Show(t) | ProgCommand::Dump(t) | ProgCommand::Pin(t)) => &t.args,
            Command::Map(
                MapCommand::Show(t)
                | MapCommand::Dump(t)
                | MapCommand::Update(t)
                | MapCommand::Lookup(t)
                | MapCommand::Getnext(t)
                | MapCommand::Delete(t)
                | MapCommand::Pin(t),
            ) => &t.args,
        }
    }

    #[test]
    fn parse_prog_show_all() {
        let cli = Cli::try_parse_from(["bpfscope", "prog", "show"]).unwrap();
        assert!(matches!(cli.command, Command::Prog(ProgCommand::Show(_))));
        assert!(tokens(&cli.command).is_empty());
    }

    #[test]
    fn parse_prog_dump() {
        let cli = Cli::try_parse_from([
            "bpfscope", "prog", "dump", "xlated", "id", "3", "file", "/tmp/x",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Prog(ProgCommand::Dump(_))));
        assert_eq!(tokens(&cli.command), ["xlated", "id", "3", "file", "/tmp/x"]);
    }

    #[test]
    fn parse_map_update() {
        let cli = Cli::try_parse_from([
            "bpfscope", "map", "update", "id", "0x7", "key", "1", "0", "value", "02", "noexist",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Map(MapCommand::Update(_))));
        assert_eq!(
            tokens(&cli.command),
            ["id", "0x7", "key", "1", "0", "value", "02", "noexist"]
        );
    }

    #[test]
    fn parse_abbreviated_subcommands() {
        let cli = Cli::try_parse_from(["bpfscope", "m", "getn", "id", "1"]).unwrap();
        assert!(matches!(cli.command, Command::Map(MapCommand::Getnext(_))));
        let cli = Cli::try_parse_from(["bpfscope", "p", "sh"]).unwrap();
        assert!(matches!(cli.command, Command::Prog(ProgCommand::Show(_))));
    }

    #[test]
    fn program_is_an_alias_for_prog() {
        let cli = Cli::try_parse_from(["bpfscope", "program", "show", "id", "4"]).unwrap();
        assert!(matches!(cli.command, Command::Prog(ProgCommand::Show(_))));
        assert_eq!(tokens(&cli.command), ["id", "4"]);
    }

    #[test]
    fn global_flag_after_reference_is_a_token() {
        let cli = Cli::try_parse_from(["bpfscope", "-v", "map", "dump", "id", "1"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(tokens(&cli.command), ["id", "1"]);

        let cli = Cli::try_parse_from(["bpfscope", "map", "dump", "id", "1", "-v"]).unwrap();
        assert!(!cli.verbose);
        assert_eq!(tokens(&cli.command), ["id", "1", "-v"]);
    }

    #[test]
    fn ambiguous_prefix_is_rejected() {
        assert!(Cli::try_parse_from(["bpfscope", "map", "d", "id", "1"]).is_err());
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["bpfscope", "--verbose", "map", "show"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["bpfscope", "--format", "json", "map", "show"]).unwrap();
        assert_eq!(cli.format, Some(OutputFormat::Json));
        let cli = Cli::try_parse_from(["bpfscope", "map", "show"]).unwrap();
        assert_eq!(cli.format, None);
    }

    #[test]
    fn parse_config_path() {
        let cli = Cli::try_parse_from(["bpfscope", "--config", "/etc/bpfscope.toml", "prog", "show"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/bpfscope.toml")));
    }
}
