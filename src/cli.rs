use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "irforge")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Compile infrastructure graphs into staged provisioning plans", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check a graph for errors and warnings
    Validate(GraphArgs),

    /// Show the plan apply would run, without changing anything
    Preview(GraphArgs),

    /// Provision every node and binding in a graph
    Apply(ApplyArgs),

    /// Tear down everything provisioned for a project environment
    Destroy(DestroyArgs),

    /// List supported resource kinds
    Kinds,

    /// Check configuration, state directory and backend
    Health,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct GraphArgs {
    /// Graph document (.json or .toml)
    pub graph: PathBuf,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Graph document (.json or .toml)
    pub graph: PathBuf,

    /// Number of parallel node tasks per stage
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser)]
pub struct DestroyArgs {
    /// Project name
    #[arg(short, long)]
    pub project: String,

    /// Environment name
    #[arg(short, long)]
    pub env: String,

    /// Number of parallel deletions per tier
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from(["irforge", "-vv", "apply", "graph.json", "--jobs", "8", "--yes"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Apply(args) => {
                assert_eq!(args.graph, PathBuf::from("graph.json"));
                assert_eq!(args.jobs, Some(8));
                assert!(args.yes);
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_parse_destroy_with_json() {
        let cli = Cli::try_parse_from(["irforge", "destroy", "--project", "canvas", "--env", "dev", "--json"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Command::Destroy(args) => {
                assert_eq!(args.project, "canvas");
                assert_eq!(args.env, "dev");
                assert!(!args.yes);
            }
            _ => panic!("expected destroy"),
        }
    }
}
