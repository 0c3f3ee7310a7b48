// Command line surface
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dashboard-migrator")]
#[command(about = "Upgrade stored dashboard documents to the current schema")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Configuration file (defaults to config/migrator.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Migrate dashboard JSON files
    Migrate(MigrateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct MigrateArgs {
    /// Dashboard JSON files to migrate
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Schema version to stop at (defaults to the latest)
    #[arg(long)]
    pub target: Option<i64>,

    /// Directory for migrated files; printed to stdout when omitted
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Load panel plugins and finish deferred panel type changes
    #[arg(long)]
    pub complete_plugins: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_arguments_parse() {
        let cli = Cli::try_parse_from([
            "dashboard-migrator",
            "migrate",
            "a.json",
            "b.json",
            "--target",
            "33",
            "--complete-plugins",
            "--debug",
        ])
        .unwrap();
        assert!(cli.debug);
        let Command::Migrate(args) = cli.command;
        assert_eq!(args.files, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
        assert_eq!(args.target, Some(33));
        assert!(args.complete_plugins);
        assert_eq!(args.out, None);
    }

    #[test]
    fn test_files_are_required() {
        assert!(Cli::try_parse_from(["dashboard-migrator", "migrate"]).is_err());
    }
}
