use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};

use crate::archiver::config::{ArchiverConfig, RunMode, load_config};
use crate::commands::{self, CommandReport, SessionQuery};

#[derive(Debug, Parser)]
#[command(
    name = "ccarchive",
    version,
    about = "Find Claude Code session transcripts and retire them into per-project archive folders"
)]
struct Cli {
    /// Print the report as JSON.
    #[arg(long, global = true)]
    json: bool,
    /// Simulate archiving without touching the filesystem.
    #[arg(long, global = true)]
    dry_run: bool,
    /// Developer mode: like --dry-run, with a distinct tag.
    #[arg(long, global = true)]
    dev: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List projects that hold at least one session.
    Projects,
    /// List the sessions of a project, newest first.
    Sessions(SelectArgs),
    /// Show every file that archiving the selection would move.
    Preview(SelectArgs),
    /// Move the selected sessions into the project's archive folder.
    Archive(ArchiveArgs),
    /// Show resolved configuration and environment checks.
    Status,
}

#[derive(Debug, Args)]
struct SelectArgs {
    /// Encoded folder name, display path, or absolute folder path.
    #[arg(
        long,
        allow_hyphen_values = true,
        required_unless_present = "all_projects"
    )]
    project: Option<String>,
    /// Select sessions from every project.
    #[arg(long, conflicts_with = "project")]
    all_projects: bool,
    /// unnamed | by-title | older-than | by-size
    #[arg(long)]
    filter: Option<String>,
    /// Case-insensitive substring for `--filter by-title`.
    #[arg(long)]
    title: Option<String>,
}

#[derive(Debug, Args)]
struct ArchiveArgs {
    #[command(flatten)]
    select: SelectArgs,
    /// Restrict to these session ids (repeatable).
    #[arg(long = "session")]
    sessions: Vec<String>,
}

impl SelectArgs {
    fn into_query(self, session_ids: Vec<String>) -> SessionQuery {
        SessionQuery {
            project: if self.all_projects { None } else { self.project },
            filter: self.filter,
            title: self.title,
            session_ids,
        }
    }
}

fn resolve_mode(cli: &Cli, cfg: &ArchiverConfig) -> Result<RunMode> {
    match (cli.dry_run, cli.dev) {
        (true, true) => bail!("invalid flags: use only one of --dry-run or --dev"),
        (true, false) => Ok(RunMode::DryRun),
        (false, true) => Ok(RunMode::Dev),
        (false, false) => Ok(cfg.archive.mode),
    }
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let status = if report.ok { "ok" } else { "issues" };
    println!("{}: {status}", report.command);
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        println!("  issue: {issue}");
    }
    Ok(())
}

/// Parse arguments, run the command, print its report, and return the exit code.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();
    let cfg = load_config()?;
    let mode = resolve_mode(&cli, &cfg)?;
    let json = cli.json;

    let report = match cli.command {
        Command::Projects => commands::projects::run(&cfg)?,
        Command::Sessions(args) => commands::sessions::run(&cfg, &args.into_query(Vec::new()))?,
        Command::Preview(args) => commands::preview::run(&cfg, &args.into_query(Vec::new()))?,
        Command::Archive(args) => {
            let opts = commands::archive::ArchiveOptions {
                query: args.select.into_query(args.sessions),
                mode,
            };
            commands::archive::run(&cfg, &opts)?
        }
        Command::Status => commands::status::run(&cfg, mode)?,
    };

    print_report(&report, json)?;
    Ok(if report.ok { 0 } else { 2 })
}
