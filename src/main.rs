//! # orgsync
//!
//! **orgsync** keeps note files in local git repositories in sync with
//! their remotes.
//!
//! Features:
//! - Manage repositories defined in `$(orgsync home)/config.toml`
//! - `orgsync sync` fetches, merges and pushes every configured repository
//! - `orgsync commit` commits a file, replaying it on a side branch if the
//!   repository moved on since the edit started
//! - `orgsync merge` / `orgsync push` run one half of a sync by hand
//! - `orgsync revision` / `orgsync retrieve` inspect tracked files
//! - `orgsync list` shows configured repositories and their state
//!
//! This CLI is built with [clap](https://docs.rs/clap).

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use orgsync::{
    BaseRevision, CommitMode, cmd_commit, cmd_list, cmd_merge, cmd_push, cmd_retrieve,
    cmd_revision, cmd_sync, orgsync_home,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Command-line interface definition.
#[derive(Parser, Debug)]
#[command(
    name = "orgsync",
    version,
    about = "orgsync - git-backed note synchronization",
    arg_required_else_help = true
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` wins if set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Cmd {
    /// Fetch, merge and push every configured repository
    Sync,
    /// Commit a file into a repository
    Commit {
        /// Repository name or path from config.toml
        repo: String,
        /// File whose content is committed
        source: PathBuf,
        /// Destination path inside the repository
        path: String,
        /// Fail if the path already exists
        #[arg(long, conflicts_with = "existing")]
        new: bool,
        /// Fail if the path does not exist
        #[arg(long)]
        existing: bool,
        /// Blob id the edit was based on (see `orgsync revision`)
        #[arg(long, requires = "commit")]
        base: Option<String>,
        /// Commit the base blob was read from
        #[arg(long, requires = "base")]
        commit: Option<String>,
    },
    /// Fetch and merge the remote head of one repository
    Merge { repo: String },
    /// Push one repository if its head differs from the remote
    Push { repo: String },
    /// Print the current revision of a tracked file
    Revision { repo: String, path: String },
    /// Copy a tracked file out of the working tree
    Retrieve {
        repo: String,
        path: String,
        dest: PathBuf,
    },
    /// List configured repositories
    List,
    /// Print the orgsync config directory
    Home,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// CLI entry point.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let Some(cmd) = cli.cmd else {
        return Ok(());
    };

    match cmd {
        Cmd::Sync => cmd_sync(),
        Cmd::Commit {
            repo,
            source,
            path,
            new,
            existing,
            base,
            commit,
        } => {
            let mode = if new {
                CommitMode::New
            } else if existing {
                CommitMode::Existing
            } else {
                CommitMode::Upsert
            };
            let base = base
                .zip(commit)
                .map(|(file, commit)| BaseRevision { file, commit });
            cmd_commit(&repo, &source, &path, mode, base)
        }
        Cmd::Merge { repo } => cmd_merge(&repo),
        Cmd::Push { repo } => cmd_push(&repo),
        Cmd::Revision { repo, path } => cmd_revision(&repo, &path),
        Cmd::Retrieve { repo, path, dest } => cmd_retrieve(&repo, &path, &dest),
        Cmd::List => cmd_list(),
        Cmd::Home => {
            println!("{}", orgsync_home()?.display());
            Ok(())
        }
    }
}
