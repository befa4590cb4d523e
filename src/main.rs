use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use git_loom::graph::{LaneEvent, RowLayout};
use git_loom::log::CommitRecord;
use git_loom::logging::setup_logger;
use git_loom::{ContextLines, DiffOptions, DiffSource, GitLoom, HistoryView, LogOptions};
use serde::Serialize;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "git-loom")]
#[command(about = "Commit graph layout and line-level staging for git")]
struct Cli {
    /// Repository to operate on
    #[arg(short = 'C', long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Show debug logs (GIT_LOOM_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Draw the commit graph
    Graph {
        /// Where history starts
        #[arg(default_value = "HEAD")]
        start: String,
        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: usize,
        /// Commits per page
        #[arg(long, default_value_t = git_loom::command::DEFAULT_PAGE_SIZE)]
        page_size: usize,
        /// Print rows and geometry as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show changes side by side with line numbers
    Diff {
        /// Show staged changes instead of unstaged ones
        #[arg(long, conflicts_with = "commit")]
        staged: bool,
        /// Show the changes of a commit
        #[arg(long)]
        commit: Option<String>,
        /// Lines of context
        #[arg(short = 'U', long, conflicts_with = "full")]
        unified: Option<u32>,
        /// Show whole files
        #[arg(long)]
        full: bool,
        /// Ignore whitespace changes
        #[arg(short = 'w', long)]
        ignore_whitespace: bool,
        /// Width of the left column
        #[arg(long, default_value_t = 60)]
        width: usize,
        /// Limit to one path
        path: Option<String>,
    },
    /// Stage specific lines by reference (e.g., file.nix:10..15,-20)
    Stage {
        /// File and line references (e.g., "flake.nix:137" or "flake.nix:10..15")
        #[arg(required = true)]
        file_refs: Vec<String>,
    },
    /// Unstage specific lines by reference
    Unstage {
        #[arg(required = true)]
        file_refs: Vec<String>,
    },
    /// Discard specific unstaged lines by reference
    Discard {
        #[arg(required = true)]
        file_refs: Vec<String>,
    },
    /// Generate shell completions
    Completions { shell: Shell },
    /// Generate a man page
    Man,
}

#[derive(Serialize)]
struct GraphOutput<'a> {
    rows: &'a [RowLayout],
    geometry: git_loom::graph::Geometry,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    setup_logger(cli.verbose);
    let loom = GitLoom::open(&cli.repo);

    match cli.command {
        Commands::Graph {
            start,
            pages,
            page_size,
            json,
        } => {
            let mut view = HistoryView::new(LogOptions {
                page_size,
                start_ref: start,
            });
            let mut rows = Vec::new();
            for _ in 0..pages {
                if view.is_exhausted() {
                    break;
                }
                rows.extend(loom.history_page(&mut view)?.rows);
            }

            if json {
                let output = GraphOutput {
                    rows: &rows,
                    geometry: view.geometry(),
                };
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                for (layout, commit) in rows.iter().zip(view.commits()) {
                    println!("{}", render_row(layout, commit));
                }
            }
        }
        Commands::Diff {
            staged,
            commit,
            unified,
            full,
            ignore_whitespace,
            width,
            path,
        } => {
            let source = match (commit, staged) {
                (Some(hash), _) => DiffSource::Commit(hash),
                (None, true) => DiffSource::Staged,
                (None, false) => DiffSource::WorkingCopy,
            };
            let mut options = DiffOptions::new(source);
            options.ignore_whitespace = ignore_whitespace;
            options.path = path;
            if full {
                options.context = ContextLines::EntireFile;
            } else if let Some(n) = unified {
                options.context = ContextLines::Lines(n);
            }

            let diff = loom.diff(&options)?;
            print!("{}", diff.side_by_side().render(&diff, width));
        }
        Commands::Stage { file_refs } => {
            for file_ref in &file_refs {
                let count = loom.stage(file_ref)?;
                eprintln!("Staged {count} line(s) from {file_ref}");
            }
        }
        Commands::Unstage { file_refs } => {
            for file_ref in &file_refs {
                let count = loom.unstage(file_ref)?;
                eprintln!("Unstaged {count} line(s) from {file_ref}");
            }
        }
        Commands::Discard { file_refs } => {
            for file_ref in &file_refs {
                let count = loom.discard(file_ref)?;
                eprintln!("Discarded {count} line(s) from {file_ref}");
            }
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "git-loom", &mut io::stdout());
        }
        Commands::Man => {
            clap_mangen::Man::new(Cli::command()).render(&mut io::stdout())?;
        }
    }

    Ok(())
}

/// One text line of the graph: lane glyphs, short hash, refs and subject.
fn render_row(layout: &RowLayout, commit: &CommitRecord) -> String {
    let width = layout
        .events
        .iter()
        .map(|event| match *event {
            LaneEvent::Opened { column, .. }
            | LaneEvent::Continued { column, .. }
            | LaneEvent::Forked { column, .. }
            | LaneEvent::Terminated { column, .. } => column + 1,
            LaneEvent::Joined { from_column, .. } => from_column + 1,
        })
        .max()
        .unwrap_or(0)
        .max(layout.column + 1);

    let mut cells = vec![' '; width];
    for event in &layout.events {
        match *event {
            LaneEvent::Continued { column, .. } => cells[column] = '|',
            LaneEvent::Joined { from_column, .. } => cells[from_column] = '/',
            LaneEvent::Forked { column, .. } if cells[column] == ' ' => cells[column] = '\\',
            _ => {}
        }
    }
    cells[layout.column] = '*';

    let glyphs: String = cells.iter().flat_map(|c| [*c, ' ']).collect();
    let short = commit.hash.get(..7).unwrap_or(&commit.hash);
    let refs = if commit.decorations.is_empty() {
        String::new()
    } else {
        let names: Vec<_> = commit.decorations.iter().map(|d| d.short_name()).collect();
        format!("({}) ", names.join(", "))
    };

    format!("{glyphs} {short} {refs}{}", commit.subject())
}
