//! The command-execution collaborator and the git command lines sent to it.
//!
//! Everything git-loom needs from version control goes through
//! [`CommandRunner::execute`]: an argv, an optional stdin payload, and back
//! comes an exit code with stdout and stderr. The argv builders in this module
//! are the fixed wire contracts for `log`, `diff`, `show` and `apply`.

use error_set::error_set;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Default number of commits requested per history page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Context lines shown by default, and the step used to widen or narrow them.
pub const DEFAULT_CONTEXT: u32 = 3;

/// Unified context large enough to cover any file.
const WHOLE_FILE_CONTEXT: u32 = 9_999_999;

error_set! {
    /// Failures talking to git
    CommandError := {
        /// git could not be started, or its pipes failed
        #[display("Failed to run git {command}: {message}")]
        Transport { command: String, message: String },
        /// git succeeded but printed bytes that are not UTF-8
        #[display("Invalid UTF-8 in git {command} output: {message}")]
        InvalidUtf8 { command: String, message: String },
        /// git ran and exited non-zero; its output is unusable
        #[display("git {command} failed: {stderr}")]
        HardFailure {
            command: String,
            exit_code: i32,
            stderr: String,
        },
    }
}

/// Raw result of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// A command that succeeded. Diagnostics printed alongside a zero exit code
/// are kept as a warning; the output is still good.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed {
    pub stdout: String,
    pub warning: Option<String>,
}

impl CommandOutput {
    /// Sort the output into success, warning, or hard failure.
    pub fn into_completed(self, command: &str) -> Result<Completed, CommandError> {
        let diagnostics = self.stderr.trim();
        if self.exit_code != 0 {
            return Err(CommandError::HardFailure {
                command: command.to_string(),
                exit_code: self.exit_code,
                stderr: diagnostics.to_string(),
            });
        }

        Ok(Completed {
            stdout: self.stdout,
            warning: (!diagnostics.is_empty()).then(|| diagnostics.to_string()),
        })
    }
}

/// Runs version-control commands.
pub trait CommandRunner {
    /// Run `argv` (without the leading `git`), feeding `stdin` if given.
    fn execute(&self, argv: &[String], stdin: Option<&str>) -> Result<CommandOutput, CommandError>;
}

/// Execute a command and classify its outcome, logging any warning.
#[tracing::instrument(level = "debug", skip_all, fields(command = %argv.first().map_or("", String::as_str)))]
pub fn run<R: CommandRunner + ?Sized>(
    runner: &R,
    argv: &[String],
    stdin: Option<&str>,
) -> Result<Completed, CommandError> {
    debug!(?argv, stdin_bytes = stdin.map_or(0, str::len), "executing");
    let command = argv.first().cloned().unwrap_or_default();
    let completed = runner.execute(argv, stdin)?.into_completed(&command)?;
    if let Some(warning) = &completed.warning {
        warn!(%command, "{warning}");
    }
    Ok(completed)
}

/// Runs the `git` binary against one repository.
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_path: PathBuf,
}

impl GitCli {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }
}

impl CommandRunner for GitCli {
    fn execute(&self, argv: &[String], stdin: Option<&str>) -> Result<CommandOutput, CommandError> {
        let command = argv.first().cloned().unwrap_or_default();
        let transport = |message: String| CommandError::Transport {
            command: command.clone(),
            message,
        };

        let mut child = Command::new("git")
            .arg("-C")
            .arg(&self.repo_path)
            .args(argv)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| transport(e.to_string()))?;

        if let Some(payload) = stdin {
            // Dropping the handle closes the pipe so git sees end of input.
            child
                .stdin
                .take()
                .ok_or_else(|| transport("stdin handle unavailable".to_string()))?
                .write_all(payload.as_bytes())
                .map_err(|e| transport(e.to_string()))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| transport(e.to_string()))?;

        // Killed by a signal: no code, report as failure
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = match String::from_utf8(output.stdout) {
            Ok(stdout) => stdout,
            // The output of a failed command is discarded anyway
            Err(e) if exit_code != 0 => String::from_utf8_lossy(e.as_bytes()).into_owned(),
            Err(e) => {
                return Err(CommandError::InvalidUtf8 {
                    command: command.clone(),
                    message: e.to_string(),
                });
            }
        };

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// `git log` arguments for at most `max_count` commits starting at `rev`.
pub fn log_args(max_count: usize, rev: &str) -> Vec<String> {
    vec![
        "log".to_string(),
        "--pretty=raw".to_string(),
        "--decorate=full".to_string(),
        "--date-order".to_string(),
        format!("--max-count={max_count}"),
        rev.to_string(),
    ]
}

/// `git apply` arguments for a zero-context patch read from stdin.
pub fn apply_args(cached: bool) -> Vec<String> {
    let mut args = vec!["apply".to_string(), "--unidiff-zero".to_string()];
    if cached {
        args.push("--cached".to_string());
    }
    args.push("-".to_string());
    args
}

/// How much unchanged text surrounds each change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextLines {
    Lines(u32),
    EntireFile,
}

impl Default for ContextLines {
    fn default() -> Self {
        ContextLines::Lines(DEFAULT_CONTEXT)
    }
}

impl ContextLines {
    pub fn more(self) -> Self {
        match self {
            ContextLines::Lines(n) => ContextLines::Lines(n.saturating_add(DEFAULT_CONTEXT)),
            ContextLines::EntireFile => ContextLines::EntireFile,
        }
    }

    /// Narrowing from the whole file goes back to the default.
    pub fn less(self) -> Self {
        match self {
            ContextLines::Lines(n) => ContextLines::Lines(n.saturating_sub(DEFAULT_CONTEXT)),
            ContextLines::EntireFile => ContextLines::default(),
        }
    }

    fn count(self) -> u32 {
        match self {
            ContextLines::Lines(n) => n,
            ContextLines::EntireFile => WHOLE_FILE_CONTEXT,
        }
    }
}

/// Which changes a diff view shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffSource {
    /// Unstaged changes: working tree against the index
    WorkingCopy,
    /// Staged changes: index against HEAD
    Staged,
    /// The changes introduced by one commit
    Commit(String),
}

/// Parameters of a diff view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffOptions {
    pub source: DiffSource,
    pub context: ContextLines,
    pub ignore_whitespace: bool,
    pub path: Option<String>,
}

impl DiffOptions {
    pub fn new(source: DiffSource) -> Self {
        Self {
            source,
            context: ContextLines::default(),
            ignore_whitespace: false,
            path: None,
        }
    }

    /// The `git diff` / `git show` argv for these options.
    pub fn args(&self) -> Vec<String> {
        let mut args = match &self.source {
            DiffSource::WorkingCopy => vec!["diff".to_string()],
            DiffSource::Staged => vec!["diff".to_string(), "--cached".to_string()],
            DiffSource::Commit(_) => vec!["show".to_string(), "--pretty=raw".to_string()],
        };
        args.push("--no-color".to_string());
        args.push("--no-ext-diff".to_string());
        args.push(format!("-U{}", self.context.count()));
        if self.ignore_whitespace {
            args.push("--ignore-all-space".to_string());
        }
        if let DiffSource::Commit(hash) = &self.source {
            args.push(hash.clone());
        }
        if let Some(path) = &self.path {
            args.push("--".to_string());
            args.push(path.clone());
        }
        args
    }
}
