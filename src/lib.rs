use error_set::error_set;

pub mod command;
pub mod diff;
pub mod graph;
pub mod log;
pub mod logging;
pub mod parse;
pub mod patch;
pub mod selection;

pub use command::{
    CommandError, CommandOutput, CommandRunner, ContextLines, DiffOptions, DiffSource, GitCli,
};
pub use diff::{DiffError, UnifiedDiff};
pub use graph::{HistoryView, LogOptions, Page};
pub use parse::ParseError;
pub use patch::Patch;
pub use selection::{PatchAction, SelectionModel};

error_set! {
    /// Top-level error for git-loom operations
    GitLoomError := {
        #[display("No changes found in {file}")]
        NoChanges { file: String },
        #[display("No changed lines in {file} match the selection")]
        NoMatchingLines { file: String },
        #[display("{action} is not available for this diff")]
        UnavailableAction { action: String },
        ParseError(ParseError),
        DiffError(DiffError),
        CommandError(CommandError),
    }
}

/// Main interface for git-loom operations
pub struct GitLoom<R: CommandRunner> {
    runner: R,
}

impl GitLoom<GitCli> {
    /// Operate on the repository at `repo_path` through the `git` binary.
    pub fn open(repo_path: impl Into<std::path::PathBuf>) -> Self {
        Self::new(GitCli::new(repo_path))
    }
}

impl<R: CommandRunner> GitLoom<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Load and parse a diff.
    #[tracing::instrument(name = "diff", level = "debug", skip_all, fields(source = ?options.source))]
    pub fn diff(&self, options: &DiffOptions) -> Result<UnifiedDiff, GitLoomError> {
        let completed = command::run(&self.runner, &options.args(), None)?;
        Ok(UnifiedDiff::parse(&completed.stdout))
    }

    /// Load the next page of `view`.
    pub fn history_page(&self, view: &mut HistoryView) -> Result<Page, GitLoomError> {
        Ok(view.load_page(&self.runner)?)
    }

    /// Stage specific lines from a file
    ///
    /// Returns the number of changed lines staged.
    ///
    /// # Examples
    /// ```no_run
    /// # use git_loom::GitLoom;
    /// let loom = GitLoom::open(".");
    /// loom.stage("flake.nix:137").unwrap();
    /// loom.stage("file.nix:10..15").unwrap();
    /// loom.stage("config.nix:-10,-11,12").unwrap();
    /// ```
    pub fn stage(&self, file_ref: &str) -> Result<usize, GitLoomError> {
        self.apply_refs(file_ref, PatchAction::Stage)
    }

    /// Take specific lines back out of the index.
    pub fn unstage(&self, file_ref: &str) -> Result<usize, GitLoomError> {
        self.apply_refs(file_ref, PatchAction::Unstage)
    }

    /// Revert specific unstaged lines in the working tree.
    pub fn discard(&self, file_ref: &str) -> Result<usize, GitLoomError> {
        self.apply_refs(file_ref, PatchAction::Discard)
    }

    fn apply_refs(&self, file_ref: &str, action: PatchAction) -> Result<usize, GitLoomError> {
        let file_refs = parse::parse_file_refs(file_ref)?;
        let source = match action {
            PatchAction::Stage | PatchAction::Discard => DiffSource::WorkingCopy,
            PatchAction::Unstage => DiffSource::Staged,
        };

        let mut options = DiffOptions::new(source.clone());
        options.context = ContextLines::Lines(0);
        options.path = Some(file_refs.file.clone());

        let diff = self.diff(&options)?;
        if !diff.has_changes() {
            return Err(GitLoomError::NoChanges {
                file: file_refs.file,
            });
        }

        let mut selection = SelectionModel::new(&diff, source);
        let matched = selection.select_refs(&diff, &file_refs.refs);
        if matched == 0 {
            return Err(GitLoomError::NoMatchingLines {
                file: file_refs.file,
            });
        }

        self.apply_selection(&diff, &selection, action)?;
        Ok(matched)
    }

    /// Build the patch for `selection` and apply it.
    pub fn apply_selection(
        &self,
        diff: &UnifiedDiff,
        selection: &SelectionModel,
        action: PatchAction,
    ) -> Result<(), GitLoomError> {
        if !selection.available_actions().contains(&action) {
            return Err(GitLoomError::UnavailableAction {
                action: format!("{action:?}"),
            });
        }
        let patch = patch::reconstruct(diff, selection, action.reverse());
        self.apply(&patch, action)
    }

    /// Hand a patch to `git apply`. An empty patch is a no-op.
    #[tracing::instrument(name = "apply", level = "debug", skip_all, fields(action = ?action))]
    pub fn apply(&self, patch: &Patch, action: PatchAction) -> Result<(), GitLoomError> {
        if patch.is_empty() {
            tracing::debug!("nothing selected, skipping apply");
            return Ok(());
        }

        let text = patch.to_string();
        tracing::trace!(patch = %text);
        command::run(&self.runner, &command::apply_args(action.cached()), Some(&text))?;
        Ok(())
    }
}
