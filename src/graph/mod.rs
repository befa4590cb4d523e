//! Commit graph layout.
//!
//! [`lanes`] decides which column each commit sits in; [`geometry`] turns the
//! resulting lane events into polylines and nodes. [`HistoryView`] drives both
//! from paged `git log` output.

pub mod geometry;
pub mod lanes;

pub use geometry::{
    Geometry, GraphGeometryBuilder, GridPoint, LanePath, Node, PALETTE, RowMetrics, palette_color,
};
pub use lanes::{ColorAllocator, Lane, LaneAssigner, LaneEvent, LaneId, RowLayout};

use crate::command::{self, CommandError, CommandRunner, DEFAULT_PAGE_SIZE};
use crate::log::{CommitRecord, block_hash, parse_block, split_records};
use tracing::{debug, warn};

/// Which history to show and how much of it per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    pub page_size: usize,
    pub start_ref: String,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            start_ref: "HEAD".to_string(),
        }
    }
}

/// Rows added by one page load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub rows: Vec<RowLayout>,
    /// Diagnostics git printed while still succeeding
    pub warning: Option<String>,
}

/// A scrollable commit graph, loaded a page at a time.
///
/// Lane and geometry state carry over from page to page, so the graph
/// continues across page boundaries. Changing the start ref starts over.
#[derive(Debug)]
pub struct HistoryView {
    options: LogOptions,
    assigner: LaneAssigner,
    builder: GraphGeometryBuilder,
    commits: Vec<CommitRecord>,
    /// First commit of the next page, not laid out yet
    cursor: Option<String>,
    exhausted: bool,
}

impl HistoryView {
    pub fn new(options: LogOptions) -> Self {
        Self {
            options,
            assigner: LaneAssigner::new(PALETTE.len()),
            builder: GraphGeometryBuilder::new(),
            commits: Vec::new(),
            cursor: None,
            exhausted: false,
        }
    }

    /// Show history from another ref, discarding everything laid out so far.
    pub fn set_start_ref(&mut self, start_ref: impl Into<String>) {
        self.options.start_ref = start_ref.into();
        self.assigner.reset();
        self.builder.reset();
        self.commits.clear();
        self.cursor = None;
        self.exhausted = false;
    }

    /// Fetch and lay out the next page.
    ///
    /// One commit more than the page size is requested. The extra commit is
    /// not laid out; it becomes the start of the next page. When git has no
    /// extra commit to give, the history is complete and further calls return
    /// an empty page without running anything.
    #[tracing::instrument(name = "load_page", level = "debug", skip_all, fields(start_ref = %self.options.start_ref))]
    pub fn load_page<R: CommandRunner + ?Sized>(
        &mut self,
        runner: &R,
    ) -> Result<Page, CommandError> {
        if self.exhausted {
            return Ok(Page::default());
        }

        let page_size = self.options.page_size.max(1);
        let rev = self.cursor.as_deref().unwrap_or(&self.options.start_ref);
        let args = command::log_args(page_size + 1, rev);
        let completed = command::run(runner, &args, None)?;

        // Count raw blocks so a malformed record does not end the history
        let blocks = split_records(&completed.stdout);
        let (page, next) = match blocks.split_at_checked(page_size) {
            Some((page, rest)) => (page, rest.first()),
            None => (blocks.as_slice(), None),
        };

        self.cursor = next.and_then(|block| block_hash(block));
        self.exhausted = self.cursor.is_none();
        if let (Some(block), None) = (next, &self.cursor) {
            warn!(
                block = block.lines().next().unwrap_or(""),
                "cannot continue history past an unreadable commit"
            );
        }

        let records: Vec<CommitRecord> = page
            .iter()
            .filter_map(|block| parse_block(block))
            .collect();
        debug!(
            commits = records.len(),
            exhausted = self.exhausted,
            "page loaded"
        );

        let rows = self.assigner.assign_all(&records);
        self.builder.push_rows(&rows);
        self.commits.extend(records);

        Ok(Page {
            rows,
            warning: completed.warning,
        })
    }

    pub fn commits(&self) -> &[CommitRecord] {
        &self.commits
    }

    pub fn geometry(&self) -> Geometry {
        self.builder.geometry()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn options(&self) -> &LogOptions {
        &self.options
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::command::tests::FakeRunner;
    use similar_asserts::assert_eq;

    fn hash(c: char) -> String {
        c.to_string().repeat(40)
    }

    fn raw(commits: &[(char, &[char])]) -> String {
        commits
            .iter()
            .map(|(c, parents)| {
                let mut block = format!("commit {}\n", hash(*c));
                for p in *parents {
                    block.push_str(&format!("parent {}\n", hash(*p)));
                }
                block.push_str(&format!("\n    commit {c}\n"));
                block
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn view(page_size: usize) -> HistoryView {
        HistoryView::new(LogOptions {
            page_size,
            start_ref: "main".to_string(),
        })
    }

    #[test]
    fn pages_continue_from_cursor() {
        let runner = FakeRunner::with(vec![
            FakeRunner::ok(&raw(&[
                ('d', &['c']),
                ('c', &['b']),
                ('b', &['a']),
                ('a', &[]),
            ])),
            FakeRunner::ok(&raw(&[('a', &[])])),
        ]);
        let mut history = view(3);

        let first = history.load_page(&runner).unwrap();
        assert_eq!(first.rows.len(), 3);
        assert!(!history.is_exhausted());

        let second = history.load_page(&runner).unwrap();
        let hashes: Vec<_> = second.rows.iter().map(|r| r.hash.clone()).collect();
        assert_eq!(hashes, vec![hash('a')]);
        assert_eq!(second.rows[0].row, 3);
        assert!(history.is_exhausted());

        let calls = runner.calls.borrow();
        assert_eq!(calls[0].0.last().unwrap(), "main");
        assert_eq!(calls[0].0[4], "--max-count=4");
        assert_eq!(calls[1].0.last().unwrap(), &hash('a'));

        // linear history stays in one column on one lane
        assert!(history.geometry().paths.len() == 1);
        assert_eq!(history.commits().len(), 4);
    }

    #[test]
    fn single_commit_pages_advance() {
        let runner = FakeRunner::with(vec![
            FakeRunner::ok(&raw(&[('c', &['b']), ('b', &['a'])])),
            FakeRunner::ok(&raw(&[('b', &['a']), ('a', &[])])),
            FakeRunner::ok(&raw(&[('a', &[])])),
        ]);
        let mut history = view(1);

        let mut hashes = Vec::new();
        while !history.is_exhausted() {
            let page = history.load_page(&runner).unwrap();
            assert_eq!(page.rows.len(), 1);
            hashes.extend(page.rows.into_iter().map(|r| r.hash));
        }

        assert_eq!(hashes, vec![hash('c'), hash('b'), hash('a')]);
        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|(argv, _)| argv[4] == "--max-count=2"));
        assert_eq!(calls[2].0.last().unwrap(), &hash('a'));
    }

    #[test]
    fn malformed_record_does_not_end_history() {
        let broken = format!("commit {}\nparent 12345\n\n    broken\n", hash('c'));
        let full_page = [raw(&[('d', &['c'])]), broken, raw(&[('b', &['a'])])].join("\n");
        let runner = FakeRunner::with(vec![
            FakeRunner::ok(&full_page),
            FakeRunner::ok(&raw(&[('b', &['a']), ('a', &[])])),
        ]);
        let mut history = view(2);

        let first = history.load_page(&runner).unwrap();
        assert_eq!(first.rows.len(), 1);
        assert!(!history.is_exhausted());

        let second = history.load_page(&runner).unwrap();
        assert_eq!(second.rows.len(), 2);
        assert!(history.is_exhausted());
        assert_eq!(runner.calls.borrow()[1].0.last().unwrap(), &hash('b'));
    }

    #[test]
    fn unreadable_next_commit_stops_paging() {
        let page = format!("{}\ncommit not-a-hash\n\n    broken\n", raw(&[('b', &[])]));
        let runner = FakeRunner::with(vec![FakeRunner::ok(&page)]);
        let mut history = view(1);

        let rows = history.load_page(&runner).unwrap().rows;
        assert_eq!(rows.len(), 1);
        assert!(history.is_exhausted());
    }

    #[test]
    fn exhausted_view_stops_asking() {
        let runner = FakeRunner::with(vec![FakeRunner::ok(&raw(&[('a', &[])]))]);
        let mut history = view(10);
        history.load_page(&runner).unwrap();
        assert!(history.is_exhausted());

        let page = history.load_page(&runner).unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(runner.calls.borrow().len(), 1);
    }

    #[test]
    fn rows_serialize_for_renderers() {
        let runner = FakeRunner::with(vec![FakeRunner::ok(&raw(&[('a', &[])]))]);
        let page = view(10).load_page(&runner).unwrap();
        insta::assert_json_snapshot!(page.rows[0], @r#"
        {
          "row": 0,
          "hash": "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
          "column": 0,
          "color": 0,
          "events": [
            {
              "event": "opened",
              "lane": 0,
              "column": 0,
              "color": 0
            },
            {
              "event": "terminated",
              "lane": 0,
              "column": 0
            }
          ],
          "lane_count": 0
        }
        "#);
    }

    #[test]
    fn changing_ref_starts_over() {
        let runner = FakeRunner::with(vec![
            FakeRunner::ok(&raw(&[('b', &['a']), ('a', &[])])),
            FakeRunner::ok(&raw(&[('e', &[])])),
        ]);
        let mut history = view(10);
        history.load_page(&runner).unwrap();

        history.set_start_ref("topic");
        assert!(history.commits().is_empty());
        let page = history.load_page(&runner).unwrap();
        assert_eq!(page.rows[0].row, 0);
        assert_eq!(page.rows[0].color, 0);
        assert_eq!(runner.calls.borrow()[1].0.last().unwrap(), "topic");
    }

    #[test]
    fn failed_page_leaves_state_alone() {
        let runner = FakeRunner::with(vec![Ok(crate::command::CommandOutput {
            exit_code: 128,
            stdout: String::new(),
            stderr: "fatal: bad revision 'nope'".to_string(),
        })]);
        let mut history = view(10);
        let err = history.load_page(&runner).unwrap_err();
        assert!(matches!(err, CommandError::HardFailure { exit_code: 128, .. }));
        assert!(!history.is_exhausted());
        assert!(history.commits().is_empty());
    }

    #[test]
    fn warnings_are_passed_along() {
        let runner = FakeRunner::with(vec![Ok(crate::command::CommandOutput {
            exit_code: 0,
            stdout: raw(&[('a', &[])]),
            stderr: "warning: refname 'main' is ambiguous.".to_string(),
        })]);
        let mut history = view(10);
        let page = history.load_page(&runner).unwrap();
        assert_eq!(page.rows.len(), 1);
        assert_eq!(
            page.warning.as_deref(),
            Some("warning: refname 'main' is ambiguous.")
        );
    }
}
