//! Unified diff parsing.
//!
//! A diff is read as a flat list of [`DiffLine`]s. Which lines are file
//! headers and which are hunk bodies is decided by a two-state machine,
//! [`ParseState`], so `--- a/file` in a header is never mistaken for a
//! removed line.

pub mod hunk;
pub mod split;

use error_set::error_set;

pub use hunk::{Hunk, HunkHeader, ModifiedLines};
pub use split::{Cell, Row, SideBySide};

error_set! {
    /// Errors from reading diff text
    DiffError := {
        /// A line starting with `@` that is not a valid `@@ -a,b +c,d @@` header
        #[display("Invalid hunk header '{line}'")]
        InvalidHunkHeader { line: String },
    }
}

/// What a diff line is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLineKind {
    /// `diff --git`, `index`, `---`, `+++` and anything else before a hunk
    FileHeader,
    HunkHeader,
    Context,
    Added,
    Removed,
    /// `\ No newline at end of file`, qualifying the line before it
    NoNewline,
}

/// Where the parser is within a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    InPreamble,
    InHunkBody,
}

impl ParseState {
    /// Classify `line` and return the state for the next line.
    ///
    /// A `diff ...` command line always starts a new file preamble and an `@`
    /// line always starts a hunk body; nothing else changes state.
    pub fn step(self, line: &str) -> (ParseState, DiffLineKind) {
        match (self, line.as_bytes().first()) {
            (_, Some(b'd')) => (ParseState::InPreamble, DiffLineKind::FileHeader),
            (_, Some(b'@')) => (ParseState::InHunkBody, DiffLineKind::HunkHeader),
            (ParseState::InPreamble, _) => (ParseState::InPreamble, DiffLineKind::FileHeader),
            (ParseState::InHunkBody, Some(b'+')) => (self, DiffLineKind::Added),
            (ParseState::InHunkBody, Some(b'-')) => (self, DiffLineKind::Removed),
            (ParseState::InHunkBody, Some(b'\\')) => (self, DiffLineKind::NoNewline),
            (ParseState::InHunkBody, _) => (self, DiffLineKind::Context),
        }
    }
}

/// One line of a unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: DiffLineKind,
    /// The line exactly as it appeared, marker included
    pub text: String,
    /// Line number in the old file (context and removed lines)
    pub old_line: Option<u32>,
    /// Line number in the new file (context and added lines)
    pub new_line: Option<u32>,
    /// Parsed ranges, for hunk header lines that could be read
    pub header: Option<HunkHeader>,
}

impl DiffLine {
    /// Added or removed: the lines a user can select.
    pub fn is_change(&self) -> bool {
        matches!(self.kind, DiffLineKind::Added | DiffLineKind::Removed)
    }

    /// Text without the leading `+`, `-` or space.
    pub fn content(&self) -> &str {
        match self.kind {
            DiffLineKind::Added | DiffLineKind::Removed | DiffLineKind::Context => {
                self.text.get(1..).unwrap_or("")
            }
            _ => &self.text,
        }
    }
}

/// A parsed unified diff, possibly spanning several files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnifiedDiff {
    pub lines: Vec<DiffLine>,
}

impl UnifiedDiff {
    /// Parse diff text. Parsing never fails; unreadable hunk headers are kept
    /// as header lines without ranges.
    ///
    /// Lines are split on `\n` alone, so the `\r` of a CRLF file stays part
    /// of the line text.
    pub fn parse(text: &str) -> Self {
        let mut lines = Vec::new();
        let mut state = ParseState::InPreamble;
        let mut old_line = 0u32;
        let mut new_line = 0u32;

        for raw in text.split_terminator('\n') {
            let (next, kind) = state.step(raw);
            state = next;

            let mut line = DiffLine {
                kind,
                text: raw.to_string(),
                old_line: None,
                new_line: None,
                header: None,
            };

            match kind {
                DiffLineKind::HunkHeader => match raw.parse::<HunkHeader>() {
                    Ok(header) => {
                        old_line = header.old_start;
                        new_line = header.new_start;
                        line.header = Some(header);
                    }
                    Err(e) => tracing::debug!("{e}"),
                },
                DiffLineKind::Context => {
                    line.old_line = Some(old_line);
                    line.new_line = Some(new_line);
                    old_line += 1;
                    new_line += 1;
                }
                DiffLineKind::Removed => {
                    line.old_line = Some(old_line);
                    old_line += 1;
                }
                DiffLineKind::Added => {
                    line.new_line = Some(new_line);
                    new_line += 1;
                }
                DiffLineKind::FileHeader | DiffLineKind::NoNewline => {}
            }

            lines.push(line);
        }

        UnifiedDiff { lines }
    }

    /// Lines before the first hunk header, verbatim.
    pub fn preamble(&self) -> &[DiffLine] {
        let end = self
            .lines
            .iter()
            .position(|l| l.kind == DiffLineKind::HunkHeader)
            .unwrap_or(self.lines.len());
        &self.lines[..end]
    }

    /// Indices of hunk header lines.
    pub fn hunk_headers(&self) -> impl Iterator<Item = usize> + '_ {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.kind == DiffLineKind::HunkHeader)
            .map(|(i, _)| i)
    }

    /// Indices of the added/removed lines belonging to the hunk whose header
    /// is at `header`, up to the next hunk header or the end.
    pub fn hunk_changes(&self, header: usize) -> impl Iterator<Item = usize> + '_ {
        self.lines
            .iter()
            .enumerate()
            .skip(header + 1)
            .take_while(|(_, l)| l.kind != DiffLineKind::HunkHeader)
            .filter(|(_, l)| l.is_change())
            .map(|(i, _)| i)
    }

    /// True when there is nothing to select.
    pub fn has_changes(&self) -> bool {
        self.lines.iter().any(DiffLine::is_change)
    }

    pub fn side_by_side(&self) -> SideBySide {
        SideBySide::build(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    const MIXED: &str = r#"diff --git a/gtk.nix b/gtk.nix
index 2ce966d..93d8dbc 100644
--- a/gtk.nix
+++ b/gtk.nix
@@ -9,4 +9,5 @@ line 8
 line 9
-    gtk.theme.name = "Adwaita";
-    gtk.iconTheme.name = "Papirus";
+    # Theme managed by Stylix
+    gtk.iconTheme.name = "Papirus-Dark";
+    gtk.cursorTheme.size = 24;
 line 12
"#;

    fn kinds(diff: &UnifiedDiff) -> Vec<DiffLineKind> {
        diff.lines.iter().map(|l| l.kind).collect()
    }

    #[test]
    fn transitions() {
        use DiffLineKind::*;
        use ParseState::*;

        assert_eq!(InPreamble.step("--- a/x"), (InPreamble, FileHeader));
        assert_eq!(InPreamble.step("+++ b/x"), (InPreamble, FileHeader));
        assert_eq!(InPreamble.step("@@ -1 +1 @@"), (InHunkBody, HunkHeader));
        assert_eq!(InHunkBody.step("+x"), (InHunkBody, Added));
        assert_eq!(InHunkBody.step("-x"), (InHunkBody, Removed));
        assert_eq!(InHunkBody.step(" x"), (InHunkBody, Context));
        assert_eq!(InHunkBody.step("diff --git a/y b/y"), (InPreamble, FileHeader));
        assert_eq!(InHunkBody.step("@@ -5 +5 @@"), (InHunkBody, HunkHeader));
    }

    #[test]
    fn unusual_body_lines_are_context() {
        use DiffLineKind::*;
        use ParseState::*;

        assert_eq!(InHunkBody.step(""), (InHunkBody, Context));
        assert_eq!(InHunkBody.step("garbage"), (InHunkBody, Context));
        assert_eq!(
            InHunkBody.step("\\ No newline at end of file"),
            (InHunkBody, NoNewline)
        );
    }

    #[test]
    fn classify_lines() {
        use DiffLineKind::*;
        let diff = UnifiedDiff::parse(MIXED);
        assert_eq!(
            kinds(&diff),
            vec![
                FileHeader, FileHeader, FileHeader, FileHeader, HunkHeader, Context, Removed,
                Removed, Added, Added, Added, Context,
            ]
        );
    }

    #[test]
    fn preamble_is_verbatim() {
        let diff = UnifiedDiff::parse(MIXED);
        let preamble: Vec<_> = diff.preamble().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(
            preamble,
            vec![
                "diff --git a/gtk.nix b/gtk.nix",
                "index 2ce966d..93d8dbc 100644",
                "--- a/gtk.nix",
                "+++ b/gtk.nix",
            ]
        );
    }

    #[test]
    fn numbers_lines_from_hunk_header() {
        let diff = UnifiedDiff::parse(MIXED);
        let numbers: Vec<_> = diff.lines[5..]
            .iter()
            .map(|l| (l.old_line, l.new_line))
            .collect();
        assert_eq!(
            numbers,
            vec![
                (Some(9), Some(9)),
                (Some(10), None),
                (Some(11), None),
                (None, Some(10)),
                (None, Some(11)),
                (None, Some(12)),
                (Some(12), Some(13)),
            ]
        );
        assert_eq!(diff.lines[7].content(), "    gtk.iconTheme.name = \"Papirus\";");
    }

    #[test]
    fn hunk_changes_stop_at_next_header() {
        let text = "--- a/f\n+++ b/f\n@@ -1 +1 @@\n-a\n+A\n@@ -9 +9 @@\n-z\n";
        let diff = UnifiedDiff::parse(text);
        let headers: Vec<_> = diff.hunk_headers().collect();
        assert_eq!(headers, vec![2, 5]);
        assert_eq!(diff.hunk_changes(2).collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(diff.hunk_changes(5).collect::<Vec<_>>(), vec![6]);
    }

    #[test]
    fn bad_hunk_header_is_kept_without_ranges() {
        let diff = UnifiedDiff::parse("--- a/f\n+++ b/f\n@@ broken @@\n+x\n");
        assert_eq!(diff.lines[2].kind, DiffLineKind::HunkHeader);
        assert_eq!(diff.lines[2].header, None);
        assert!(diff.has_changes());
    }

    #[test]
    fn carriage_returns_are_kept() {
        let diff = UnifiedDiff::parse("--- a/f\n+++ b/f\n@@ -1 +1 @@\r\n-a\r\n+b\r\n");
        let header = diff.lines[2].header.as_ref().unwrap();
        assert_eq!((header.old_start, header.new_start), (1, 1));
        assert_eq!(header.section, None);
        assert_eq!(diff.lines[3].text, "-a\r");
        assert_eq!(diff.lines[4].content(), "b\r");
    }

    #[test]
    fn empty_diff() {
        let diff = UnifiedDiff::parse("");
        assert!(diff.lines.is_empty());
        assert!(diff.preamble().is_empty());
        assert!(!diff.has_changes());
    }
}
