//! Build a zero-context patch from the selected lines of a diff.
//!
//! The walk keeps two counters: `reference`, the line in the file the patch
//! will be applied to, and `offset`, how far the other side has drifted from
//! it through the hunks already emitted for the current file. Selected lines
//! pile up until an unselected line or a context line forces a hunk out, so
//! every emitted hunk is a contiguous block and its start is exact.

use crate::diff::{DiffLineKind, Hunk, ModifiedLines, UnifiedDiff};
use crate::selection::SelectionModel;
use std::fmt;
use tracing::{debug, trace};

/// File header lines and the hunks emitted under them.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FilePatch {
    pub header: Vec<String>,
    pub hunks: Vec<Hunk>,
}

/// A reconstructed patch, ready for `git apply --unidiff-zero`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Patch {
    pub files: Vec<FilePatch>,
}

impl Patch {
    /// No hunks at all: applying it would do nothing.
    pub fn is_empty(&self) -> bool {
        self.files.iter().all(|f| f.hunks.is_empty())
    }

    pub fn hunk_count(&self) -> usize {
        self.files.iter().map(|f| f.hunks.len()).sum()
    }
}

impl fmt::Display for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, file) in self.files.iter().enumerate() {
            // The first header goes out even with no hunks under it
            if i > 0 && file.hunks.is_empty() {
                continue;
            }
            for line in &file.header {
                writeln!(f, "{}", line)?;
            }
            for hunk in &file.hunks {
                write!(f, "{}", hunk)?;
            }
        }
        Ok(())
    }
}

/// Which side of the pending hunk the last included line went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Included {
    Nothing,
    Old,
    New,
}

struct Reconstructor {
    reverse: bool,
    files: Vec<FilePatch>,
    in_body: bool,
    /// False while skipping the body of a hunk whose header was unreadable
    in_hunk: bool,
    reference: u32,
    offset: i64,
    removed: ModifiedLines,
    added: ModifiedLines,
    last: Included,
}

impl Reconstructor {
    fn new(reverse: bool) -> Self {
        Self {
            reverse,
            files: vec![FilePatch::default()],
            in_body: false,
            in_hunk: false,
            reference: 0,
            offset: 0,
            removed: ModifiedLines::default(),
            added: ModifiedLines::default(),
            last: Included::Nothing,
        }
    }

    fn current(&mut self) -> &mut FilePatch {
        if self.files.is_empty() {
            self.files.push(FilePatch::default());
        }
        let last = self.files.len() - 1;
        &mut self.files[last]
    }

    fn file_header(&mut self, text: &str) {
        // A header-only file (binary, mode change) ends at the next `diff` line
        let next_file = text.starts_with("diff ") && !self.current().header.is_empty();
        if self.in_body || next_file {
            self.flush();
            self.files.push(FilePatch::default());
            self.in_body = false;
            self.in_hunk = false;
            self.offset = 0;
        }
        self.current().header.push(text.to_string());
    }

    fn hunk_header(&mut self, header: Option<&crate::diff::HunkHeader>) {
        self.flush();
        self.in_body = true;
        match header {
            Some(header) => {
                self.in_hunk = true;
                self.reference = header.reference_line(self.reverse);
            }
            None => {
                debug!("skipping hunk with unreadable header");
                self.in_hunk = false;
            }
        }
    }

    /// A line present in the target file that stays as it is.
    fn keep(&mut self) {
        self.flush();
        self.reference += 1;
        self.last = Included::Nothing;
    }

    fn include_removed(&mut self, text: &str) {
        self.removed.lines.push(format!("-{text}"));
        self.last = Included::Old;
    }

    fn include_added(&mut self, text: &str) {
        self.added.lines.push(format!("+{text}"));
        self.last = Included::New;
    }

    fn no_newline(&mut self) {
        match self.last {
            Included::Old => self.removed.missing_final_newline = true,
            Included::New => self.added.missing_final_newline = true,
            Included::Nothing => {}
        }
    }

    fn flush(&mut self) {
        self.last = Included::Nothing;
        if self.removed.lines.is_empty() && self.added.lines.is_empty() {
            return;
        }

        let mut old = std::mem::take(&mut self.removed);
        let mut new = std::mem::take(&mut self.added);
        let removed = old.lines.len() as u32;
        let added = new.lines.len() as u32;
        let target = (i64::from(self.reference) + self.offset).max(0) as u32;

        // An empty side names the line before it
        old.start = if removed == 0 {
            self.reference.saturating_sub(1)
        } else {
            self.reference
        };
        new.start = if added == 0 {
            target.saturating_sub(1)
        } else {
            target
        };

        let hunk = Hunk { old, new };
        trace!(header = %hunk.header(), "emitting hunk");
        self.current().hunks.push(hunk);

        self.reference += removed;
        self.offset += i64::from(added) - i64::from(removed);
    }
}

/// Build the patch for the lines `is_active` picks out of `diff`.
///
/// With `reverse` set, added lines become removals and the other way round,
/// and the patch is positioned against the new side of the diff: this is the
/// patch that takes the selected changes back out.
pub fn reconstruct_with(
    diff: &UnifiedDiff,
    is_active: impl Fn(usize) -> bool,
    reverse: bool,
) -> Patch {
    let mut state = Reconstructor::new(reverse);

    for (index, line) in diff.lines.iter().enumerate() {
        match line.kind {
            DiffLineKind::FileHeader => state.file_header(&line.text),
            DiffLineKind::HunkHeader => state.hunk_header(line.header.as_ref()),
            _ if !state.in_hunk => {}
            DiffLineKind::Context => state.keep(),
            DiffLineKind::Removed => match (is_active(index), reverse) {
                (true, false) => state.include_removed(line.content()),
                (true, true) => state.include_added(line.content()),
                (false, false) => state.keep(),
                (false, true) => state.last = Included::Nothing,
            },
            DiffLineKind::Added => match (is_active(index), reverse) {
                (true, false) => state.include_added(line.content()),
                (true, true) => state.include_removed(line.content()),
                (false, true) => state.keep(),
                (false, false) => state.last = Included::Nothing,
            },
            DiffLineKind::NoNewline => state.no_newline(),
        }
    }
    state.flush();

    Patch { files: state.files }
}

/// Build the patch for the active lines of `selection`.
pub fn reconstruct(diff: &UnifiedDiff, selection: &SelectionModel, reverse: bool) -> Patch {
    reconstruct_with(diff, |i| selection.is_active(i), reverse)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::command::DiffSource;
    use crate::diff::HunkHeader;
    use proptest::prelude::*;
    use similar_asserts::assert_eq;

    const PREAMBLE: &str = "diff --git a/f b/f\nindex 1111111..2222222 100644\n--- a/f\n+++ b/f\n";

    fn all(diff: &UnifiedDiff, reverse: bool) -> String {
        reconstruct_with(diff, |_| true, reverse).to_string()
    }

    fn picked(diff: &UnifiedDiff, lines: &[usize], reverse: bool) -> String {
        reconstruct_with(diff, |i| lines.contains(&i), reverse).to_string()
    }

    #[test]
    fn replaced_line_between_context() {
        let text = format!("{PREAMBLE}@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n");
        let diff = UnifiedDiff::parse(&text);
        let mut selection = SelectionModel::new(&diff, DiffSource::WorkingCopy);
        selection.toggle_line(6);
        selection.toggle_line(7);

        let patch = reconstruct(&diff, &selection, false);
        assert_eq!(patch.hunk_count(), 1);
        assert_eq!(patch.to_string(), format!("{PREAMBLE}@@ -2 +2 @@\n-b\n+B\n"));
    }

    #[test]
    fn zero_context_diff_round_trips() {
        let text = format!(
            "{PREAMBLE}@@ -3 +2,0 @@\n-gone\n@@ -9,0 +9,2 @@\n+one\n+two\n@@ -20,2 +21 @@\n-x\n-y\n+z\n"
        );
        let diff = UnifiedDiff::parse(&text);
        assert_eq!(all(&diff, false), text);
    }

    #[test]
    fn crlf_lines_round_trip() {
        let text = format!("{PREAMBLE}@@ -2 +2 @@\n-two\r\n+TWO\r\n@@ -5,0 +6 @@\n+six\r\n");
        let diff = UnifiedDiff::parse(&text);
        assert_eq!(all(&diff, false), text);
        assert_eq!(
            all(&diff, true),
            format!("{PREAMBLE}@@ -2 +2 @@\n-TWO\r\n+two\r\n@@ -6 +5,0 @@\n-six\r\n")
        );
    }

    #[test]
    fn file_start_insertion_round_trips() {
        let text = format!("{PREAMBLE}@@ -0,0 +1,2 @@\n+first\n+second\n");
        assert_eq!(all(&UnifiedDiff::parse(&text), false), text);
    }

    #[test]
    fn nothing_selected_is_preamble_only() {
        let text = format!("{PREAMBLE}@@ -1,3 +1,3 @@\n a\n-b\n+B\n c\n");
        let diff = UnifiedDiff::parse(&text);
        let patch = reconstruct_with(&diff, |_| false, false);
        assert!(patch.is_empty());
        assert_eq!(patch.to_string(), PREAMBLE);
    }

    #[test]
    fn unselected_removal_stays_in_file() {
        // -b kept, -c taken: c is one line further down
        let text = format!("{PREAMBLE}@@ -1,4 +1,2 @@\n a\n-b\n-c\n d\n");
        let diff = UnifiedDiff::parse(&text);
        assert_eq!(picked(&diff, &[7], false), format!("{PREAMBLE}@@ -3 +2,0 @@\n-c\n"));
    }

    #[test]
    fn unselected_addition_is_dropped() {
        let text = format!("{PREAMBLE}@@ -1,2 +1,4 @@\n a\n+x\n+y\n b\n");
        let diff = UnifiedDiff::parse(&text);
        assert_eq!(picked(&diff, &[7], false), format!("{PREAMBLE}@@ -1,0 +2 @@\n+y\n"));
    }

    #[test]
    fn non_contiguous_selection_splits_hunks() {
        let text = format!("{PREAMBLE}@@ -1,3 +1,1 @@\n-a\n-b\n-c\n+z\n");
        let diff = UnifiedDiff::parse(&text);
        // take -a and -c, leave -b
        assert_eq!(
            picked(&diff, &[5, 7], false),
            format!("{PREAMBLE}@@ -1 +0,0 @@\n-a\n@@ -3 +1,0 @@\n-c\n")
        );
    }

    #[test]
    fn offset_carries_across_hunks() {
        let text = format!("{PREAMBLE}@@ -1,0 +2,2 @@\n+p\n+q\n@@ -5 +7 @@\n-e\n+E\n");
        let diff = UnifiedDiff::parse(&text);
        assert_eq!(all(&diff, false), text);
        // dropping the first hunk pulls the second back to its old position
        assert_eq!(
            picked(&diff, &[8, 9], false),
            format!("{PREAMBLE}@@ -5 +5 @@\n-e\n+E\n")
        );
    }

    #[test]
    fn reverse_flips_polarity_and_side() {
        let text = format!("{PREAMBLE}@@ -4,2 +4,3 @@\n-old\n+new\n+more\n ctx\n");
        let diff = UnifiedDiff::parse(&text);
        assert_eq!(
            all(&diff, true),
            format!("{PREAMBLE}@@ -4,2 +4 @@\n-new\n-more\n+old\n")
        );
    }

    #[test]
    fn reverse_keeps_unselected_additions() {
        let text = format!("{PREAMBLE}@@ -1,2 +1,4 @@\n a\n+x\n+y\n b\n");
        let diff = UnifiedDiff::parse(&text);
        assert_eq!(picked(&diff, &[7], true), format!("{PREAMBLE}@@ -3 +2,0 @@\n-y\n"));
    }

    #[test]
    fn missing_newline_follows_its_line() {
        let text = format!(
            "{PREAMBLE}@@ -1 +1 @@\n-old\n\\ No newline at end of file\n+new\n\\ No newline at end of file\n"
        );
        let diff = UnifiedDiff::parse(&text);
        assert_eq!(all(&diff, false), text);

        // only the addition: the removed line's marker has nothing to attach to
        assert_eq!(
            picked(&diff, &[7], false),
            format!("{PREAMBLE}@@ -1,0 +2 @@\n+new\n\\ No newline at end of file\n")
        );
    }

    #[test]
    fn later_files_need_a_hunk() {
        let second = "diff --git a/g b/g\n--- a/g\n+++ b/g\n";
        let text = format!("{PREAMBLE}@@ -1 +1 @@\n-a\n+A\n{second}@@ -7 +7 @@\n-g\n+G\n");
        let diff = UnifiedDiff::parse(&text);

        assert_eq!(all(&diff, false), text);
        assert_eq!(
            picked(&diff, &[5, 6], false),
            format!("{PREAMBLE}@@ -1 +1 @@\n-a\n+A\n")
        );
        assert_eq!(
            picked(&diff, &[11, 12], false),
            format!("{PREAMBLE}{second}@@ -7 +7 @@\n-g\n+G\n")
        );
    }

    #[test]
    fn unreadable_hunk_is_skipped() {
        let text = format!("{PREAMBLE}@@ garbage @@\n-a\n+A\n@@ -5 +5 @@\n-e\n+E\n");
        let diff = UnifiedDiff::parse(&text);
        assert_eq!(all(&diff, false), format!("{PREAMBLE}@@ -5 +5 @@\n-e\n+E\n"));
    }

    /// Counts in each emitted header, and the lines actually under it.
    fn header_and_body_counts(patch: &str) -> Vec<((u32, u32), (u32, u32))> {
        let reparsed = UnifiedDiff::parse(patch);
        let mut out: Vec<((u32, u32), (u32, u32))> = Vec::new();
        for line in &reparsed.lines {
            match line.kind {
                DiffLineKind::HunkHeader => {
                    let header: &HunkHeader = line.header.as_ref().unwrap();
                    out.push(((header.old_count, header.new_count), (0, 0)));
                }
                DiffLineKind::Removed => out.last_mut().unwrap().1.0 += 1,
                DiffLineKind::Added => out.last_mut().unwrap().1.1 += 1,
                _ => {}
            }
        }
        out
    }

    fn arb_hunk_body() -> impl Strategy<Value = Vec<(char, bool)>> {
        prop::collection::vec(
            (prop::sample::select(vec![' ', '-', '+']), any::<bool>()),
            1..24,
        )
    }

    fn build_diff(body: &[(char, bool)]) -> (String, Vec<bool>) {
        let old = body.iter().filter(|(c, _)| *c != '+').count();
        let new = body.iter().filter(|(c, _)| *c != '-').count();
        let mut text = format!("{PREAMBLE}@@ -5,{old} +5,{new} @@\n");
        let mut selected = vec![false; 5];
        for (i, (marker, pick)) in body.iter().enumerate() {
            text.push_str(&format!("{marker}line {i}\n"));
            selected.push(*pick);
        }
        (text, selected)
    }

    proptest! {
        #[test]
        fn counts_match_bodies(body in arb_hunk_body(), reverse in any::<bool>()) {
            let (text, selected) = build_diff(&body);
            let diff = UnifiedDiff::parse(&text);
            let patch = reconstruct_with(&diff, |i| selected[i], reverse).to_string();

            for (header, lines) in header_and_body_counts(&patch) {
                prop_assert_eq!(header, lines);
            }
        }

        #[test]
        fn reverse_is_the_inverse(body in arb_hunk_body()) {
            let (text, _) = build_diff(&body);
            let diff = UnifiedDiff::parse(&text);
            let forward = reconstruct_with(&diff, |_| true, false);
            let backward = reconstruct_with(&diff, |_| true, true);

            let forward = &forward.files[0].hunks;
            let backward = &backward.files[0].hunks;
            prop_assert_eq!(forward.len(), backward.len());
            for (f, b) in forward.iter().zip(backward) {
                let flip = |lines: &[String], to: char| -> Vec<String> {
                    lines.iter().map(|l| format!("{to}{}", &l[1..])).collect()
                };
                prop_assert_eq!(flip(f.new.lines.as_slice(), '-'), b.old.lines.clone());
                prop_assert_eq!(flip(f.old.lines.as_slice(), '+'), b.new.lines.clone());
                let (fh, bh) = (f.header(), b.header());
                prop_assert_eq!((fh.old_count, fh.new_count), (bh.new_count, bh.old_count));
            }
        }

        #[test]
        fn reverse_of_a_selection_swaps_sides(body in arb_hunk_body()) {
            let (text, selected) = build_diff(&body);
            let diff = UnifiedDiff::parse(&text);
            let forward = reconstruct_with(&diff, |i| selected[i], false);
            let backward = reconstruct_with(&diff, |i| selected[i], true);

            // Hunks may split differently, the lines themselves may not
            let side = |patch: &Patch, old: bool| -> Vec<String> {
                patch
                    .files
                    .iter()
                    .flat_map(|file| &file.hunks)
                    .flat_map(|hunk| if old { &hunk.old.lines } else { &hunk.new.lines })
                    .map(|line| line[1..].to_string())
                    .collect()
            };
            prop_assert_eq!(side(&forward, true), side(&backward, false));
            prop_assert_eq!(side(&forward, false), side(&backward, true));
        }
    }
}
