//! Which diff lines the user has picked.
//!
//! Selection state is kept next to the parsed diff rather than on it: one flag
//! per line index. Only added and removed lines can ever be active.

use crate::command::DiffSource;
use crate::diff::{Cell, DiffLineKind, UnifiedDiff};
use crate::parse::LineRef;
use std::collections::BTreeMap;

/// What can be done with a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchAction {
    /// Add the selected working-copy changes to the index
    Stage,
    /// Take the selected staged changes back out of the index
    Unstage,
    /// Throw away the selected working-copy changes
    Discard,
}

impl PatchAction {
    /// Whether the patch is built in reverse.
    pub fn reverse(self) -> bool {
        matches!(self, PatchAction::Unstage | PatchAction::Discard)
    }

    /// Whether the patch is applied to the index rather than the work tree.
    pub fn cached(self) -> bool {
        matches!(self, PatchAction::Stage | PatchAction::Unstage)
    }
}

#[derive(Debug, Clone, Default)]
struct HunkToggle {
    active: bool,
    members: Vec<usize>,
}

/// Active flags for the lines of one [`UnifiedDiff`].
#[derive(Debug, Clone)]
pub struct SelectionModel {
    source: DiffSource,
    active: Vec<bool>,
    selectable: Vec<bool>,
    /// Keyed by the hunk header's line index
    hunks: BTreeMap<usize, HunkToggle>,
}

impl SelectionModel {
    /// An empty selection over `diff`.
    pub fn new(diff: &UnifiedDiff, source: DiffSource) -> Self {
        let hunks = diff
            .hunk_headers()
            .map(|header| {
                let toggle = HunkToggle {
                    active: false,
                    members: diff.hunk_changes(header).collect(),
                };
                (header, toggle)
            })
            .collect();

        Self {
            source,
            active: vec![false; diff.lines.len()],
            selectable: diff.lines.iter().map(|l| l.is_change()).collect(),
            hunks,
        }
    }

    pub fn source(&self) -> &DiffSource {
        &self.source
    }

    /// Flip one added or removed line. Anything else is ignored.
    pub fn toggle_line(&mut self, index: usize) {
        if self.selectable.get(index).copied().unwrap_or(false) {
            self.active[index] = !self.active[index];
        }
    }

    /// Set one added or removed line. Anything else is ignored.
    pub fn set_active(&mut self, index: usize, active: bool) {
        if self.selectable.get(index).copied().unwrap_or(false) {
            self.active[index] = active;
        }
    }

    /// Flip a hunk header's own state and give every change in the hunk that
    /// state, whatever the lines were before.
    pub fn toggle_hunk(&mut self, header: usize) {
        let Some(toggle) = self.hunks.get_mut(&header) else {
            return;
        };
        toggle.active = !toggle.active;
        for &member in &toggle.members {
            self.active[member] = toggle.active;
        }
    }

    /// Toggle from a side-by-side cell. Phantom cells do nothing.
    pub fn toggle_cell(&mut self, cell: Cell) {
        if let Some(index) = cell.line() {
            self.toggle_line(index);
        }
    }

    pub fn select_all(&mut self) {
        for (active, &selectable) in self.active.iter_mut().zip(&self.selectable) {
            *active = selectable;
        }
        for toggle in self.hunks.values_mut() {
            toggle.active = true;
        }
    }

    pub fn clear(&mut self) {
        self.active.fill(false);
        for toggle in self.hunks.values_mut() {
            toggle.active = false;
        }
    }

    pub fn is_active(&self, index: usize) -> bool {
        self.active.get(index).copied().unwrap_or(false)
    }

    pub fn any_active(&self) -> bool {
        self.active.contains(&true)
    }

    pub fn active_count(&self) -> usize {
        self.active.iter().filter(|&&a| a).count()
    }

    /// Actions offered for the current selection.
    pub fn available_actions(&self) -> &'static [PatchAction] {
        if !self.any_active() {
            return &[];
        }
        match self.source {
            DiffSource::WorkingCopy => &[PatchAction::Stage, PatchAction::Discard],
            DiffSource::Staged => &[PatchAction::Unstage],
            DiffSource::Commit(_) => &[],
        }
    }

    /// Activate the lines named by `refs`. Returns how many changed lines
    /// matched.
    ///
    /// Added lines are matched by new line number, removed lines by old line
    /// number, and `@N` takes the N-th hunk whole, like [`toggle_hunk`] on an
    /// inactive header.
    ///
    /// [`toggle_hunk`]: SelectionModel::toggle_hunk
    pub fn select_refs(&mut self, diff: &UnifiedDiff, refs: &[LineRef]) -> usize {
        let headers: Vec<usize> = self.hunks.keys().copied().collect();
        let mut matched = vec![false; self.active.len()];

        for line_ref in refs {
            if let LineRef::Hunk(n) = line_ref {
                let Some(toggle) = headers
                    .get(n.get() as usize - 1)
                    .and_then(|h| self.hunks.get_mut(h))
                else {
                    continue;
                };
                toggle.active = true;
                for &member in &toggle.members {
                    matched[member] = true;
                }
            }
        }

        for (index, line) in diff.lines.iter().enumerate() {
            let hit = match line.kind {
                DiffLineKind::Added => line
                    .new_line
                    .is_some_and(|n| refs.iter().any(|r| matches_added(r, n))),
                DiffLineKind::Removed => line
                    .old_line
                    .is_some_and(|n| refs.iter().any(|r| matches_removed(r, n))),
                _ => false,
            };
            if hit {
                matched[index] = true;
            }
        }

        let mut count = 0;
        for (index, hit) in matched.into_iter().enumerate() {
            if hit && self.selectable.get(index).copied().unwrap_or(false) {
                self.active[index] = true;
                count += 1;
            }
        }
        count
    }
}

fn matches_added(line_ref: &LineRef, n: u32) -> bool {
    match line_ref {
        LineRef::Add(line) => line.get() == n,
        LineRef::AddRange(start, end) => (start.get()..=end.get()).contains(&n),
        _ => false,
    }
}

fn matches_removed(line_ref: &LineRef, n: u32) -> bool {
    match line_ref {
        LineRef::Delete(line) => line.get() == n,
        LineRef::DeleteRange(start, end) => (start.get()..=end.get()).contains(&n),
        _ => false,
    }
}
