use super::{DiffLineKind, UnifiedDiff};

/// One side of a split row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    /// Index into [`UnifiedDiff::lines`]
    Line(usize),
    /// Blank filler keeping both columns aligned; never selectable
    Phantom,
}

impl Cell {
    pub fn line(self) -> Option<usize> {
        match self {
            Cell::Line(index) => Some(index),
            Cell::Phantom => None,
        }
    }
}

/// A visual row of the side-by-side view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Row {
    /// Header, context and marker lines, shown across both columns
    Full(usize),
    /// Removed line on the left, added line on the right
    Split { left: Cell, right: Cell },
}

/// Diff lines regrouped into two aligned columns.
///
/// A run of removed lines is paired with the run of added lines directly
/// after it; the shorter run is padded with [`Cell::Phantom`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideBySide {
    pub rows: Vec<Row>,
}

impl SideBySide {
    pub fn build(diff: &UnifiedDiff) -> Self {
        let mut rows = Vec::new();
        let mut removed: Vec<usize> = Vec::new();
        let mut added: Vec<usize> = Vec::new();

        for (index, line) in diff.lines.iter().enumerate() {
            match line.kind {
                DiffLineKind::Removed => {
                    if !added.is_empty() {
                        pair_runs(&mut rows, &mut removed, &mut added);
                    }
                    removed.push(index);
                }
                DiffLineKind::Added => added.push(index),
                _ => {
                    pair_runs(&mut rows, &mut removed, &mut added);
                    rows.push(Row::Full(index));
                }
            }
        }
        pair_runs(&mut rows, &mut removed, &mut added);

        SideBySide { rows }
    }

    /// Plain-text rendering with the left column padded to `width`.
    pub fn render(&self, diff: &UnifiedDiff, width: usize) -> String {
        let text = |cell: Cell| {
            cell.line()
                .and_then(|i| diff.lines.get(i))
                .map_or("", |l| l.text.as_str())
        };

        let mut out = String::new();
        for row in &self.rows {
            let line = match *row {
                Row::Full(index) => diff
                    .lines
                    .get(index)
                    .map(|l| l.text.clone())
                    .unwrap_or_default(),
                Row::Split { left, right } => {
                    format!("{:<width$} | {}", text(left), text(right), width = width)
                }
            };
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }
}

fn pair_runs(rows: &mut Vec<Row>, removed: &mut Vec<usize>, added: &mut Vec<usize>) {
    let height = removed.len().max(added.len());
    for i in 0..height {
        let cell = |run: &Vec<usize>| run.get(i).map_or(Cell::Phantom, |&index| Cell::Line(index));
        rows.push(Row::Split {
            left: cell(removed),
            right: cell(added),
        });
    }
    removed.clear();
    added.clear();
}
