use crate::log::CommitRecord;
use serde::Serialize;

/// Stable identity of a lane, independent of its current column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LaneId(u64);

/// Hands out palette indices to new lanes, wrapping at the palette size.
#[derive(Debug, Clone)]
pub struct ColorAllocator {
    cursor: usize,
    palette_len: usize,
}

impl ColorAllocator {
    pub fn new(palette_len: usize) -> Self {
        Self {
            cursor: 0,
            palette_len: palette_len.max(1),
        }
    }

    /// Advance the cursor and return the color for a newly created lane.
    pub fn allocate(&mut self) -> usize {
        let color = self.cursor % self.palette_len;
        self.cursor += 1;
        color
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}

/// A vertical line in the graph, waiting for the commit it will connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lane {
    pub id: LaneId,
    /// Hash of the commit this lane runs down to
    pub expected: String,
    /// Palette index, fixed for the lifetime of the lane
    pub color: usize,
}

/// What happened to a lane while laying out one row.
///
/// Events are emitted in the order the geometry builder must apply them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LaneEvent {
    /// A commit nobody was waiting for starts a new lane at the right edge.
    Opened {
        lane: LaneId,
        column: usize,
        color: usize,
    },
    /// A second child's lane merges into the commit's column and ends here.
    Joined {
        lane: LaneId,
        from_column: usize,
        into_column: usize,
        color: usize,
    },
    /// The lane passes through this row at `column`.
    Continued {
        lane: LaneId,
        column: usize,
        color: usize,
    },
    /// A merge commit's extra parent gets its own lane, drawn out of the commit.
    Forked {
        lane: LaneId,
        origin_column: usize,
        column: usize,
        color: usize,
    },
    /// A root commit: the lane has nothing left to wait for.
    Terminated { lane: LaneId, column: usize },
}

/// Placement of one commit in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowLayout {
    pub row: usize,
    pub hash: String,
    pub column: usize,
    pub color: usize,
    pub events: Vec<LaneEvent>,
    /// Number of lanes alive after this row
    pub lane_count: usize,
}

/// Assigns commits to lanes, one commit at a time in `--date-order`.
///
/// The assigner is long-lived: feeding it several pages of the same history
/// continues the graph seamlessly. Call [`LaneAssigner::reset`] when the
/// starting ref changes.
#[derive(Debug, Clone)]
pub struct LaneAssigner {
    lanes: Vec<Lane>,
    colors: ColorAllocator,
    next_lane: u64,
    next_row: usize,
}

impl LaneAssigner {
    pub fn new(palette_len: usize) -> Self {
        Self {
            lanes: Vec::new(),
            colors: ColorAllocator::new(palette_len),
            next_lane: 0,
            next_row: 0,
        }
    }

    /// Lanes currently alive, left to right.
    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    /// Row the next commit will be placed on.
    pub fn next_row(&self) -> usize {
        self.next_row
    }

    pub fn reset(&mut self) {
        self.lanes.clear();
        self.colors.reset();
        self.next_lane = 0;
        self.next_row = 0;
    }

    /// Lay out a batch of commits, continuing from any previous batch.
    pub fn assign_all<'a, I>(&mut self, commits: I) -> Vec<RowLayout>
    where
        I: IntoIterator<Item = &'a CommitRecord>,
    {
        commits.into_iter().map(|c| self.assign(c)).collect()
    }

    /// Place one commit and update the lane list for its parents.
    pub fn assign(&mut self, commit: &CommitRecord) -> RowLayout {
        let row = self.next_row;
        self.next_row += 1;
        let mut events = Vec::new();

        let matches: Vec<usize> = self
            .lanes
            .iter()
            .enumerate()
            .filter(|(_, lane)| lane.expected == commit.hash)
            .map(|(index, _)| index)
            .collect();

        let (column, opened) = match matches.first() {
            Some(&first) => (first, None),
            None => {
                let lane = self.new_lane(&commit.hash);
                let column = self.lanes.len();
                events.push(LaneEvent::Opened {
                    lane: lane.id,
                    column,
                    color: lane.color,
                });
                let id = lane.id;
                self.lanes.push(lane);
                (column, Some(id))
            }
        };

        // Every other lane waiting for this commit ends in its column. All of
        // them sit to the right of `column`, so removing them keeps it valid.
        for &index in matches.iter().skip(1) {
            let lane = &self.lanes[index];
            events.push(LaneEvent::Joined {
                lane: lane.id,
                from_column: index,
                into_column: column,
                color: lane.color,
            });
        }
        for &index in matches.iter().skip(1).rev() {
            self.lanes.remove(index);
        }

        events.extend(
            self.lanes
                .iter()
                .enumerate()
                .filter(|(_, lane)| Some(lane.id) != opened)
                .map(|(index, lane)| LaneEvent::Continued {
                    lane: lane.id,
                    column: index,
                    color: lane.color,
                }),
        );

        let color = self
            .lanes
            .get(column)
            .map(|lane| lane.color)
            .unwrap_or_default();

        match commit.parents.split_first() {
            None => {
                if column < self.lanes.len() {
                    let lane = self.lanes.remove(column);
                    events.push(LaneEvent::Terminated {
                        lane: lane.id,
                        column,
                    });
                }
            }
            Some((mainline, others)) => {
                if let Some(lane) = self.lanes.get_mut(column) {
                    lane.expected = mainline.clone();
                }
                for (offset, parent) in others.iter().enumerate() {
                    let at = (column + 1 + offset).min(self.lanes.len());
                    let lane = self.new_lane(parent);
                    events.push(LaneEvent::Forked {
                        lane: lane.id,
                        origin_column: column,
                        column: at,
                        color: lane.color,
                    });
                    self.lanes.insert(at, lane);
                }
            }
        }

        RowLayout {
            row,
            hash: commit.hash.clone(),
            column,
            color,
            events,
            lane_count: self.lanes.len(),
        }
    }

    fn new_lane(&mut self, expected: &str) -> Lane {
        let id = LaneId(self.next_lane);
        self.next_lane += 1;
        Lane {
            id,
            expected: expected.to_string(),
            color: self.colors.allocate(),
        }
    }
}
