//! Turns lane events into drawable geometry.
//!
//! Everything here is expressed on a grid of `(column, row)` cells; a renderer
//! converts grid points to pixels with [`RowMetrics`].

use super::lanes::{LaneEvent, LaneId, RowLayout};
use serde::Serialize;
use std::collections::BTreeMap;

/// Lane colors, in allocation order.
pub const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Resolve a palette index, wrapping like the allocator does.
pub fn palette_color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridPoint {
    pub column: usize,
    pub row: usize,
}

impl GridPoint {
    pub fn new(column: usize, row: usize) -> Self {
        Self { column, row }
    }
}

/// The polyline drawn for one lane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanePath {
    pub lane: LaneId,
    pub color: usize,
    pub stroke: &'static str,
    pub points: Vec<GridPoint>,
    /// Still waiting for a commit on a later page
    pub open: bool,
}

impl LanePath {
    fn new(lane: LaneId, color: usize, start: GridPoint) -> Self {
        Self {
            lane,
            color,
            stroke: palette_color(color),
            points: vec![start],
            open: true,
        }
    }

    fn push(&mut self, point: GridPoint) {
        if self.points.last() != Some(&point) {
            self.points.push(point);
        }
    }

    /// Consecutive point pairs; a diagonal pair is a lane changing column.
    pub fn segments(&self) -> impl Iterator<Item = (GridPoint, GridPoint)> + '_ {
        self.points.windows(2).map(|pair| (pair[0], pair[1]))
    }

    pub fn end(&self) -> Option<GridPoint> {
        self.points.last().copied()
    }
}

/// A commit dot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub hash: String,
    pub at: GridPoint,
    pub color: usize,
    pub fill: &'static str,
}

/// Everything a renderer needs for the rows laid out so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Geometry {
    pub nodes: Vec<Node>,
    pub paths: Vec<LanePath>,
    /// Widest row seen, in columns
    pub width: usize,
}

impl Geometry {
    pub fn path(&self, lane: LaneId) -> Option<&LanePath> {
        self.paths.iter().find(|p| p.lane == lane)
    }
}

/// Accumulates lane polylines row by row.
///
/// Like the lane assigner, a builder lives as long as the graph view and is
/// fed every page in order.
#[derive(Debug, Default)]
pub struct GraphGeometryBuilder {
    open: BTreeMap<LaneId, LanePath>,
    closed: Vec<LanePath>,
    nodes: Vec<Node>,
    width: usize,
}

impl GraphGeometryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn push_rows<'a, I>(&mut self, rows: I)
    where
        I: IntoIterator<Item = &'a RowLayout>,
    {
        for row in rows {
            self.push_row(row);
        }
    }

    /// Apply one row's lane events.
    pub fn push_row(&mut self, layout: &RowLayout) {
        let row = layout.row;
        let mut width = layout.lane_count.max(layout.column + 1);

        for event in &layout.events {
            match *event {
                LaneEvent::Opened {
                    lane,
                    column,
                    color,
                } => {
                    self.open
                        .insert(lane, LanePath::new(lane, color, GridPoint::new(column, row)));
                }
                LaneEvent::Joined {
                    lane,
                    from_column,
                    into_column,
                    ..
                } => {
                    width = width.max(from_column + 1);
                    self.close(lane, Some(GridPoint::new(into_column, row)));
                }
                LaneEvent::Continued {
                    lane,
                    column,
                    color,
                } => {
                    let point = GridPoint::new(column, row);
                    self.open
                        .entry(lane)
                        .or_insert_with(|| LanePath::new(lane, color, point))
                        .push(point);
                }
                LaneEvent::Forked {
                    lane,
                    origin_column,
                    color,
                    ..
                } => {
                    self.open.insert(
                        lane,
                        LanePath::new(lane, color, GridPoint::new(origin_column, row)),
                    );
                }
                LaneEvent::Terminated { lane, .. } => self.close(lane, None),
            }
        }

        self.width = self.width.max(width);
        self.nodes.push(Node {
            hash: layout.hash.clone(),
            at: GridPoint::new(layout.column, row),
            color: layout.color,
            fill: palette_color(layout.color),
        });
    }

    fn close(&mut self, lane: LaneId, end: Option<GridPoint>) {
        if let Some(mut path) = self.open.remove(&lane) {
            if let Some(end) = end {
                path.push(end);
            }
            path.open = false;
            self.closed.push(path);
        }
    }

    /// Snapshot of the geometry so far; lanes still awaiting commits are
    /// included with `open: true`.
    pub fn geometry(&self) -> Geometry {
        let mut paths = self.closed.clone();
        paths.extend(self.open.values().cloned());
        paths.sort_by_key(|p| p.lane);
        Geometry {
            nodes: self.nodes.clone(),
            paths,
            width: self.width,
        }
    }
}

/// Pixel layout of the grid.
///
/// Row height is uniform across the graph and fixed once from the first row a
/// renderer measures, so the graph lines up with the commit list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowMetrics {
    lane_width: f32,
    row_height: Option<f32>,
}

impl RowMetrics {
    pub fn new(lane_width: f32) -> Self {
        Self {
            lane_width,
            row_height: None,
        }
    }

    /// Record the measured height of the first row. Later calls are ignored.
    pub fn calibrate(&mut self, measured: f32) -> f32 {
        match self.row_height {
            Some(height) => height,
            None => {
                self.row_height = Some(measured);
                measured
            }
        }
    }

    pub fn row_height(&self) -> Option<f32> {
        self.row_height
    }

    /// Center of a grid cell in pixels, once calibrated.
    pub fn project(&self, point: GridPoint) -> Option<(f32, f32)> {
        let height = self.row_height?;
        Some((
            (point.column as f32 + 0.5) * self.lane_width,
            (point.row as f32 + 0.5) * height,
        ))
    }
}
