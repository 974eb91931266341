//! Pixel geometry for the schedule grid
//!
//! Turns the grouped appointments into a fully positioned render model:
//! the view window, the track height, and one positioned block per
//! appointment. Vertical placement is proportional to the window;
//! horizontal placement splits a member's lane between overlap columns.

use super::columns::{assign_columns, chronological_order};
use super::model::{MemberAppointments, Organization, StatusStyle};
use super::window::ViewWindow;
use crate::time::minutes_to_time;
use chrono::NaiveDate;

/// How overlapping appointments share a lane horizontally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnMode {
    /// `n` columns of equal width
    #[default]
    EqualWidth,
    /// Two halves only: column 0 on the left, every other column on the right
    SplitHalves,
}

/// Sizing knobs for the grid
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    /// Height of one 30-minute slot in pixels
    pub slot_height_px: f64,
    pub column_mode: ColumnMode,
    /// Width of the hour label column on the left of the grid
    pub time_axis_width_px: u32,
    /// Minimum width of a member lane
    pub lane_min_width_px: u32,
    /// Total document width
    pub page_width_px: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            slot_height_px: 60.0,
            column_mode: ColumnMode::EqualWidth,
            time_axis_width_px: 64,
            lane_min_width_px: 160,
            page_width_px: 800,
        }
    }
}

impl LayoutConfig {
    /// Pixel height of the whole window for one lane
    pub fn track_height(&self, window: &ViewWindow) -> f64 {
        f64::from(window.end_hour - window.start_hour) * 2.0 * self.slot_height_px
    }
}

/// Vertical position of a `[start, end)` span inside the window.
///
/// Returns `(top, height)` in pixels.
pub fn vertical_span(window: &ViewWindow, track_height: f64, start: u32, end: u32) -> (f64, f64) {
    let total = f64::from(window.total_minutes());
    let offset = f64::from(start.saturating_sub(window.start_minutes()));
    // keep the block inside the grid if it runs past the window
    let visible_end = end.min(window.end_minutes()).max(start);
    let duration = f64::from(visible_end - start);
    (offset / total * track_height, duration / total * track_height)
}

/// Horizontal position of a column inside the lane, as `(left, width)` percentages.
pub fn horizontal_span(mode: ColumnMode, column: usize, max_columns: usize) -> (f64, f64) {
    let max_columns = max_columns.max(1);
    if max_columns == 1 {
        return (0.0, 100.0);
    }
    match mode {
        ColumnMode::EqualWidth => {
            let width = 100.0 / max_columns as f64;
            (column as f64 * width, width)
        }
        ColumnMode::SplitHalves => {
            if column == 0 {
                (0.0, 50.0)
            } else {
                (50.0, 50.0)
            }
        }
    }
}

/// A positioned appointment
#[derive(Debug, Clone, PartialEq)]
pub struct BlockLayout {
    pub start_minutes: u32,
    pub end_minutes: u32,
    pub column: usize,
    pub top_px: f64,
    pub height_px: f64,
    pub left_pct: f64,
    pub width_pct: f64,
    pub time_label: String,
    pub client_name: String,
    pub service_name: String,
    pub style: &'static StatusStyle,
}

/// A member's lane with its positioned appointments, in start order
#[derive(Debug, Clone, PartialEq)]
pub struct LaneLayout {
    pub member_id: Option<String>,
    pub member_name: String,
    pub max_columns: usize,
    pub blocks: Vec<BlockLayout>,
}

/// A horizontal grid line
#[derive(Debug, Clone, PartialEq)]
pub struct GridLine {
    pub top_px: f64,
    /// `Some("HH:MM")` on full hours, `None` on half hours
    pub label: Option<String>,
}

/// The fully resolved schedule for one organization and day
#[derive(Debug, Clone, PartialEq)]
pub struct AgendaLayout {
    pub organization: Organization,
    pub date: NaiveDate,
    pub window: ViewWindow,
    pub track_height_px: f64,
    pub lane_width_px: u32,
    pub grid_lines: Vec<GridLine>,
    pub lanes: Vec<LaneLayout>,
    pub total_appointments: usize,
    pub config: LayoutConfig,
}

impl AgendaLayout {
    pub fn is_empty(&self) -> bool {
        self.total_appointments == 0
    }
}

/// Builds the render model for a day.
pub fn build_layout(
    organization: &Organization,
    members: &[MemberAppointments],
    date: NaiveDate,
    config: &LayoutConfig,
) -> AgendaLayout {
    let spans_per_member: Vec<Vec<(u32, u32)>> = members
        .iter()
        .map(|m| {
            m.appointments
                .iter()
                .map(|a| (a.start_minutes(), a.end_minutes()))
                .collect()
        })
        .collect();

    let window = ViewWindow::compute(spans_per_member.iter().flatten().copied());
    let track_height = config.track_height(&window);

    let lanes: Vec<LaneLayout> = members
        .iter()
        .zip(&spans_per_member)
        .map(|(entry, spans)| {
            let assignment = assign_columns(spans);
            let blocks = chronological_order(spans)
                .into_iter()
                .map(|idx| {
                    let appt = &entry.appointments[idx];
                    let (start, end) = spans[idx];
                    let column = assignment.columns[idx];
                    let (top_px, height_px) = vertical_span(&window, track_height, start, end);
                    let (left_pct, width_pct) =
                        horizontal_span(config.column_mode, column, assignment.max_columns);
                    BlockLayout {
                        start_minutes: start,
                        end_minutes: end,
                        column,
                        top_px,
                        height_px,
                        left_pct,
                        width_pct,
                        time_label: format!("{} - {}", minutes_to_time(start), minutes_to_time(end)),
                        client_name: appt.client_name.clone(),
                        service_name: appt.service_name.clone(),
                        style: appt.status.style(),
                    }
                })
                .collect();
            LaneLayout {
                member_id: entry.member.id.clone(),
                member_name: entry.member.display_name(),
                max_columns: assignment.max_columns,
                blocks,
            }
        })
        .collect();

    let slot_count = (window.end_hour - window.start_hour) * 2;
    let grid_lines = (0..=slot_count)
        .map(|slot| GridLine {
            top_px: f64::from(slot) * config.slot_height_px,
            label: (slot % 2 == 0).then(|| minutes_to_time(window.start_minutes() + slot * 30)),
        })
        .collect();

    let lane_count = lanes.len().max(1) as u32;
    let lane_width_px = (config.page_width_px.saturating_sub(config.time_axis_width_px + 32) / lane_count)
        .max(config.lane_min_width_px);

    AgendaLayout {
        organization: organization.clone(),
        date,
        window,
        track_height_px: track_height,
        lane_width_px,
        grid_lines,
        total_appointments: spans_per_member.iter().map(Vec::len).sum(),
        lanes,
        config: config.clone(),
    }
}
