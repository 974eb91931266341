//! The hour-aligned time range a schedule grid spans

use crate::time::MINUTES_PER_DAY;

/// Window used when the day has no appointments
pub const DEFAULT_START_HOUR: u32 = 8;
pub const DEFAULT_END_HOUR: u32 = 18;

/// Margin added on both sides of the observed activity
pub const WINDOW_PADDING_MINUTES: u32 = 60;

/// Vertical axis of the rendered grid, in whole hours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for ViewWindow {
    fn default() -> Self {
        Self {
            start_hour: DEFAULT_START_HOUR,
            end_hour: DEFAULT_END_HOUR,
        }
    }
}

impl ViewWindow {
    /// Computes the window from `(start, end)` minute spans of every appointment of the day.
    pub fn compute<I>(spans: I) -> Self
    where
        I: IntoIterator<Item = (u32, u32)>,
    {
        let bounds = spans
            .into_iter()
            .fold(None, |acc: Option<(u32, u32)>, (start, end)| match acc {
                None => Some((start, end)),
                Some((lo, hi)) => Some((lo.min(start), hi.max(end))),
            });

        let Some((earliest, latest)) = bounds else {
            return Self::default();
        };

        let earliest = earliest.saturating_sub(WINDOW_PADDING_MINUTES);
        let latest = latest.saturating_add(WINDOW_PADDING_MINUTES).min(MINUTES_PER_DAY);

        Self {
            start_hour: earliest / 60,
            end_hour: latest.div_ceil(60),
        }
    }

    pub fn start_minutes(&self) -> u32 {
        self.start_hour * 60
    }

    pub fn end_minutes(&self) -> u32 {
        self.end_hour * 60
    }

    pub fn total_minutes(&self) -> u32 {
        (self.end_hour - self.start_hour) * 60
    }

    pub fn hours(&self) -> impl Iterator<Item = u32> {
        self.start_hour..=self.end_hour
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_day_uses_default_window() {
        let w = ViewWindow::compute(std::iter::empty());
        assert_eq!(w, ViewWindow { start_hour: 8, end_hour: 18 });
        assert_eq!(w.total_minutes(), 600);
    }

    #[test]
    fn pads_and_rounds_outward() {
        // 07:30-08:00 → padded 06:30-09:00 → hours 6..9
        let w = ViewWindow::compute([(450, 480)]);
        assert_eq!(w, ViewWindow { start_hour: 6, end_hour: 9 });

        // 10:15-11:10 → 09:15-12:10 → 9..13
        let w = ViewWindow::compute([(615, 670)]);
        assert_eq!(w, ViewWindow { start_hour: 9, end_hour: 13 });
    }

    #[test]
    fn clamps_to_the_day() {
        let w = ViewWindow::compute([(20, 60), (1380, 1425)]);
        assert_eq!(w.start_hour, 0);
        assert_eq!(w.end_hour, 24);
    }

    #[test]
    fn uses_extremes_across_all_spans() {
        let w = ViewWindow::compute([(600, 630), (540, 560), (900, 1000)]);
        assert_eq!(w, ViewWindow { start_hour: 8, end_hour: 18 });
    }
}
