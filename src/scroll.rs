//! Scroll depth measurement and milestone detection

use serde::{Deserialize, Serialize};

/// Scroll position reported by the host page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollGeometry {
    /// Distance scrolled from the top, in pixels
    pub scroll_top: f64,
    /// Total content height, in pixels
    pub scroll_height: f64,
    /// Visible viewport height, in pixels
    pub viewport_height: f64,
}

impl ScrollGeometry {
    /// Scrolled percentage of the overflowing content, rounded and clamped to 0..=100.
    ///
    /// `None` when the content does not overflow the viewport.
    pub fn percent(&self) -> Option<u8> {
        let scrollable = self.scroll_height - self.viewport_height;
        if !scrollable.is_finite() || scrollable <= 0.0 || !self.scroll_top.is_finite() {
            return None;
        }
        let pct = (self.scroll_top / scrollable * 100.0).round().clamp(0.0, 100.0);
        Some(pct as u8)
    }
}

/// Per-page high-water mark of scroll depth
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollDepthTracker {
    milestones: Vec<u8>,
    high_water: u8,
}

impl ScrollDepthTracker {
    /// `milestones` must be strictly increasing
    pub fn new(milestones: Vec<u8>) -> Self {
        Self {
            milestones,
            high_water: 0,
        }
    }

    pub fn high_water(&self) -> u8 {
        self.high_water
    }

    /// Forget the high-water mark (new page)
    pub fn reset(&mut self) {
        self.high_water = 0;
    }

    /// Record a scroll percentage.
    ///
    /// Returns the highest milestone newly crossed when the high-water mark
    /// rises; a mark that does not rise never re-fires a milestone.
    pub fn observe(&mut self, percent: u8) -> Option<u8> {
        if percent <= self.high_water {
            return None;
        }
        let previous = self.high_water;
        self.high_water = percent;

        self.milestones
            .iter()
            .rev()
            .copied()
            .find(|&m| previous < m && m <= percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SCROLL_MILESTONES;
    use pretty_assertions::assert_eq;

    fn geometry(scroll_top: f64) -> ScrollGeometry {
        ScrollGeometry {
            scroll_top,
            scroll_height: 3000.0,
            viewport_height: 1000.0,
        }
    }

    #[test]
    fn test_percent() {
        assert_eq!(geometry(0.0).percent(), Some(0));
        assert_eq!(geometry(1200.0).percent(), Some(60));
        assert_eq!(geometry(2000.0).percent(), Some(100));
        assert_eq!(geometry(2500.0).percent(), Some(100));
        assert_eq!(geometry(-50.0).percent(), Some(0));
    }

    #[test]
    fn test_no_overflow_is_noop() {
        let short = ScrollGeometry {
            scroll_top: 0.0,
            scroll_height: 800.0,
            viewport_height: 1000.0,
        };
        assert_eq!(short.percent(), None);

        let exact = ScrollGeometry {
            scroll_top: 0.0,
            scroll_height: 1000.0,
            viewport_height: 1000.0,
        };
        assert_eq!(exact.percent(), None);

        let nan = ScrollGeometry {
            scroll_top: f64::NAN,
            scroll_height: 3000.0,
            viewport_height: 1000.0,
        };
        assert_eq!(nan.percent(), None);
    }

    #[test]
    fn test_milestones_do_not_refire() {
        let mut tracker = ScrollDepthTracker::new(SCROLL_MILESTONES.to_vec());

        let fired: Vec<u8> = [10, 26, 24, 51, 99, 100]
            .into_iter()
            .filter_map(|p| tracker.observe(p))
            .collect();

        // 24 is below the high-water mark. 99 >= 75 is a crossing of its own,
        // so it emits 75 rather than waiting for 100.
        assert_eq!(fired, vec![25, 50, 75, 100]);
        assert_eq!(tracker.high_water(), 100);
    }

    #[test]
    fn test_scrolling_back_down_again_is_silent() {
        let mut tracker = ScrollDepthTracker::new(SCROLL_MILESTONES.to_vec());
        assert_eq!(tracker.observe(55), Some(50));
        assert_eq!(tracker.observe(10), None);
        assert_eq!(tracker.observe(55), None);
        assert_eq!(tracker.observe(60), None);
    }

    #[test]
    fn test_jump_reports_highest_crossed_milestone() {
        let mut tracker = ScrollDepthTracker::new(SCROLL_MILESTONES.to_vec());
        assert_eq!(tracker.observe(60), Some(50));
        assert_eq!(tracker.observe(100), Some(100));
    }

    #[test]
    fn test_reset_allows_milestones_on_new_page() {
        let mut tracker = ScrollDepthTracker::new(SCROLL_MILESTONES.to_vec());
        assert_eq!(tracker.observe(30), Some(25));
        tracker.reset();
        assert_eq!(tracker.observe(30), Some(25));
    }
}
