//! Focus state shared between the focus monitor and the hook callback.
//!
//! The monitor thread is the only writer and the hook thread the only
//! reader.  A reading may be up to one poll interval old; the hook acts on
//! whatever was last published.

use std::sync::RwLock;

/// Screen rectangle of the target's main window, in global display points
/// with the origin at the top-left of the main display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl WindowBounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// The region the pointer is confined to while the target has focus: the
    /// window widened by `margin` on the left and right, from the top of the
    /// screen down to the window's bottom edge.
    pub fn clip_region(&self, margin: f64) -> ClipRegion {
        ClipRegion {
            min_x: self.x - margin,
            max_x: self.x + self.width + margin,
            min_y: 0.0,
            max_y: self.y + self.height,
        }
    }
}

/// Axis-aligned bounds the pointer is held inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRegion {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl ClipRegion {
    /// Returns the clamped position if `(x, y)` lies outside, or `None` if
    /// the pointer may stay where it is.
    pub fn clip(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let cx = x.clamp(self.min_x, self.max_x);
        let cy = y.clamp(self.min_y, self.max_y);
        (cx != x || cy != y).then_some((cx, cy))
    }
}

/// Last known focus situation of the target application.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusState {
    pub target_active: bool,
    pub window_bounds: Option<WindowBounds>,
}

impl FocusState {
    /// The target does not own input focus.
    pub const fn inactive() -> Self {
        Self {
            target_active: false,
            window_bounds: None,
        }
    }

    /// The target owns input focus, with an optional known window rectangle.
    pub const fn active(window_bounds: Option<WindowBounds>) -> Self {
        Self {
            target_active: true,
            window_bounds,
        }
    }

    /// Combines the two probe results into a focus state.
    ///
    /// The target counts as active only when it is the frontmost application
    /// *and* its main window sits at the top of the screen (`y == 0`).  A
    /// window anywhere else is an ordinary windowed session the user can
    /// freely mouse out of.
    pub fn from_probe(frontmost_is_target: bool, main_window: Option<WindowBounds>) -> Self {
        match main_window {
            Some(bounds) if frontmost_is_target && bounds.y == 0.0 => Self::active(Some(bounds)),
            _ => Self::inactive(),
        }
    }

    /// Pointer warp target for a mouse move to `(x, y)`, if clipping applies.
    pub fn clip_pointer(&self, x: f64, y: f64, margin: f64) -> Option<(f64, f64)> {
        if !self.target_active {
            return None;
        }
        self.window_bounds?.clip_region(margin).clip(x, y)
    }
}

impl Default for FocusState {
    fn default() -> Self {
        Self::inactive()
    }
}

/// Single-writer, single-reader cell holding the latest [`FocusState`].
#[derive(Debug)]
pub struct SharedFocus {
    state: RwLock<FocusState>,
}

impl SharedFocus {
    pub fn new(initial: FocusState) -> Self {
        Self {
            state: RwLock::new(initial),
        }
    }

    /// Replaces the published state.  Called from the monitor thread.
    pub fn publish(&self, state: FocusState) {
        match self.state.write() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    /// Reads the published state without blocking.
    ///
    /// Called from the hook callback, which must never wait.  If the writer
    /// happens to hold the lock the target is reported as inactive, which
    /// makes the engine pass the event through untouched.
    pub fn current(&self) -> FocusState {
        match self.state.try_read() {
            Ok(guard) => *guard,
            Err(std::sync::TryLockError::Poisoned(poisoned)) => *poisoned.into_inner(),
            Err(std::sync::TryLockError::WouldBlock) => FocusState::inactive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_probe_requires_frontmost_and_top_of_screen() {
        let top = WindowBounds::new(100.0, 0.0, 1280.0, 800.0);
        let lower = WindowBounds::new(100.0, 25.0, 1280.0, 800.0);

        assert_eq!(FocusState::from_probe(true, Some(top)), FocusState::active(Some(top)));
        assert_eq!(FocusState::from_probe(false, Some(top)), FocusState::inactive());
        assert_eq!(FocusState::from_probe(true, Some(lower)), FocusState::inactive());
        assert_eq!(FocusState::from_probe(true, None), FocusState::inactive());
    }

    #[test]
    fn test_clip_region_extends_horizontally_by_margin() {
        let region = WindowBounds::new(100.0, 0.0, 800.0, 600.0).clip_region(50.0);

        assert_eq!(
            region,
            ClipRegion {
                min_x: 50.0,
                max_x: 950.0,
                min_y: 0.0,
                max_y: 600.0
            }
        );
    }

    #[test]
    fn test_clip_inside_region_is_none() {
        let region = WindowBounds::new(0.0, 0.0, 800.0, 600.0).clip_region(50.0);
        assert_eq!(region.clip(-40.0, 300.0), None);
        assert_eq!(region.clip(850.0, 600.0), None, "edges are inclusive");
    }

    #[test]
    fn test_clip_outside_region_clamps_each_axis() {
        let region = WindowBounds::new(0.0, 0.0, 800.0, 600.0).clip_region(50.0);
        assert_eq!(region.clip(1000.0, 300.0), Some((850.0, 300.0)));
        assert_eq!(region.clip(-100.0, 900.0), Some((-50.0, 600.0)));
    }

    #[test]
    fn test_clip_pointer_only_when_active_with_bounds() {
        let bounds = WindowBounds::new(0.0, 0.0, 800.0, 600.0);

        assert_eq!(FocusState::inactive().clip_pointer(2000.0, 0.0, 50.0), None);
        assert_eq!(FocusState::active(None).clip_pointer(2000.0, 0.0, 50.0), None);
        assert_eq!(
            FocusState::active(Some(bounds)).clip_pointer(2000.0, 0.0, 50.0),
            Some((850.0, 0.0))
        );
    }

    #[test]
    fn test_shared_focus_publishes_latest_state() {
        let shared = SharedFocus::new(FocusState::inactive());

        shared.publish(FocusState::active(None));

        assert_eq!(shared.current(), FocusState::active(None));
    }

    #[test]
    fn test_shared_focus_reports_inactive_while_writer_holds_lock() {
        // Arrange
        let shared = SharedFocus::new(FocusState::active(None));
        let _writer = shared.state.write().expect("lock is free");

        // Act / Assert
        assert_eq!(shared.current(), FocusState::inactive());
    }
}
