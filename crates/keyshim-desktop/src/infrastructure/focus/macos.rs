//! macOS focus probe built on `NSWorkspace` and the CoreGraphics window list.

#![cfg(target_os = "macos")]

use core_foundation::base::{CFType, TCFType};
use core_foundation::dictionary::{CFDictionary, CFDictionaryRef};
use core_foundation::number::CFNumber;
use core_foundation::string::CFString;
use core_graphics::geometry::CGRect;
use core_graphics::window::{
    copy_window_info, kCGNullWindowID, kCGWindowAlpha, kCGWindowBounds,
    kCGWindowListOptionOnScreenOnly, kCGWindowOwnerName,
};
use keyshim_core::{FocusState, WindowBounds};
use objc2_app_kit::NSWorkspace;

use super::{FocusError, FocusProbe};

/// Tracks one target application by bundle id (for frontmost checks) and by
/// owner name (for its windows).
#[derive(Debug, Clone)]
pub struct MacosFocusProbe {
    bundle_id: String,
    app_name: String,
    min_window_height: f64,
    min_window_alpha: f64,
}

impl MacosFocusProbe {
    pub fn new(
        bundle_id: impl Into<String>,
        app_name: impl Into<String>,
        min_window_height: f64,
        min_window_alpha: f64,
    ) -> Self {
        Self {
            bundle_id: bundle_id.into(),
            app_name: app_name.into(),
            min_window_height,
            min_window_alpha,
        }
    }

    fn frontmost_is_target(&self) -> bool {
        #[allow(unused_unsafe)]
        let bundle_id = unsafe {
            NSWorkspace::sharedWorkspace()
                .frontmostApplication()
                .and_then(|app| app.bundleIdentifier())
                .map(|id| id.to_string())
        };
        bundle_id.as_deref() == Some(self.bundle_id.as_str())
    }

    /// Bounds of the first on-screen window owned by the target that is
    /// visible and tall enough to be its main window.
    fn main_window_bounds(&self) -> Result<Option<WindowBounds>, FocusError> {
        let windows = copy_window_info(kCGWindowListOptionOnScreenOnly, kCGNullWindowID)
            .ok_or(FocusError::WindowListUnavailable)?;

        // SAFETY: the window-info keys are immutable CoreGraphics constants.
        let (owner_key, alpha_key, bounds_key) = unsafe {
            (
                CFString::wrap_under_get_rule(kCGWindowOwnerName),
                CFString::wrap_under_get_rule(kCGWindowAlpha),
                CFString::wrap_under_get_rule(kCGWindowBounds),
            )
        };

        for item in windows.iter() {
            // SAFETY: every element of the window list is a CFDictionary.
            let info: CFDictionary<CFString, CFType> =
                unsafe { CFDictionary::wrap_under_get_rule(*item as CFDictionaryRef) };

            let owner = info
                .find(&owner_key)
                .and_then(|v| v.downcast::<CFString>())
                .map(|s| s.to_string());
            if owner.as_deref() != Some(self.app_name.as_str()) {
                continue;
            }

            let alpha = info
                .find(&alpha_key)
                .and_then(|v| v.downcast::<CFNumber>())
                .and_then(|n| n.to_f64())
                .unwrap_or(0.0);
            if alpha <= self.min_window_alpha {
                continue;
            }

            let Some(rect) = info.find(&bounds_key).and_then(|v| {
                // SAFETY: kCGWindowBounds always holds a CGRect dictionary.
                let dict: CFDictionary =
                    unsafe { CFDictionary::wrap_under_get_rule(v.as_CFTypeRef() as CFDictionaryRef) };
                CGRect::from_dict_representation(&dict)
            }) else {
                continue;
            };
            if rect.size.height > self.min_window_height {
                return Ok(Some(WindowBounds::new(
                    rect.origin.x,
                    rect.origin.y,
                    rect.size.width,
                    rect.size.height,
                )));
            }
        }
        Ok(None)
    }
}

impl FocusProbe for MacosFocusProbe {
    fn probe(&mut self) -> Result<FocusState, FocusError> {
        if !self.frontmost_is_target() {
            return Ok(FocusState::inactive());
        }
        let bounds = self.main_window_bounds()?;
        Ok(FocusState::from_probe(true, bounds))
    }
}
