//! Named device presets for page emulation.
//!
//! Selection is a lookup keyed by exact (width, height); anything that
//! does not match a row falls back to a plain desktop viewport.

use crate::Viewport;

/// Fixed desktop user agent applied when no device profile is active.
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// A named preset of viewport, user agent, and touch emulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceProfile {
    pub name: &'static str,
    pub viewport: Viewport,
    pub user_agent: &'static str,
    pub device_scale_factor: f64,
    pub touch: bool,
    pub mobile: bool,
}

static PROFILES: &[DeviceProfile] = &[
    DeviceProfile {
        name: "phone",
        viewport: Viewport {
            width: 375,
            height: 667,
        },
        user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 15_0 like Mac OS X) \
             AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1",
        device_scale_factor: 2.0,
        touch: true,
        mobile: true,
    },
    DeviceProfile {
        name: "tablet",
        viewport: Viewport {
            width: 768,
            height: 1024,
        },
        user_agent: "Mozilla/5.0 (iPad; CPU OS 15_0 like Mac OS X) \
             AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1",
        device_scale_factor: 2.0,
        touch: true,
        mobile: true,
    },
];

impl DeviceProfile {
    /// Preset matching the exact dimensions, if any.
    pub fn for_viewport(viewport: Viewport) -> Option<&'static DeviceProfile> {
        PROFILES.iter().find(|p| p.viewport == viewport)
    }

    pub fn by_name(name: &str) -> Option<&'static DeviceProfile> {
        PROFILES.iter().find(|p| p.name == name)
    }

    pub fn all() -> &'static [DeviceProfile] {
        PROFILES
    }
}
