//! Switch controller state.

/// The switch controller's tracked state.
///
/// The `shadow_*` fields hold the last values for which a switch was
/// attempted to completion; a new switch is triggered only when the
/// current request differs from them on a tracked field. Use
/// [`CrtModeSwitch::state`](crate::CrtModeSwitch::state) to inspect it.
#[derive(Debug, Clone, Default)]
pub struct SwitchState {
    /// Currently requested width in pixels.
    pub width: u32,
    /// Currently requested height in lines.
    pub height: u32,
    /// Active refresh rate in Hz. Updated to the achieved rate after a
    /// successful negotiation.
    pub hz: f32,
    /// Requested refresh rate of the last tick that changed it. Keeps a
    /// negotiated rate active across ticks that re-request the same
    /// nominal rate.
    pub shadow_hz: f32,
    /// Width of the last completed switch attempt.
    pub shadow_width: u32,
    /// Height of the last completed switch attempt.
    pub shadow_height: u32,
    /// Refresh rate last pushed to the video driver. Tracked separately
    /// from the mode shadow so refresh changes propagate without a full
    /// mode switch.
    pub applied_hz: f32,
    /// Horizontal centering adjustment in pixels.
    pub center_adjust: i32,
    /// Porch adjustment in pixels.
    pub porch_adjust: i32,
    /// Centering adjustment of the last completed switch attempt.
    pub shadow_center_adjust: i32,
    /// Porch adjustment of the last completed switch attempt.
    pub shadow_porch_adjust: i32,
    /// Aspect ratio computed by the last applied mode, 0.0 before any
    /// mode has been applied.
    pub aspect_ratio: f32,
    /// One-based monitor index from the last request (0 = auto).
    pub monitor_index: i32,
    /// Whether the menu-only degraded mode is active.
    pub menu_active: bool,
    /// Framebuffer width captured on first menu entry, 0 until captured.
    pub fb_width: u32,
    /// Framebuffer height captured on first menu entry.
    pub fb_height: u32,
}
