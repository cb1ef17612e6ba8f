//! Renderer collaborator interface.

/// The renderer mutators the switch controller drives.
///
/// The host renderer implements this; the crate ships
/// [`MockVideoDriver`](crate::MockVideoDriver) for tests.
pub trait VideoDriver {
    /// Set the monitor refresh rate in Hz.
    fn set_refresh_rate(&mut self, hz: f32);

    /// Set the render surface size.
    fn set_size(&mut self, width: u32, height: u32);

    /// Set the viewport dimensions and origin.
    fn set_viewport(&mut self, width: u32, height: u32, x: u32, y: u32);

    /// Set the aspect-ratio value used for presentation.
    fn set_aspect_ratio(&mut self, aspect: f32);

    /// Commit any pending renderer state changes.
    fn apply_state_changes(&mut self);

    /// Get the current aspect-ratio value.
    fn aspect_ratio(&self) -> f32;

    /// Get the current surface size as (width, height).
    fn size(&self) -> (u32, u32);
}
