//! Mock collaborators for testing.

use crate::error::SwitchError;
use crate::programmer::TimingProgrammer;
use crate::service::{
    DisplayBinding, ModeNegotiator, MonitorProfile, NegotiatedMode, ServiceState,
};
use crate::timing::TimingDescriptor;
use crate::video::VideoDriver;

use std::sync::{Arc, Mutex};

// =============================================================================
// MockNegotiator
// =============================================================================

/// Call record kept by [`MockNegotiator`], shared with the test through
/// [`MockNegotiator::calls`] so it stays inspectable after the mock is
/// boxed into a controller.
#[derive(Debug, Default)]
pub struct NegotiatorCalls {
    /// Number of `ensure_loaded` calls.
    pub ensure_loaded: usize,
    /// Number of `negotiate` calls.
    pub negotiate: usize,
    /// Number of `destroy` calls.
    pub destroy: usize,
    /// Binding passed to the most recent `ensure_loaded`.
    pub last_binding: Option<DisplayBinding>,
    /// Profile passed to the most recent `ensure_loaded`.
    pub last_profile: Option<MonitorProfile>,
    /// Oversample width passed to the most recent `ensure_loaded`.
    pub last_oversample: u32,
    /// (width, height) of the most recent `negotiate`.
    pub last_request: Option<(u32, u32)>,
}

/// A mock mode negotiator for testing code that depends on
/// [`ModeNegotiator`] without the Switchres library or a real display.
///
/// # Example
///
/// ```
/// use crt_switch_core::{MockNegotiator, ModeNegotiator, DisplayBinding, MonitorProfile};
///
/// let mut mock = MockNegotiator::with_scale(2, 2);
/// assert!(mock.ensure_loaded(DisplayBinding::Auto, MonitorProfile::Arcade15, 0));
/// let mode = mock.negotiate(320, 240, 59.94).unwrap();
/// assert_eq!(mode.x_scale, 2);
/// ```
pub struct MockNegotiator {
    /// When set, `ensure_loaded` fails as if the library were missing.
    pub fail_load: bool,
    /// When set, `negotiate` fails and tears the handle down, as the
    /// real service does when it cannot produce a mode.
    pub fail_negotiate: bool,
    /// Horizontal scale factor reported on success.
    pub x_scale: u32,
    /// Vertical scale factor reported on success.
    pub y_scale: u32,
    /// Achieved refresh reported on success; `None` echoes the request.
    pub refresh: Option<f32>,
    calls: Arc<Mutex<NegotiatorCalls>>,
    state: ServiceState,
}

impl MockNegotiator {
    /// Create a mock that negotiates every request at 1:1 scale.
    pub fn new() -> Self {
        Self::with_scale(1, 1)
    }

    /// Create a mock reporting the given scale factors.
    pub fn with_scale(x_scale: u32, y_scale: u32) -> Self {
        Self {
            fail_load: false,
            fail_negotiate: false,
            x_scale,
            y_scale,
            refresh: None,
            calls: Arc::new(Mutex::new(NegotiatorCalls::default())),
            state: ServiceState::Unloaded,
        }
    }

    /// Handle to the call record, valid after the mock is moved into a
    /// controller.
    pub fn calls(&self) -> Arc<Mutex<NegotiatorCalls>> {
        Arc::clone(&self.calls)
    }
}

impl Default for MockNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeNegotiator for MockNegotiator {
    fn ensure_loaded(
        &mut self,
        binding: DisplayBinding,
        profile: MonitorProfile,
        oversample_width: u32,
    ) -> bool {
        let mut calls = self.calls.lock().unwrap();
        calls.ensure_loaded += 1;
        calls.last_binding = Some(binding);
        calls.last_profile = Some(profile);
        calls.last_oversample = oversample_width;

        if self.state == ServiceState::Loaded {
            return true;
        }
        if self.fail_load {
            self.state = ServiceState::Failed;
            return false;
        }
        self.state = ServiceState::Loaded;
        true
    }

    fn negotiate(&mut self, width: u32, height: u32, hz: f32) -> Option<NegotiatedMode> {
        let mut calls = self.calls.lock().unwrap();
        calls.negotiate += 1;
        calls.last_request = Some((width, height));

        if self.state != ServiceState::Loaded {
            return None;
        }
        if self.fail_negotiate {
            self.state = ServiceState::Failed;
            return None;
        }
        Some(NegotiatedMode {
            width,
            height,
            x_scale: self.x_scale,
            y_scale: self.y_scale,
            refresh: self.refresh.unwrap_or(hz),
        })
    }

    fn destroy(&mut self) {
        self.calls.lock().unwrap().destroy += 1;
        self.state = ServiceState::Unloaded;
    }

    fn state(&self) -> ServiceState {
        self.state
    }
}

// =============================================================================
// MockVideoDriver
// =============================================================================

/// A mock renderer recording everything the switch controller pushes
/// to it.
#[derive(Debug, Clone)]
pub struct MockVideoDriver {
    /// Current surface size.
    pub size: (u32, u32),
    /// Last viewport set, as (width, height, x, y).
    pub viewport: Option<(u32, u32, u32, u32)>,
    /// Current aspect-ratio value.
    pub aspect: f32,
    /// Last refresh rate set.
    pub refresh_rate: Option<f32>,
    /// Number of `apply_state_changes` calls.
    pub apply_count: usize,
}

impl MockVideoDriver {
    /// Create a driver reporting the given initial surface size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            viewport: None,
            aspect: 0.0,
            refresh_rate: None,
            apply_count: 0,
        }
    }
}

impl VideoDriver for MockVideoDriver {
    fn set_refresh_rate(&mut self, hz: f32) {
        self.refresh_rate = Some(hz);
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn set_viewport(&mut self, width: u32, height: u32, x: u32, y: u32) {
        self.viewport = Some((width, height, x, y));
    }

    fn set_aspect_ratio(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    fn apply_state_changes(&mut self) {
        self.apply_count += 1;
    }

    fn aspect_ratio(&self) -> f32 {
        self.aspect
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }
}

// =============================================================================
// MockProgrammer
// =============================================================================

/// A mock timing programmer recording each programmed mode.
pub struct MockProgrammer {
    /// When set, `program` fails as if an OS command exited non-zero.
    pub fail: bool,
    programmed: Arc<Mutex<Vec<(u32, u32, TimingDescriptor)>>>,
}

impl MockProgrammer {
    /// Create a programmer that records and succeeds.
    pub fn new() -> Self {
        Self {
            fail: false,
            programmed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle to the record of programmed (width, height, timing)
    /// triples, valid after the mock is moved into a controller.
    pub fn programmed(&self) -> Arc<Mutex<Vec<(u32, u32, TimingDescriptor)>>> {
        Arc::clone(&self.programmed)
    }
}

impl Default for MockProgrammer {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingProgrammer for MockProgrammer {
    fn program(
        &mut self,
        width: u32,
        height: u32,
        _hz: f32,
        timing: &TimingDescriptor,
    ) -> Result<(), SwitchError> {
        self.programmed
            .lock()
            .unwrap()
            .push((width, height, timing.clone()));

        if self.fail {
            return Err(SwitchError::TimingCommand {
                command: "mock".to_string(),
                status: 1,
            });
        }
        Ok(())
    }
}
