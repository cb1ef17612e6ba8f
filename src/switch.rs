//! Per-tick switch controller.
//!
//! Owns the shadow state used for change detection, orchestrates the
//! negotiation client, the aspect reconciler, and the direct-timing
//! fallback, and handles the menu-only degraded mode.

use crate::programmer::TimingProgrammer;
use crate::service::{DisplayBinding, ModeNegotiator, MonitorProfile};
use crate::state::SwitchState;
use crate::timing::generate_timing;
use crate::video::VideoDriver;

use log::{debug, error, info};

/// Height value that historically means "menu/UI only, no game content".
pub const MENU_SENTINEL_HEIGHT: u32 = 4;

/// The per-tick mode request from the host renderer.
#[derive(Debug, Clone)]
pub struct ModeRequest {
    /// Width the core actually renders at, used for negotiation.
    pub native_width: u32,
    /// Requested display width in pixels.
    pub width: u32,
    /// Requested display height in lines; [`MENU_SENTINEL_HEIGHT`]
    /// selects the menu-only degraded mode.
    pub height: u32,
    /// Requested refresh rate in Hz.
    pub hz: f32,
    /// Monitor scan-rate class to negotiate against.
    pub profile: MonitorProfile,
    /// Horizontal centering adjustment in pixels.
    pub center_adjust: i32,
    /// Porch adjustment in pixels.
    pub porch_adjust: i32,
    /// One-based monitor index; 0 lets the service pick an output.
    pub monitor_index: i32,
    /// Reserved: the dynamic width computation was retired upstream,
    /// but hosts still pass the flag.
    pub dynamic_width: bool,
    /// Horizontal pixel count forced onto the service when > 2,
    /// overriding its own resolution choice.
    pub oversample_width: u32,
}

/// The switch controller.
///
/// Call [`request_mode`](CrtModeSwitch::request_mode) once per tick; most
/// calls are a cheap no-op against the shadow state, and the rare
/// differing call performs an idempotent mode switch.
pub struct CrtModeSwitch {
    state: SwitchState,
    negotiator: Box<dyn ModeNegotiator>,
    programmer: Option<Box<dyn TimingProgrammer>>,
}

impl CrtModeSwitch {
    /// Create a controller around a negotiation client. No hardware is
    /// touched until the first differing request.
    pub fn new(negotiator: Box<dyn ModeNegotiator>) -> Self {
        Self {
            state: SwitchState::default(),
            negotiator,
            programmer: None,
        }
    }

    /// Fit a direct timing programmer onto the fallback path. Platforms
    /// without one simply get an unscaled mode when negotiation fails.
    pub fn with_programmer(mut self, programmer: Box<dyn TimingProgrammer>) -> Self {
        self.programmer = Some(programmer);
        self
    }

    /// Inspect the controller's tracked state.
    pub fn state(&self) -> &SwitchState {
        &self.state
    }

    /// Tear down the negotiation service handle.
    pub fn destroy(&mut self) {
        self.negotiator.destroy();
    }

    /// Reconcile the requested mode with what is currently applied.
    ///
    /// Called every tick. Performs a switch only when the request
    /// differs from the shadow state on a tracked field; refresh-rate
    /// changes propagate independently without a full switch, and aspect
    /// drift introduced by unrelated renderer activity is corrected on
    /// every call.
    pub fn request_mode(&mut self, video: &mut dyn VideoDriver, req: &ModeRequest) {
        if req.height != MENU_SENTINEL_HEIGHT {
            self.state.menu_active = false;
            self.state.width = req.width;
            self.state.height = req.height;
            if req.hz != self.state.shadow_hz {
                self.state.hz = req.hz;
                self.state.shadow_hz = req.hz;
            }
            self.state.center_adjust = req.center_adjust;
            self.state.porch_adjust = req.porch_adjust;
            self.state.monitor_index = req.monitor_index;

            if self.mode_changed() {
                info!(
                    "requested resolution: {}x{}@{}",
                    req.native_width, req.height, req.hz
                );
                self.switch_mode(video, req.width, req.height, req.native_width, req);

                self.state.shadow_width = self.state.width;
                self.state.shadow_height = self.state.height;
                self.state.shadow_center_adjust = self.state.center_adjust;
                self.state.shadow_porch_adjust = self.state.porch_adjust;
            }
        } else if !self.state.menu_active {
            if self.state.fb_width == 0 {
                let (fb_width, fb_height) = video.size();
                self.state.fb_width = fb_width;
                self.state.fb_height = fb_height;
                info!("menu only dimensions: {}x{}", fb_width, fb_height);
                self.apply_scaled(video, fb_width, fb_height);
            } else {
                let (fb_width, fb_height) = (self.state.fb_width, self.state.fb_height);
                info!("menu only dimensions restoring: {}x{}", fb_width, fb_height);
                self.switch_mode(video, fb_width, fb_height, fb_width, req);
            }
            // Re-arm change detection: the first non-menu request after
            // a menu episode must switch even if it matches the
            // pre-menu shadow.
            self.state.shadow_width = 0;
            self.state.shadow_height = 0;
            self.state.menu_active = true;
        }

        if self.state.hz != self.state.applied_hz {
            debug!("propagating refresh rate: {}", self.state.hz);
            video.set_refresh_rate(self.state.hz);
            self.state.applied_hz = self.state.hz;
        }

        if self.state.aspect_ratio > 0.0 && video.aspect_ratio() != self.state.aspect_ratio {
            info!("restoring aspect ratio: {}", self.state.aspect_ratio);
            video.set_aspect_ratio(self.state.aspect_ratio);
            video.apply_state_changes();
        }
    }

    fn mode_changed(&self) -> bool {
        self.state.height != self.state.shadow_height
            || self.state.width != self.state.shadow_width
            || self.state.center_adjust != self.state.shadow_center_adjust
            || self.state.porch_adjust != self.state.shadow_porch_adjust
    }

    /// Combined switch procedure: negotiate, or fall back to a 1:1 mode
    /// and (where fitted) direct timing programming. On the direct path
    /// the tracked centering adjustment feeds the generator as its
    /// horizontal offset.
    fn switch_mode(
        &mut self,
        video: &mut dyn VideoDriver,
        fallback_width: u32,
        height: u32,
        native_width: u32,
        req: &ModeRequest,
    ) {
        let binding = DisplayBinding::from_one_based(req.monitor_index);
        let negotiated = if self
            .negotiator
            .ensure_loaded(binding, req.profile, req.oversample_width)
        {
            self.negotiator
                .negotiate(native_width, height, self.state.hz)
        } else {
            None
        };

        match negotiated {
            Some(mode) => {
                self.state.hz = mode.refresh;
                let scaled_width = native_width * mode.x_scale;
                let scaled_height = height * mode.y_scale;
                debug!("negotiated scale: x{} y{}", mode.x_scale, mode.y_scale);
                self.apply_scaled(video, scaled_width, scaled_height);
            }
            None => {
                self.apply_scaled(video, fallback_width, height);
                video.set_size(fallback_width, height);
                video.apply_state_changes();

                if let Some(programmer) = self.programmer.as_mut() {
                    let timing = generate_timing(
                        fallback_width,
                        height,
                        self.state.hz,
                        self.state.center_adjust,
                    );
                    if let Err(e) =
                        programmer.program(fallback_width, height, self.state.hz, &timing)
                    {
                        error!("timing programming failed, keeping previous mode: {}", e);
                    }
                }
            }
        }
    }

    /// Aspect reconciler: push the displayed size and the aspect ratio
    /// derived from it to the renderer, then commit pending changes.
    fn apply_scaled(&mut self, video: &mut dyn VideoDriver, width: u32, height: u32) {
        info!("setting video screen size: {}x{}", width, height);
        video.set_size(width, height);
        video.set_viewport(width, height, 1, 1);

        self.state.aspect_ratio = width as f32 / height as f32;
        info!("setting aspect ratio: {}", self.state.aspect_ratio);
        video.set_aspect_ratio(self.state.aspect_ratio);

        video.apply_state_changes();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockNegotiator, MockProgrammer, MockVideoDriver};

    fn request(width: u32, height: u32, hz: f32) -> ModeRequest {
        ModeRequest {
            native_width: width,
            width,
            height,
            hz,
            profile: MonitorProfile::Arcade15,
            center_adjust: 0,
            porch_adjust: 0,
            monitor_index: 1,
            dynamic_width: false,
            oversample_width: 0,
        }
    }

    #[test]
    fn test_identical_requests_negotiate_once() {
        let negotiator = MockNegotiator::new();
        let calls = negotiator.calls();
        let mut switch = CrtModeSwitch::new(Box::new(negotiator));
        let mut video = MockVideoDriver::new(640, 480);

        let req = request(320, 240, 59.94);
        switch.request_mode(&mut video, &req);
        switch.request_mode(&mut video, &req);
        switch.request_mode(&mut video, &req);

        assert_eq!(calls.lock().unwrap().negotiate, 1);
    }

    #[test]
    fn test_porch_adjust_change_triggers_switch() {
        let negotiator = MockNegotiator::new();
        let calls = negotiator.calls();
        let mut switch = CrtModeSwitch::new(Box::new(negotiator));
        let mut video = MockVideoDriver::new(640, 480);

        switch.request_mode(&mut video, &request(320, 240, 59.94));
        let mut req = request(320, 240, 59.94);
        req.porch_adjust = 2;
        switch.request_mode(&mut video, &req);

        assert_eq!(calls.lock().unwrap().negotiate, 2);
    }

    #[test]
    fn test_refresh_change_alone_skips_negotiation() {
        let negotiator = MockNegotiator::new();
        let calls = negotiator.calls();
        let mut switch = CrtModeSwitch::new(Box::new(negotiator));
        let mut video = MockVideoDriver::new(640, 480);

        switch.request_mode(&mut video, &request(320, 240, 60.0));
        switch.request_mode(&mut video, &request(320, 240, 50.0));

        assert_eq!(calls.lock().unwrap().negotiate, 1);
        assert_eq!(video.refresh_rate, Some(50.0));
        assert_eq!(switch.state().applied_hz, 50.0);
    }

    #[test]
    fn test_negotiated_scale_drives_viewport_and_aspect() {
        let negotiator = MockNegotiator::with_scale(3, 2);
        let mut switch = CrtModeSwitch::new(Box::new(negotiator));
        let mut video = MockVideoDriver::new(640, 480);

        switch.request_mode(&mut video, &request(320, 240, 59.94));

        assert_eq!(video.size, (960, 480));
        assert_eq!(video.viewport, Some((960, 480, 1, 1)));
        assert_eq!(video.aspect, 2.0);
        assert_eq!(switch.state().aspect_ratio, 2.0);
        assert!(video.apply_count >= 1);
    }

    #[test]
    fn test_failed_negotiation_falls_back_one_to_one() {
        let mut negotiator = MockNegotiator::new();
        negotiator.fail_negotiate = true;
        let mut switch = CrtModeSwitch::new(Box::new(negotiator));
        let mut video = MockVideoDriver::new(640, 480);

        switch.request_mode(&mut video, &request(320, 240, 59.94));

        assert_eq!(video.size, (320, 240));
        assert_eq!(video.aspect, 320.0 / 240.0);
    }

    #[test]
    fn test_load_failure_falls_back_without_negotiating() {
        let mut negotiator = MockNegotiator::new();
        negotiator.fail_load = true;
        let calls = negotiator.calls();
        let mut switch = CrtModeSwitch::new(Box::new(negotiator));
        let mut video = MockVideoDriver::new(640, 480);

        switch.request_mode(&mut video, &request(320, 240, 59.94));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.ensure_loaded, 1);
        assert_eq!(calls.negotiate, 0);
        assert_eq!(video.size, (320, 240));
    }

    #[test]
    fn test_fallback_programs_timing_when_fitted() {
        let mut negotiator = MockNegotiator::new();
        negotiator.fail_negotiate = true;
        let programmer = MockProgrammer::new();
        let programmed = programmer.programmed();
        let mut switch =
            CrtModeSwitch::new(Box::new(negotiator)).with_programmer(Box::new(programmer));
        let mut video = MockVideoDriver::new(640, 480);

        switch.request_mode(&mut video, &request(320, 240, 59.94));

        let programmed = programmed.lock().unwrap();
        assert_eq!(programmed.len(), 1);
        assert_eq!(programmed[0].0, 320);
        assert_eq!(programmed[0].1, 240);
        assert!(!programmed[0].2.interlaced);
    }

    #[test]
    fn test_successful_negotiation_skips_timing_programmer() {
        let negotiator = MockNegotiator::new();
        let programmer = MockProgrammer::new();
        let programmed = programmer.programmed();
        let mut switch =
            CrtModeSwitch::new(Box::new(negotiator)).with_programmer(Box::new(programmer));
        let mut video = MockVideoDriver::new(640, 480);

        switch.request_mode(&mut video, &request(320, 240, 59.94));

        assert!(programmed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_timing_failure_is_swallowed() {
        let mut negotiator = MockNegotiator::new();
        negotiator.fail_negotiate = true;
        let mut programmer = MockProgrammer::new();
        programmer.fail = true;
        let mut switch =
            CrtModeSwitch::new(Box::new(negotiator)).with_programmer(Box::new(programmer));
        let mut video = MockVideoDriver::new(640, 480);

        // Must not panic or propagate; the fallback mode is still applied.
        switch.request_mode(&mut video, &request(320, 240, 59.94));
        assert_eq!(video.size, (320, 240));
    }

    #[test]
    fn test_menu_mode_captures_framebuffer_once() {
        let negotiator = MockNegotiator::new();
        let calls = negotiator.calls();
        let mut switch = CrtModeSwitch::new(Box::new(negotiator));
        let mut video = MockVideoDriver::new(640, 480);

        let menu = request(320, MENU_SENTINEL_HEIGHT, 60.0);
        switch.request_mode(&mut video, &menu);
        switch.request_mode(&mut video, &menu);
        switch.request_mode(&mut video, &menu);

        // First entry applies the captured framebuffer size without
        // negotiation; repeats are no-ops.
        assert_eq!(calls.lock().unwrap().negotiate, 0);
        assert_eq!(switch.state().fb_width, 640);
        assert_eq!(switch.state().fb_height, 480);
        assert_eq!(video.size, (640, 480));
        assert_eq!(video.aspect, 640.0 / 480.0);
    }

    #[test]
    fn test_menu_exit_rearms_switch() {
        let negotiator = MockNegotiator::new();
        let calls = negotiator.calls();
        let mut switch = CrtModeSwitch::new(Box::new(negotiator));
        let mut video = MockVideoDriver::new(640, 480);

        // Menu, game, menu again: one negotiated game switch, then a
        // negotiated restore of the cached menu dimensions.
        switch.request_mode(&mut video, &request(320, MENU_SENTINEL_HEIGHT, 60.0));
        assert_eq!(calls.lock().unwrap().negotiate, 0);

        switch.request_mode(&mut video, &request(320, 240, 59.94));
        assert_eq!(calls.lock().unwrap().negotiate, 1);

        switch.request_mode(&mut video, &request(320, MENU_SENTINEL_HEIGHT, 60.0));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.negotiate, 2);
        assert_eq!(calls.last_request, Some((640, 480)));
    }

    #[test]
    fn test_menu_roundtrip_restores_game_mode() {
        let negotiator = MockNegotiator::new();
        let calls = negotiator.calls();
        let mut switch = CrtModeSwitch::new(Box::new(negotiator));
        let mut video = MockVideoDriver::new(640, 480);

        switch.request_mode(&mut video, &request(320, 240, 59.94));
        assert_eq!(calls.lock().unwrap().negotiate, 1);

        switch.request_mode(&mut video, &request(320, MENU_SENTINEL_HEIGHT, 60.0));
        assert_eq!(video.size, (640, 480));

        // Returning to the same game mode after a menu episode must
        // switch again, not no-op against the pre-menu shadow.
        switch.request_mode(&mut video, &request(320, 240, 59.94));
        assert_eq!(calls.lock().unwrap().negotiate, 2);
        assert_eq!(video.size, (320, 240));
    }

    #[test]
    fn test_negotiated_refresh_survives_identical_requests() {
        let mut negotiator = MockNegotiator::new();
        negotiator.refresh = Some(60.1);
        let mut switch = CrtModeSwitch::new(Box::new(negotiator));
        let mut video = MockVideoDriver::new(640, 480);

        let req = request(320, 240, 59.94);
        switch.request_mode(&mut video, &req);
        assert_eq!(video.refresh_rate, Some(60.1));

        // An identical request must not revert the achieved rate to the
        // raw requested one.
        switch.request_mode(&mut video, &req);
        assert_eq!(video.refresh_rate, Some(60.1));
        assert_eq!(switch.state().hz, 60.1);
    }

    #[test]
    fn test_oversample_hint_reaches_service() {
        let negotiator = MockNegotiator::new();
        let calls = negotiator.calls();
        let mut switch = CrtModeSwitch::new(Box::new(negotiator));
        let mut video = MockVideoDriver::new(640, 480);

        let mut req = request(320, 240, 59.94);
        req.oversample_width = 2560;
        switch.request_mode(&mut video, &req);

        assert_eq!(calls.lock().unwrap().last_oversample, 2560);
    }

    #[test]
    fn test_aspect_drift_is_corrected() {
        let negotiator = MockNegotiator::new();
        let mut switch = CrtModeSwitch::new(Box::new(negotiator));
        let mut video = MockVideoDriver::new(640, 480);

        let req = request(320, 240, 59.94);
        switch.request_mode(&mut video, &req);
        let expected = switch.state().aspect_ratio;

        // Something external stomps the aspect ratio between ticks.
        video.aspect = 16.0 / 9.0;
        let applies = video.apply_count;
        switch.request_mode(&mut video, &req);

        assert_eq!(video.aspect, expected);
        assert!(video.apply_count > applies);
    }

    #[test]
    fn test_monitor_index_translation_reaches_service() {
        let negotiator = MockNegotiator::new();
        let calls = negotiator.calls();
        let mut switch = CrtModeSwitch::new(Box::new(negotiator));
        let mut video = MockVideoDriver::new(640, 480);

        let mut req = request(320, 240, 59.94);
        req.monitor_index = 2;
        switch.request_mode(&mut video, &req);
        assert_eq!(
            calls.lock().unwrap().last_binding,
            Some(DisplayBinding::Output(1))
        );

        req.monitor_index = 0;
        req.width = 256;
        req.native_width = 256;
        switch.request_mode(&mut video, &req);
        assert_eq!(calls.lock().unwrap().last_binding, Some(DisplayBinding::Auto));
    }

    #[test]
    fn test_negotiated_refresh_is_adopted_and_propagated() {
        let mut negotiator = MockNegotiator::new();
        negotiator.refresh = Some(60.1);
        let mut switch = CrtModeSwitch::new(Box::new(negotiator));
        let mut video = MockVideoDriver::new(640, 480);

        switch.request_mode(&mut video, &request(320, 240, 59.94));

        assert_eq!(switch.state().hz, 60.1);
        assert_eq!(video.refresh_rate, Some(60.1));
    }

    #[test]
    fn test_shadow_updates_even_on_fallback() {
        let mut negotiator = MockNegotiator::new();
        negotiator.fail_negotiate = true;
        let calls = negotiator.calls();
        let mut switch = CrtModeSwitch::new(Box::new(negotiator));
        let mut video = MockVideoDriver::new(640, 480);

        let req = request(320, 240, 59.94);
        switch.request_mode(&mut video, &req);
        assert_eq!(switch.state().shadow_width, 320);
        assert_eq!(switch.state().shadow_height, 240);

        // Identical request does not re-attempt within this shadow.
        switch.request_mode(&mut video, &req);
        assert_eq!(calls.lock().unwrap().negotiate, 1);
    }
}
