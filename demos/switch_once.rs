//! Example: Request a 240p mode once and print the resulting state.
//!
//! Run with: `cargo run --example switch_once`

use crt_switch_core::{
    CrtModeSwitch, MockVideoDriver, ModeRequest, MonitorProfile, SwitchresService,
    VideocoreProgrammer,
};

fn main() {
    // Initialize logging (optional)
    env_logger::init();

    // Negotiate through the Switchres library; fall back to direct
    // timing programming where the platform supports it.
    let mut switch = CrtModeSwitch::new(Box::new(SwitchresService::new()))
        .with_programmer(Box::new(VideocoreProgrammer));

    // A real host passes its renderer here; the mock records calls.
    let mut video = MockVideoDriver::new(640, 480);

    let request = ModeRequest {
        native_width: 320,
        width: 320,
        height: 240,
        hz: 59.94,
        profile: MonitorProfile::Arcade15,
        center_adjust: 0,
        porch_adjust: 0,
        monitor_index: 0,
        dynamic_width: false,
        oversample_width: 0,
    };

    // First call switches; the second is a no-op against shadow state.
    switch.request_mode(&mut video, &request);
    switch.request_mode(&mut video, &request);

    let state = switch.state();
    println!(
        "applied {}x{}@{} (aspect {:.3})",
        state.shadow_width, state.shadow_height, state.applied_hz, state.aspect_ratio
    );
    println!("renderer saw size {:?}, viewport {:?}", video.size, video.viewport);

    switch.destroy();
}
