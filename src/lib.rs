//! CRT mode switching and modeline generation for emulator frontends.
//!
//! This crate reconciles a renderer's requested logical video mode with
//! the real timing a CRT-class display needs. Call
//! [`CrtModeSwitch::request_mode`] once per tick: most calls detect "no
//! change" cheaply against shadow state; when the request differs, the
//! controller negotiates a concrete mode through the Switchres library,
//! reconciles the resulting scale factors into the renderer's viewport
//! and aspect ratio, and on RPi-class hardware can program CRT timing
//! registers directly as a fallback.
//!
//! # Example
//!
//! ```no_run
//! use crt_switch_core::{
//!     CrtModeSwitch, MockVideoDriver, ModeRequest, MonitorProfile, SwitchresService,
//!     VideocoreProgrammer,
//! };
//!
//! // Negotiate through the Switchres library, with direct timing
//! // programming as the fallback path.
//! let mut switch = CrtModeSwitch::new(Box::new(SwitchresService::new()))
//!     .with_programmer(Box::new(VideocoreProgrammer));
//!
//! // The host renderer implements VideoDriver; the mock stands in here.
//! let mut video = MockVideoDriver::new(640, 480);
//!
//! let request = ModeRequest {
//!     native_width: 320,
//!     width: 320,
//!     height: 240,
//!     hz: 59.94,
//!     profile: MonitorProfile::Arcade15,
//!     center_adjust: 0,
//!     porch_adjust: 0,
//!     monitor_index: 0,
//!     dynamic_width: false,
//!     oversample_width: 0,
//! };
//!
//! // Once per tick; only the first differing call switches.
//! switch.request_mode(&mut video, &request);
//! ```
//!
//! # Testing
//!
//! Use [`MockNegotiator`], [`MockVideoDriver`], and [`MockProgrammer`]
//! to test switching logic without the Switchres library or hardware:
//!
//! ```
//! use crt_switch_core::{CrtModeSwitch, MockNegotiator, MockVideoDriver};
//!
//! let mock = MockNegotiator::with_scale(2, 2);
//! let switch = CrtModeSwitch::new(Box::new(mock));
//! assert_eq!(switch.state().shadow_width, 0);
//! ```

#![warn(missing_docs)]

mod error;
mod mock;
mod programmer;
mod service;
mod state;
mod switch;
mod timing;
mod video;

// Re-export public API
pub use error::SwitchError;
pub use mock::{MockNegotiator, MockProgrammer, MockVideoDriver, NegotiatorCalls};
pub use programmer::{TimingProgrammer, VideocoreProgrammer};
pub use service::{
    DisplayBinding, ModeNegotiator, MonitorProfile, NegotiatedMode, ServiceState,
    SwitchresService,
};
pub use state::SwitchState;
pub use switch::{CrtModeSwitch, ModeRequest, MENU_SENTINEL_HEIGHT};
pub use timing::{framebuffer_command, generate_timing, vertical_total, TimingDescriptor};
pub use video::VideoDriver;
