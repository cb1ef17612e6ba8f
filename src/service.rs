//! Mode-negotiation service client.
//!
//! Binds lazily to the Switchres shared library, which owns the monitor
//! database and decides the concrete mode the display can actually run.
//! All core logic depends only on the [`ModeNegotiator`] trait;
//! [`SwitchresService`] is the one adapter that performs the dynamic bind.

use crate::error::SwitchError;

use libloading::{Library, Symbol};
use log::{debug, error, info, warn};
use std::ffi::{c_char, c_double, c_int, c_uchar, CStr};

#[cfg(target_os = "windows")]
const SERVICE_LIBRARY: &str = "libswitchres.dll";
#[cfg(not(target_os = "windows"))]
const SERVICE_LIBRARY: &str = "libswitchres.so";

/// Entry symbol exporting the service's function table.
const SERVICE_SYMBOL: &[u8] = b"srlib";

// =============================================================================
// Request/Response Types
// =============================================================================

/// Lifecycle state of the negotiation service handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// No library loaded.
    Unloaded,
    /// Library loaded, initialized, and bound to a display.
    Loaded,
    /// The last load or negotiation attempt failed; a later call may retry.
    Failed,
}

/// The concrete mode the service committed to for one request.
///
/// Transient: consumed immediately by the switch controller, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NegotiatedMode {
    /// Achieved width in pixels.
    pub width: u32,
    /// Achieved height in lines.
    pub height: u32,
    /// Horizontal integer scale factor.
    pub x_scale: u32,
    /// Vertical integer scale factor.
    pub y_scale: u32,
    /// Achieved refresh rate in Hz.
    pub refresh: f32,
}

/// Monitor scan-rate class presets understood by the negotiation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorProfile {
    /// Standard-resolution 15 kHz arcade monitor.
    Arcade15,
    /// 31 kHz arcade monitor.
    Arcade31,
    /// 31 kHz 120 Hz PC monitor.
    Pc31_120,
    /// Use whatever the service's own configuration selects.
    ServiceDefault,
}

impl MonitorProfile {
    /// Map a host profile index to a preset. Index 4 (and anything
    /// unrecognized) defers to the service's own configuration.
    pub fn from_index(index: u32) -> Self {
        match index {
            1 => Self::Arcade15,
            2 => Self::Arcade31,
            3 => Self::Pc31_120,
            _ => Self::ServiceDefault,
        }
    }

    /// The preset identifier passed to the service, or `None` for
    /// [`MonitorProfile::ServiceDefault`].
    pub fn preset(&self) -> Option<&'static CStr> {
        match self {
            Self::Arcade15 => Some(c"arcade_15"),
            Self::Arcade31 => Some(c"arcade_31"),
            Self::Pc31_120 => Some(c"pc_31_120"),
            Self::ServiceDefault => None,
        }
    }
}

/// Which display output the service binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayBinding {
    /// Let the service pick an output.
    Auto,
    /// Bind to a specific output, identified by a single decimal digit.
    Output(u8),
}

impl DisplayBinding {
    /// Translate the host's one-based monitor index. Index 0 (and any
    /// index that does not name one of the ten addressable outputs)
    /// means auto.
    pub fn from_one_based(index: i32) -> Self {
        match index - 1 {
            n @ 0..=9 => Self::Output(n as u8),
            _ => Self::Auto,
        }
    }
}

// =============================================================================
// Mode Negotiator Trait
// =============================================================================

/// Trait for mode-negotiation implementations.
///
/// This allows for mock implementations in tests.
pub trait ModeNegotiator {
    /// Load, initialize, and bind the service if it is not already live.
    ///
    /// Idempotent: returns `true` immediately when already loaded.
    /// Returns `false` without side effects when the service cannot be
    /// loaded or refuses the display bind; failures are logged, never
    /// propagated.
    fn ensure_loaded(
        &mut self,
        binding: DisplayBinding,
        profile: MonitorProfile,
        oversample_width: u32,
    ) -> bool;

    /// Ask the service for the best non-interlaced mode matching the
    /// request. `None` means the service failed and has been torn down;
    /// the caller takes the fallback path and may retry next tick.
    fn negotiate(&mut self, width: u32, height: u32, hz: f32) -> Option<NegotiatedMode>;

    /// Deinitialize and unload the service. Idempotent.
    fn destroy(&mut self);

    /// Current lifecycle state of the service handle.
    fn state(&self) -> ServiceState;
}

// =============================================================================
// Switchres FFI surface
// =============================================================================

/// Mode result as laid out by the service ABI.
#[repr(C)]
#[derive(Default)]
struct SrMode {
    width: c_int,
    height: c_int,
    refresh: c_double,
    interlace: c_uchar,
    x_scale: c_int,
    y_scale: c_int,
}

type SrLogFn = unsafe extern "C" fn(*const c_char);

/// The service's exported function table.
#[repr(C)]
struct SrApi {
    init: unsafe extern "C" fn(),
    deinit: unsafe extern "C" fn(),
    sr_set_log_level: unsafe extern "C" fn(c_int),
    sr_set_log_callback_info: unsafe extern "C" fn(SrLogFn),
    sr_set_log_callback_debug: unsafe extern "C" fn(SrLogFn),
    sr_set_log_callback_error: unsafe extern "C" fn(SrLogFn),
    sr_set_monitor: unsafe extern "C" fn(*const c_char),
    sr_set_user_mode: unsafe extern "C" fn(c_int, c_int, c_int),
    sr_init_disp: unsafe extern "C" fn(*const c_char) -> c_int,
    sr_switch_to_mode:
        unsafe extern "C" fn(c_int, c_int, c_double, c_uchar, *mut SrMode) -> c_uchar,
}

unsafe extern "C" fn service_log_info(msg: *const c_char) {
    if !msg.is_null() {
        info!("{}", unsafe { CStr::from_ptr(msg) }.to_string_lossy());
    }
}

unsafe extern "C" fn service_log_debug(msg: *const c_char) {
    if !msg.is_null() {
        debug!("{}", unsafe { CStr::from_ptr(msg) }.to_string_lossy());
    }
}

unsafe extern "C" fn service_log_error(msg: *const c_char) {
    if !msg.is_null() {
        error!("{}", unsafe { CStr::from_ptr(msg) }.to_string_lossy());
    }
}

// =============================================================================
// SwitchresService
// =============================================================================

struct LoadedApi {
    // Held to keep the library mapped while `api` is dereferenced.
    _lib: Library,
    api: *const SrApi,
}

/// The concrete negotiation client backed by the Switchres library.
///
/// Owns the process's single service handle; the library is loaded on the
/// first switch attempt and unloaded on [`destroy`](ModeNegotiator::destroy),
/// on negotiation failure, or on drop.
pub struct SwitchresService {
    handle: Option<LoadedApi>,
    state: ServiceState,
}

impl SwitchresService {
    /// Create an unloaded client. No library is touched until the first
    /// [`ensure_loaded`](ModeNegotiator::ensure_loaded) call.
    pub fn new() -> Self {
        Self {
            handle: None,
            state: ServiceState::Unloaded,
        }
    }

    fn try_load(
        &mut self,
        binding: DisplayBinding,
        profile: MonitorProfile,
        oversample_width: u32,
    ) -> Result<(), SwitchError> {
        let lib = unsafe { Library::new(SERVICE_LIBRARY)? };
        let api: *const SrApi = unsafe {
            let sym: Symbol<*const SrApi> = lib.get(SERVICE_SYMBOL)?;
            *sym
        };
        info!("switchres library loaded");

        unsafe {
            ((*api).init)();
            ((*api).sr_set_log_level)(3);
            ((*api).sr_set_log_callback_info)(service_log_info);
            ((*api).sr_set_log_callback_debug)(service_log_debug);
            ((*api).sr_set_log_callback_error)(service_log_error);

            match profile.preset() {
                Some(name) => {
                    ((*api).sr_set_monitor)(name.as_ptr());
                    info!("monitor profile: {:?}", profile);
                }
                None => info!("monitor profile left to service configuration"),
            }

            if oversample_width > 2 {
                ((*api).sr_set_user_mode)(oversample_width as c_int, 0, 0);
                info!("forcing horizontal resolution: {}", oversample_width);
            }

            let status = match binding {
                DisplayBinding::Output(digit) => {
                    let arg = [(b'0' + digit) as c_char, 0];
                    info!("binding display output {}", digit);
                    ((*api).sr_init_disp)(arg.as_ptr())
                }
                DisplayBinding::Auto => {
                    info!("binding display output: auto");
                    ((*api).sr_init_disp)(std::ptr::null())
                }
            };

            if status != 1 {
                ((*api).deinit)();
                return Err(SwitchError::BindRejected(status));
            }
        }

        self.handle = Some(LoadedApi { _lib: lib, api });
        Ok(())
    }
}

impl Default for SwitchresService {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeNegotiator for SwitchresService {
    fn ensure_loaded(
        &mut self,
        binding: DisplayBinding,
        profile: MonitorProfile,
        oversample_width: u32,
    ) -> bool {
        if self.state == ServiceState::Loaded {
            return true;
        }

        match self.try_load(binding, profile, oversample_width) {
            Ok(()) => {
                self.state = ServiceState::Loaded;
                true
            }
            Err(e) => {
                error!("negotiation service unavailable: {}", e);
                self.handle = None;
                self.state = ServiceState::Failed;
                false
            }
        }
    }

    fn negotiate(&mut self, width: u32, height: u32, hz: f32) -> Option<NegotiatedMode> {
        let api = self.handle.as_ref()?.api;

        let mut raw = SrMode::default();
        let ok = unsafe {
            ((*api).sr_switch_to_mode)(
                width as c_int,
                height as c_int,
                hz as c_double,
                0,
                &mut raw,
            )
        };

        if ok == 0 {
            warn!("{}", SwitchError::NoMode { width, height, hz });
            unsafe { ((*api).deinit)() };
            self.handle = None;
            self.state = ServiceState::Failed;
            return None;
        }

        debug!(
            "negotiated {}x{}@{} scale x{}/x{} interlace {}",
            raw.width, raw.height, raw.refresh, raw.x_scale, raw.y_scale, raw.interlace
        );
        Some(NegotiatedMode {
            width: raw.width as u32,
            height: raw.height as u32,
            x_scale: raw.x_scale as u32,
            y_scale: raw.y_scale as u32,
            refresh: raw.refresh as f32,
        })
    }

    fn destroy(&mut self) {
        if let Some(handle) = self.handle.take() {
            unsafe { ((*handle.api).deinit)() };
            info!("negotiation service destroyed");
        }
        self.state = ServiceState::Unloaded;
    }

    fn state(&self) -> ServiceState {
        self.state
    }
}

impl Drop for SwitchresService {
    fn drop(&mut self) {
        self.destroy();
    }
}
