//! CRT modeline generation for the direct-timing hardware path.
//!
//! Derives the analog timing (porches, sync pulses, totals, pixel clock)
//! that a CRT-class display needs for a given width/height/refresh triple,
//! and formats the OS command strings that program it. The derivation is a
//! pure function; nothing here touches hardware.

/// Heights above this many lines are framed as an interlaced signal.
const INTERLACE_THRESHOLD: u32 = 300;

/// Widths at or above this switch to the wide-signal porch formulas.
const WIDE_SIGNAL_THRESHOLD: u32 = 700;

/// Vertical sync pulse length in lines, fixed for both framings.
const VERTICAL_SYNC_LINES: i32 = 3;

/// Lines subtracted from the front porch to center the picture,
/// doubled for interlaced signals.
const CENTERING_LINES: i32 = 8;

/// Vertical total used when no band matches the request.
const DEFAULT_VERTICAL_TOTAL: u32 = 261;

/// A fully derived analog timing for one mode.
///
/// Porch, sync, and total fields are rounded to whole pixels/lines for
/// hardware programming; the pixel clock stays floating point.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingDescriptor {
    /// Horizontal front porch in pixels.
    pub h_front_porch: i32,
    /// Horizontal sync pulse in pixels.
    pub h_sync: i32,
    /// Horizontal back porch in pixels.
    pub h_back_porch: i32,
    /// Vertical front porch in lines.
    pub v_front_porch: i32,
    /// Vertical sync pulse in lines.
    pub v_sync: i32,
    /// Vertical back porch in lines.
    pub v_back_porch: i32,
    /// Total pixels per scanline including blanking.
    pub h_total: i32,
    /// Total lines per field including blanking.
    pub v_total: i32,
    /// Pixel clock in Hz.
    pub pixel_clock: f32,
    /// Whether the signal is framed interlaced.
    pub interlaced: bool,
}

/// One row of the vertical-total lookup.
///
/// A band matches when `h_above < height < h_below` and
/// `hz_above < hz < hz_below`; every comparison is strict, matching the
/// scan-rate regimes of the supported monitor classes. Later rows
/// override earlier ones.
struct VerticalBand {
    h_above: u32,
    h_below: u32,
    hz_above: f32,
    hz_below: f32,
    total: u32,
}

/// Vertical totals by height and refresh band. Heights here are working
/// heights, i.e. already halved for interlaced signals.
const VERTICAL_BANDS: &[VerticalBand] = &[
    VerticalBand { h_above: 0, h_below: 241, hz_above: 0.0, hz_below: f32::INFINITY, total: 261 },
    VerticalBand { h_above: 0, h_below: 241, hz_above: 56.0, hz_below: 58.0, total: 280 },
    VerticalBand { h_above: 0, h_below: 241, hz_above: 0.0, hz_below: 55.0, total: 313 },
    VerticalBand { h_above: 250, h_below: 260, hz_above: 54.0, hz_below: f32::INFINITY, total: 296 },
    VerticalBand { h_above: 250, h_below: 260, hz_above: 52.0, hz_below: 54.0, total: 285 },
    VerticalBand { h_above: 250, h_below: 260, hz_above: 0.0, hz_below: 52.0, total: 313 },
    VerticalBand { h_above: 260, h_below: 300, hz_above: 0.0, hz_below: f32::INFINITY, total: 318 },
    VerticalBand { h_above: 400, h_below: u32::MAX, hz_above: 56.0, hz_below: f32::INFINITY, total: 533 },
    VerticalBand { h_above: 520, h_below: u32::MAX, hz_above: 0.0, hz_below: 57.0, total: 580 },
    VerticalBand { h_above: 300, h_below: u32::MAX, hz_above: 0.0, hz_below: 56.0, total: 615 },
    VerticalBand { h_above: 500, h_below: u32::MAX, hz_above: 0.0, hz_below: 56.0, total: 624 },
];

/// Look up the vertical total for a working height and refresh rate.
///
/// Band boundaries are strict on both sides; heights that fall in a gap
/// (241-250, 300-400 at high refresh, ...) get the progressive default
/// of 261 lines.
pub fn vertical_total(height: u32, hz: f32) -> u32 {
    let mut total = DEFAULT_VERTICAL_TOTAL;
    for band in VERTICAL_BANDS {
        if height > band.h_above
            && height < band.h_below
            && hz > band.hz_above
            && hz < band.hz_below
        {
            total = band.total;
        }
    }
    total
}

/// Derive the analog timing for a requested mode.
///
/// Heights above 300 lines are framed interlaced: the porch math runs on
/// half the height, the centering constant doubles, and the pixel clock
/// is quartered relative to the progressive formula. `h_offset` shifts
/// the picture horizontally by eating into the sync pulse; it is doubled
/// for wide (>= 700 pixel) signals.
pub fn generate_timing(width: u32, height: u32, hz: f32, h_offset: i32) -> TimingDescriptor {
    let interlaced = height > INTERLACE_THRESHOLD;
    let work_height = if interlaced { height / 2 } else { height };

    let offset = if width >= WIDE_SIGNAL_THRESHOLD {
        h_offset * 2
    } else {
        h_offset
    };

    let w = width as f32;
    let hsp = w * 0.117 - (offset * 4) as f32;
    let (hfp, hbp) = if width < WIDE_SIGNAL_THRESHOLD {
        let hfp = w * 0.065;
        (hfp, w * 0.35 - hsp - hfp)
    } else {
        (w * 0.033 + w / 112.0, w * 0.225 + w / 58.0)
    };

    let h_front_porch = hfp.round() as i32;
    let h_sync = hsp.round() as i32;
    let h_back_porch = hbp.round() as i32;
    let h_total = width as i32 + h_front_porch + h_sync + h_back_porch;

    let v_total = vertical_total(work_height, hz) as i32;
    let centering = if interlaced {
        CENTERING_LINES * 2
    } else {
        CENTERING_LINES
    };
    let v_front_porch =
        ((v_total - work_height as i32) as f32 / 2.0 - centering as f32).round() as i32;
    let v_sync = VERTICAL_SYNC_LINES;
    let v_back_porch = v_total - work_height as i32 - v_sync - v_front_porch;

    let pixel_clock = if interlaced {
        (h_total * v_total) as f32 * (hz / 2.0) / 2.0
    } else {
        (h_total * v_total) as f32 * hz
    };

    TimingDescriptor {
        h_front_porch,
        h_sync,
        h_back_porch,
        v_front_porch,
        v_sync,
        v_back_porch,
        h_total,
        v_total,
        pixel_clock,
        interlaced,
    }
}

impl TimingDescriptor {
    /// Format the HDMI timing command for this descriptor.
    ///
    /// Field order is fixed by the display stack:
    /// `width 1 hfp hsp hbp height 1 vfp vsp vbp 0 0 0 hz interlace clock 1`.
    pub fn timing_command(&self, width: u32, height: u32, hz: f32) -> String {
        format!(
            "hdmi_timings {} 1 {} {} {} {} 1 {} {} {} 0 0 0 {:.6} {} {:.6} 1",
            width,
            self.h_front_porch,
            self.h_sync,
            self.h_back_porch,
            height,
            self.v_front_porch,
            self.v_sync,
            self.v_back_porch,
            hz,
            self.interlaced as i32,
            self.pixel_clock,
        )
    }
}

/// Command forcing the display into a safe default mode before the new
/// timing takes effect.
pub const SAFE_MODE_COMMAND: &str = "tvservice -e \"DMT 87\"";

/// Format the command setting framebuffer geometry to match the mode.
pub fn framebuffer_command(width: u32, height: u32) -> String {
    format!("fbset -g {w} {h} {w} {h} 24", w = width, h = height)
}
