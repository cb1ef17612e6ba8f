//! Direct timing programming for hardware that exposes its timing
//! registers through OS commands (RPi-class Videocore stacks).

use crate::error::SwitchError;
use crate::timing::{framebuffer_command, TimingDescriptor, SAFE_MODE_COMMAND};

use log::{debug, info};
use std::process::{Command, Stdio};

/// Trait for pushing a derived timing to the display hardware.
///
/// Fitted onto the switch controller only on platforms where the
/// fallback path can program timing registers directly; elsewhere a
/// failed negotiation just yields an unscaled mode.
pub trait TimingProgrammer {
    /// Program the given timing. Errors are reported to the caller,
    /// which keeps the previous mode in effect.
    fn program(
        &mut self,
        width: u32,
        height: u32,
        hz: f32,
        timing: &TimingDescriptor,
    ) -> Result<(), SwitchError>;
}

/// [`TimingProgrammer`] backed by the Videocore command surface:
/// `vcgencmd` for the HDMI timing registers, `tvservice` to force a safe
/// default mode, `fbset` for framebuffer geometry.
pub struct VideocoreProgrammer;

impl VideocoreProgrammer {
    fn run(command: &str) -> Result<(), SwitchError> {
        debug!("running: {}", command);
        let status = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdout(Stdio::null())
            .status()?;

        if !status.success() {
            return Err(SwitchError::TimingCommand {
                command: command.to_string(),
                status: status.code().unwrap_or(-1),
            });
        }
        Ok(())
    }
}

impl TimingProgrammer for VideocoreProgrammer {
    fn program(
        &mut self,
        width: u32,
        height: u32,
        hz: f32,
        timing: &TimingDescriptor,
    ) -> Result<(), SwitchError> {
        let hdmi = format!("vcgencmd {}", timing.timing_command(width, height, hz));
        Self::run(&hdmi)?;
        Self::run(SAFE_MODE_COMMAND)?;
        Self::run(&framebuffer_command(width, height))?;
        info!("programmed timing for {}x{}@{}", width, height, hz);
        Ok(())
    }
}
