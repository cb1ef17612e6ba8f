//! Error types for the CRT mode switcher.

/// Errors that can occur while switching CRT modes.
///
/// None of these reach the host's per-tick entry point: the switch
/// controller logs them and degrades to the 1:1 fallback path.
#[derive(Debug, thiserror::Error)]
pub enum SwitchError {
    /// The mode-negotiation shared library failed to load or was missing
    /// the expected entry symbol.
    #[error("Failed to load negotiation service: {0}")]
    ServiceLoad(#[from] libloading::Error),

    /// The negotiation service loaded but refused to bind to the
    /// requested display output.
    #[error("Negotiation service rejected display bind (status {0})")]
    BindRejected(i32),

    /// The negotiation service could not produce a mode for the request.
    #[error("No mode available for {width}x{height}@{hz}")]
    NoMode {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in lines.
        height: u32,
        /// Requested refresh rate in Hz.
        hz: f32,
    },

    /// An OS timing command exited with a non-zero status.
    #[error("Timing command failed with status {status}: {command}")]
    TimingCommand {
        /// The command line that was executed.
        command: String,
        /// Exit status, or -1 if the process was killed by a signal.
        status: i32,
    },

    /// An I/O error occurred (e.g., spawning a timing command).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
