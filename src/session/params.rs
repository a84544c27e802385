//! Agent launch parameters.
//!
//! [`ServerParams`] collects everything the on-device agent needs to know
//! at launch: encoder limits, display selection, input handling, and the
//! candidate port range for the tunnel. The agent takes them as a strict
//! positional argument list; [`ServerParams::to_agent_args`] produces that
//! list and [`ServerParams::to_path_args`] the equivalent URL path segment
//! sequence for direct mode.
//!
//! # Example
//!
//! ```
//! use scrcpy_session::{LogLevel, PortRange, ServerParams};
//!
//! let params = ServerParams::new()
//!     .with_log_level(LogLevel::Debug)
//!     .with_max_size(1920)
//!     .with_bit_rate(8_000_000)
//!     .with_crop("1224:1440:0:0");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::error::{Error, Result};

// ============================================================================
// LogLevel
// ============================================================================

/// Log level forwarded to the agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Verbose diagnostics.
    Debug,
    /// Normal operation.
    #[default]
    Info,
    /// Problems worth attention.
    Warn,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// Name understood by the agent.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PortRange
// ============================================================================

/// Closed interval of candidate tunnel ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    first: u16,
    last: u16,
}

impl PortRange {
    /// Creates a range covering `first..=last`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `first > last`.
    pub fn new(first: u16, last: u16) -> Result<Self> {
        if first > last {
            return Err(Error::config(format!(
                "invalid port range {first}:{last}"
            )));
        }
        Ok(Self { first, last })
    }

    /// Range containing a single port.
    #[must_use]
    pub const fn single(port: u16) -> Self {
        Self {
            first: port,
            last: port,
        }
    }

    /// First candidate port.
    #[inline]
    #[must_use]
    pub const fn first(self) -> u16 {
        self.first
    }

    /// Last candidate port.
    #[inline]
    #[must_use]
    pub const fn last(self) -> u16 {
        self.last
    }
}

impl Default for PortRange {
    /// The client's historical default range.
    fn default() -> Self {
        Self {
            first: 27183,
            last: 27199,
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.first, self.last)
    }
}

// ============================================================================
// ServerParams
// ============================================================================

/// Agent launch configuration.
///
/// All fields are immutable once `start` begins. Optional strings serialize
/// as `-` when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerParams {
    /// Log level forwarded to the agent.
    pub log_level: LogLevel,

    /// Maximum dimension of the mirrored video, 0 for unlimited.
    pub max_size: u16,

    /// Target video bit rate in bits per second.
    pub bit_rate: u32,

    /// Maximum frame rate, 0 for unlimited.
    pub max_fps: u16,

    /// Locked video orientation, -1 for unlocked.
    pub lock_video_orientation: i8,

    /// Display to mirror.
    pub display_id: u16,

    /// Crop expression `width:height:x:y`, if any.
    pub crop: Option<String>,

    /// Whether the control stream carries input events.
    pub control: bool,

    /// Show physical touches on the device.
    pub show_touches: bool,

    /// Keep the device awake while mirroring.
    pub stay_awake: bool,

    /// Extra codec options, if any.
    pub codec_options: Option<String>,

    /// Explicit encoder name, if any.
    pub encoder_name: Option<String>,

    /// Candidate ports for the tunnel.
    pub port_range: PortRange,

    /// Skip the reverse strategy and go straight to forward.
    pub force_adb_forward: bool,
}

impl Default for ServerParams {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ServerParams {
    /// Creates parameters with the client defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            log_level: LogLevel::Info,
            max_size: 0,
            bit_rate: 8_000_000,
            max_fps: 0,
            lock_video_orientation: -1,
            display_id: 0,
            crop: None,
            control: true,
            show_touches: false,
            stay_awake: false,
            codec_options: None,
            encoder_name: None,
            port_range: PortRange::default(),
            force_adb_forward: false,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ServerParams {
    /// Sets the agent log level.
    #[inline]
    #[must_use]
    pub fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = log_level;
        self
    }

    /// Sets the maximum video dimension.
    #[inline]
    #[must_use]
    pub fn with_max_size(mut self, max_size: u16) -> Self {
        self.max_size = max_size;
        self
    }

    /// Sets the video bit rate in bits per second.
    #[inline]
    #[must_use]
    pub fn with_bit_rate(mut self, bit_rate: u32) -> Self {
        self.bit_rate = bit_rate;
        self
    }

    /// Sets the maximum frame rate.
    #[inline]
    #[must_use]
    pub fn with_max_fps(mut self, max_fps: u16) -> Self {
        self.max_fps = max_fps;
        self
    }

    /// Locks the video orientation.
    #[inline]
    #[must_use]
    pub fn with_lock_video_orientation(mut self, orientation: i8) -> Self {
        self.lock_video_orientation = orientation;
        self
    }

    /// Selects the display to mirror.
    #[inline]
    #[must_use]
    pub fn with_display_id(mut self, display_id: u16) -> Self {
        self.display_id = display_id;
        self
    }

    /// Sets a crop expression `width:height:x:y`.
    #[inline]
    #[must_use]
    pub fn with_crop(mut self, crop: impl Into<String>) -> Self {
        self.crop = Some(crop.into());
        self
    }

    /// Enables or disables the control stream.
    #[inline]
    #[must_use]
    pub fn with_control(mut self, control: bool) -> Self {
        self.control = control;
        self
    }

    /// Shows physical touches on the device.
    #[inline]
    #[must_use]
    pub fn with_show_touches(mut self) -> Self {
        self.show_touches = true;
        self
    }

    /// Keeps the device awake while mirroring.
    #[inline]
    #[must_use]
    pub fn with_stay_awake(mut self) -> Self {
        self.stay_awake = true;
        self
    }

    /// Sets extra codec options.
    #[inline]
    #[must_use]
    pub fn with_codec_options(mut self, options: impl Into<String>) -> Self {
        self.codec_options = Some(options.into());
        self
    }

    /// Selects an explicit encoder.
    #[inline]
    #[must_use]
    pub fn with_encoder_name(mut self, name: impl Into<String>) -> Self {
        self.encoder_name = Some(name.into());
        self
    }

    /// Sets the candidate port range.
    #[inline]
    #[must_use]
    pub fn with_port_range(mut self, port_range: PortRange) -> Self {
        self.port_range = port_range;
        self
    }

    /// Skips the reverse strategy.
    #[inline]
    #[must_use]
    pub fn with_force_adb_forward(mut self) -> Self {
        self.force_adb_forward = true;
        self
    }
}

// ============================================================================
// Serialization
// ============================================================================

impl ServerParams {
    /// Positional argument list for the agent, in the exact order it parses.
    ///
    /// `tunnel_forward` tells the agent whether it must listen (forward
    /// tunnel) or connect back (reverse tunnel).
    #[must_use]
    pub fn to_agent_args(&self, tunnel_forward: bool) -> Vec<String> {
        vec![
            crate::AGENT_VERSION.to_string(),
            self.log_level.as_str().to_string(),
            self.max_size.to_string(),
            self.bit_rate.to_string(),
            self.max_fps.to_string(),
            self.lock_video_orientation.to_string(),
            bool_arg(tunnel_forward),
            opt_arg(self.crop.as_deref()),
            // always send frame meta (packet boundaries + timestamp)
            "true".to_string(),
            bool_arg(self.control),
            self.display_id.to_string(),
            bool_arg(self.show_touches),
            bool_arg(self.stay_awake),
            opt_arg(self.codec_options.as_deref()),
            opt_arg(self.encoder_name.as_deref()),
        ]
    }

    /// `/`-joined parameter list for the direct start endpoint.
    ///
    /// Direct mode always behaves like a forward tunnel: the agent listens
    /// and the client connects.
    #[must_use]
    pub fn to_path_args(&self) -> String {
        self.to_agent_args(true).join("/")
    }
}

/// Serializes a flag the way the agent parses it.
fn bool_arg(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

/// Serializes an optional string, `-` when absent.
fn opt_arg(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

// ============================================================================
// Tests
// ============================================================================
