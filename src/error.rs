use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum PlipError {
    // Hardware errors
    AttachFailed(String),
    HardwareError(String),

    // Lifecycle errors
    StartupFailed(String),
    ServerStopped,

    // Generic errors
    InvalidParameter,
}

impl fmt::Display for PlipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlipError::AttachFailed(msg) => write!(f, "Attach failed: {}", msg),
            PlipError::HardwareError(msg) => write!(f, "Hardware error: {}", msg),
            PlipError::StartupFailed(msg) => write!(f, "Server startup failed: {}", msg),
            PlipError::ServerStopped => write!(f, "Link server has stopped"),
            PlipError::InvalidParameter => write!(f, "Invalid parameter"),
        }
    }
}

impl Error for PlipError {}

pub type Result<T> = std::result::Result<T, PlipError>;

/// Coarse error class stored in a completed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoError {
    #[default]
    None,
    NoResources,
    BadArgument,
    BadState,
    MtuExceeded,
    NotSupported,
    Software,
    OutOfService,
    TxFailure,
}

/// Fine-grained error code stored next to [`IoError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireError {
    #[default]
    None,
    GenericError,
    NotConfigured,
    UnitOnline,
    UnitOffline,
    IsConfigured,
    BuffError,
    TooManyRetries,
    BadEvent,
    AlreadyTracked,
    NotTracked,
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IoError::None => "no error",
            IoError::NoResources => "no resources",
            IoError::BadArgument => "bad argument",
            IoError::BadState => "bad state",
            IoError::MtuExceeded => "mtu exceeded",
            IoError::NotSupported => "command not supported",
            IoError::Software => "software error",
            IoError::OutOfService => "out of service",
            IoError::TxFailure => "transmit failure",
        };
        f.write_str(s)
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WireError::None => "none",
            WireError::GenericError => "generic error",
            WireError::NotConfigured => "unit not configured",
            WireError::UnitOnline => "unit is online",
            WireError::UnitOffline => "unit is offline",
            WireError::IsConfigured => "unit already configured",
            WireError::BuffError => "buffer management error",
            WireError::TooManyRetries => "too many retries",
            WireError::BadEvent => "bad event mask",
            WireError::AlreadyTracked => "type already tracked",
            WireError::NotTracked => "type not tracked",
        };
        f.write_str(s)
    }
}
