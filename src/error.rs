/// Errors raised at the boundaries of the control core.
///
/// Periodic tasks never return these to their callers: they log and skip
/// the cycle. Only startup, configuration and direct API calls surface them.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("failed to open channel {name}: {source}")]
    ChannelOpen {
        name: String,
        #[source]
        source: serialport::Error,
    },

    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed thrust allocation matrix: {0}")]
    MalformedMatrix(String),

    #[error("malformed switch line: {0:?}")]
    MalformedSwitchLine(String),

    #[error("invalid joystick event: {0}")]
    InvalidEvent(String),

    #[error("invalid motor command: {0}")]
    InvalidMotorCommand(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ControlError>;
