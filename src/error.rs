use thiserror::Error;

pub type Result<T> = std::result::Result<T, DriverError>;

/// Top-level error returned by every public entry point.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failures at the byte-reader / framed-packet layer. None of these
/// are retried; the caller sees them immediately.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("serial port I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    SerialPort(#[from] serialport::Error),

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("unexpected packet kind: expected {expected:?}, got {actual:?}")]
    UnexpectedPacketKind {
        expected: crate::protocol::PacketKind,
        actual: crate::protocol::PacketKind,
    },

    #[error("unexpected payload length: expected {expected}, got {actual}")]
    UnexpectedLength { expected: usize, actual: usize },

    #[error("timed out waiting for a reply")]
    Timeout,

    #[error("frame too short (length < 2)")]
    ShortFrame,
}

/// Confirmation-code taxonomy from the instruction set, plus the
/// driver-level conditions that are not confirmation codes at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    #[error("packet receive error")]
    PacketReceiveError,
    #[error("no finger detected")]
    NoFinger,
    #[error("image capture failed")]
    ImageCaptureFailed,
    #[error("image too disordered to generate a feature vector")]
    ImageTooDisordered,
    #[error("image has too few feature points")]
    TooFewFeaturePoints,
    #[error("templates do not match")]
    TemplatesDoNotMatch,
    #[error("no match found in library")]
    NoMatchInLibrary,
    #[error("the two enrolment scans are not compatible")]
    EnrolMismatch,
    #[error("slot id is out of the library's range")]
    SlotOutOfRange,
    #[error("error reading template from library")]
    TemplateReadError,
    #[error("error uploading template")]
    TemplateUploadError,
    #[error("module cannot accept any more data packets")]
    CannotAcceptDataPackets,
    #[error("error uploading image")]
    ImageUploadError,
    #[error("failed to delete template(s)")]
    DeleteFailed,
    #[error("failed to clear the library")]
    LibraryClearFailed,
    #[error("incorrect password")]
    IncorrectPassword,
    #[error("invalid image")]
    ImageInvalid,
    #[error("flash write error")]
    FlashWriteError,
    #[error("invalid register number")]
    InvalidRegister,
    #[error("wrong module address")]
    WrongAddress,
    #[error("password has not yet been verified")]
    PasswordNotVerified,
    #[error("uploaded scan has the wrong size")]
    WrongScanSize,
    #[error("unrecognized confirmation code 0x{0:02X}")]
    Unknown(u8),
    #[error("workflow was cancelled")]
    Cancelled,
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
}

impl SensorError {
    /// Map a confirmation code (the first payload byte of an Ack) to its
    /// typed error. Callers that treat some codes as benign (e.g. `no
    /// finger`, `no match`) must intercept those codes before calling
    /// this — it has no notion of "which codes are OK here".
    pub fn from_confirmation_code(code: u8) -> Self {
        match code {
            0x01 => SensorError::PacketReceiveError,
            0x02 => SensorError::NoFinger,
            0x03 => SensorError::ImageCaptureFailed,
            0x06 => SensorError::ImageTooDisordered,
            0x07 => SensorError::TooFewFeaturePoints,
            0x08 => SensorError::TemplatesDoNotMatch,
            0x09 => SensorError::NoMatchInLibrary,
            0x0A => SensorError::EnrolMismatch,
            0x0B => SensorError::SlotOutOfRange,
            0x0C => SensorError::TemplateReadError,
            0x0D => SensorError::TemplateUploadError,
            0x0E => SensorError::CannotAcceptDataPackets,
            0x0F => SensorError::ImageUploadError,
            0x10 => SensorError::DeleteFailed,
            0x11 => SensorError::LibraryClearFailed,
            0x13 => SensorError::IncorrectPassword,
            0x15 => SensorError::ImageInvalid,
            0x18 => SensorError::FlashWriteError,
            0x1A => SensorError::InvalidRegister,
            0x20 => SensorError::WrongAddress,
            0x21 => SensorError::PasswordNotVerified,
            other => SensorError::Unknown(other),
        }
    }
}

/// Validation failures for `DriverConfig`. Kept separate from
/// `SensorError` since these are caught before any byte reaches the
/// wire.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("serial_port must not be empty")]
    EmptyPort,
    #[error("baud must be greater than 0")]
    ZeroBaud,
}
