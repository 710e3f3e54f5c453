use crate::error::{Result, SensorError};

/// The only confirmation code every primitive treats as unconditional
/// success.
pub const OK: u8 = 0x00;

/// Confirmation code meaning "no finger on the sensor" — benign for
/// `GetImage`, an error everywhere else it could appear.
pub const NO_FINGER: u8 = 0x02;

/// Confirmation code meaning "no match found in the library" — benign
/// for `Search`.
pub const NO_MATCH_IN_LIBRARY: u8 = 0x09;

/// Confirmation code meaning "the two templates don't match" — benign
/// for `Match`.
pub const TEMPLATES_DO_NOT_MATCH: u8 = 0x08;

/// Require `code == OK`, mapping anything else to its typed
/// `SensorError`.
pub fn require_ok(code: u8) -> Result<()> {
    if code == OK {
        Ok(())
    } else {
        Err(SensorError::from_confirmation_code(code).into())
    }
}
