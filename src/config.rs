use crate::error::ConfigError;

/// Default baud rate the sensor ships with.
pub const DEFAULT_BAUD: u32 = 57_600;

/// Default per-command timeout, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 2_000;

/// Driver configuration. No environment variables and no on-disk
/// state are recognized — everything is supplied by the caller.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub serial_port: String,
    pub baud: u32,
    pub default_timeout_ms: u64,
    pub password: u32,
    /// Whether the enrol workflow sleeps `default_timeout_ms` between
    /// the first-capture removal and the second put-finger callback.
    /// The data-returning enrol variant never sleeps here regardless of
    /// this flag — see DESIGN.md for the reasoning.
    pub settle_between_scans: bool,
}

impl DriverConfig {
    pub fn new(serial_port: impl Into<String>) -> Self {
        Self {
            serial_port: serial_port.into(),
            baud: DEFAULT_BAUD,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            password: 0,
            settle_between_scans: true,
        }
    }

    pub fn with_baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.default_timeout_ms = timeout_ms;
        self
    }

    pub fn with_password(mut self, password: u32) -> Self {
        self.password = password;
        self
    }

    pub fn with_settle_between_scans(mut self, settle: bool) -> Self {
        self.settle_between_scans = settle;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial_port.trim().is_empty() {
            return Err(ConfigError::EmptyPort);
        }
        if self.baud == 0 {
            return Err(ConfigError::ZeroBaud);
        }
        Ok(())
    }
}
