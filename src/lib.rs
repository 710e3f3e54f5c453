//! Host-side driver for FPM10-family optical fingerprint sensor
//! modules: a framed serial protocol, a command layer, multi-packet
//! image/template streaming, and a human-in-the-loop workflow engine
//! (enroll, search, match) built on top of them.

mod commands;
mod config;
mod datastream;
mod error;
mod image;
mod protocol;
mod sensor;
mod session;
#[cfg(test)]
mod test_support;
mod workflow;

pub use commands::{CharBuffer, SearchResult, SysParams};
pub use config::{DriverConfig, DEFAULT_BAUD, DEFAULT_TIMEOUT_MS};
pub use error::{ConfigError, DriverError, Result, SensorError, TransportError};
pub use image::{PixelImage, COLS, ROWS};
pub use sensor::{AsyncSensor, Sensor};
pub use workflow::{Activity, ActivityResult, EnrollBundle, HumanActionListener, NullListener};

/// Install a `tracing` subscriber reading `RUST_LOG` (default `info`).
/// The driver itself only ever emits events — applications embedding
/// it are free to install their own subscriber instead of calling
/// this.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
