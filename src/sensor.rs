/// Public facade: a blocking [`Sensor`] for synchronous callers and an
/// [`AsyncSensor`] that submits each workflow to a blocking-task pool
/// and hands back an [`Activity`]. A `Mutex` serializes all serial port
/// access, with the actual I/O pushed onto `tokio::task::spawn_blocking`
/// for the async facade, which returns a one-shot `Activity` instead of
/// an awaited future since a workflow may run far longer than any
/// single request.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serialport::SerialPort;

use crate::commands::{CommandChannel, SearchResult, SysParams};
use crate::config::DriverConfig;
use crate::datastream;
use crate::error::{DriverError, Result, SensorError};
use crate::image::PixelImage;
use crate::session::Session;
use crate::workflow::{
    self, Activity, EnrollBundle, HumanActionListener,
};

fn open_port(config: &DriverConfig) -> Result<Box<dyn SerialPort>> {
    Ok(serialport::new(&config.serial_port, config.baud)
        .timeout(Duration::from_millis(config.default_timeout_ms))
        .open()
        .map_err(crate::error::TransportError::SerialPort)?)
}

/// Session state shared by both facades: the handshaken session plus
/// the configuration knobs workflows need (timeout, settle behaviour).
struct SensorState {
    session: Session<Box<dyn SerialPort>>,
    config: DriverConfig,
}

impl SensorState {
    fn channel(&mut self) -> &mut CommandChannel<Box<dyn SerialPort>> {
        &mut self.session.channel
    }

    fn params(&self) -> SysParams {
        self.session.params
    }
}

/// A blocking, synchronous connection to one sensor. All methods block
/// the calling thread for the duration of the workflow; only one
/// workflow runs at a time per instance.
pub struct Sensor {
    state: Mutex<SensorState>,
}

impl Sensor {
    /// Open the serial port at `config.baud` and run the handshake.
    pub fn open(config: DriverConfig) -> Result<Self> {
        config.validate()?;
        let port = open_port(&config)?;
        let session = Session::handshake(port, &config)?;
        Ok(Self {
            state: Mutex::new(SensorState { session, config }),
        })
    }

    pub fn close(self) {
        let state = self.state.into_inner().unwrap();
        state.session.close();
    }

    pub fn template_count(&self) -> Result<u16> {
        self.state.lock().unwrap().channel().template_count()
    }

    pub fn empty_library(&self) -> Result<()> {
        self.state.lock().unwrap().channel().empty_library()
    }

    pub fn delete_model(&self, slot: u16) -> Result<()> {
        self.delete_models(slot, 1)
    }

    pub fn delete_models(&self, slot: u16, count: u16) -> Result<()> {
        self.state.lock().unwrap().channel().delete_char(slot, count)
    }

    pub fn search(
        &self,
        listener: &mut dyn HumanActionListener,
    ) -> Result<Option<SearchResult>> {
        let mut state = self.state.lock().unwrap();
        let capacity = state.params().capacity;
        workflow::search(state.channel(), listener, capacity, &|| false)
    }

    pub fn match_slot(
        &self,
        slot: u16,
        listener: &mut dyn HumanActionListener,
    ) -> Result<i32> {
        let mut state = self.state.lock().unwrap();
        workflow::match_slot(state.channel(), slot, listener, &|| false)
    }

    pub fn enroll(&self, slot: u16, listener: &mut dyn HumanActionListener) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let settle = state.config.settle_between_scans;
        let timeout = state.config.default_timeout_ms;
        workflow::enroll(state.channel(), slot, listener, settle, timeout, &|| false)
    }

    pub fn enroll_and_get_data(
        &self,
        slot: u16,
        listener: &mut dyn HumanActionListener,
    ) -> Result<EnrollBundle> {
        let mut state = self.state.lock().unwrap();
        workflow::enroll_with_data(state.channel(), slot, listener, &|| false)
    }

    pub fn download_image(
        &self,
        listener: &mut dyn HumanActionListener,
    ) -> Result<PixelImage> {
        let mut state = self.state.lock().unwrap();
        workflow::capture_and_download_image(state.channel(), listener, &|| false)
    }

    pub fn upload_and_search(&self, image: &PixelImage) -> Result<Option<SearchResult>> {
        let mut state = self.state.lock().unwrap();
        let data_package_length = state.params().data_package_length as usize;
        let capacity = state.params().capacity;
        workflow::upload_and_search(state.channel(), image, data_package_length, capacity)
    }

    pub fn enroll_from_template(&self, slot: u16, features: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let data_package_length = state.params().data_package_length as usize;
        workflow::enroll_from_template(state.channel(), slot, features, data_package_length)
    }

    /// `uploadModel`: upload `data` into char buffer 2 and read it back,
    /// reporting success iff the echo matches. Doubles latency; kept as
    /// its own entry point rather than folded into `enroll_from_template`,
    /// which uploads a template with no read-back.
    pub fn upload_model(&self, data: &[u8]) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let data_package_length = state.params().data_package_length as usize;
        datastream::upload_model_with_verify(state.channel(), data_package_length, data)
    }

    pub fn enroll_from_scans(
        &self,
        slot: u16,
        scan1: &PixelImage,
        scan2: &PixelImage,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let data_package_length = state.params().data_package_length as usize;
        let settle = state.config.settle_between_scans;
        let timeout = state.config.default_timeout_ms;
        workflow::enroll_from_scans(
            state.channel(),
            slot,
            scan1,
            scan2,
            data_package_length,
            settle,
            timeout,
        )
    }
}

fn join_panicked() -> Arc<DriverError> {
    Arc::new(DriverError::Sensor(SensorError::Cancelled))
}

/// Submit one workflow run to the blocking-task pool behind
/// `serial_lock`. `work` receives a cancellation check closure; the
/// tokio mutex ensures no second workflow starts I/O until this one's
/// blocking closure returns — async entry points submit work but never
/// add concurrency against the sensor itself.
fn spawn_workflow<T, F>(serial_lock: Arc<tokio::sync::Mutex<()>>, work: F) -> Activity<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn Fn() -> bool) -> Result<T> + Send + 'static,
{
    let (activity, completer) = crate::workflow::new_activity::<T>();
    let cancel_probe = activity.clone();
    tokio::spawn(async move {
        let _permit = serial_lock.lock().await;
        let result = tokio::task::spawn_blocking(move || {
            work(&|| cancel_probe.cancellation_requested())
        })
        .await;
        match result {
            Ok(r) => completer.complete(r.map_err(Arc::new)),
            Err(_join_error) => completer.complete(Err(join_panicked())),
        }
    });
    activity
}

/// An async connection to one sensor. Every method returns immediately
/// with an [`Activity`]; the workflow itself runs on a blocking task
/// once `serial_lock` admits it.
pub struct AsyncSensor {
    serial_lock: Arc<tokio::sync::Mutex<()>>,
    state: Arc<Mutex<SensorState>>,
}

impl AsyncSensor {
    /// Open the serial port and run the handshake on a blocking task.
    pub async fn open(config: DriverConfig) -> Result<Self> {
        config.validate()?;
        let session = tokio::task::spawn_blocking(move || {
            let port = open_port(&config)?;
            let session = Session::handshake(port, &config)?;
            Ok::<_, DriverError>(SensorState { session, config })
        })
        .await
        .map_err(|_| DriverError::Sensor(SensorError::Cancelled))??;

        Ok(Self {
            serial_lock: Arc::new(tokio::sync::Mutex::new(())),
            state: Arc::new(Mutex::new(session)),
        })
    }

    pub fn template_count(&self) -> Activity<u16> {
        let state = self.state.clone();
        spawn_workflow(self.serial_lock.clone(), move |_| {
            state.lock().unwrap().channel().template_count()
        })
    }

    pub fn empty_library(&self) -> Activity<()> {
        let state = self.state.clone();
        spawn_workflow(self.serial_lock.clone(), move |_| {
            state.lock().unwrap().channel().empty_library()
        })
    }

    pub fn delete_models(&self, slot: u16, count: u16) -> Activity<()> {
        let state = self.state.clone();
        spawn_workflow(self.serial_lock.clone(), move |_| {
            state.lock().unwrap().channel().delete_char(slot, count)
        })
    }

    pub fn search_activity(
        &self,
        mut listener: impl HumanActionListener + 'static,
    ) -> Activity<Option<SearchResult>> {
        let state = self.state.clone();
        spawn_workflow(self.serial_lock.clone(), move |cancelled| {
            let mut guard = state.lock().unwrap();
            let capacity = guard.params().capacity;
            workflow::search(guard.channel(), &mut listener, capacity, cancelled)
        })
    }

    pub fn match_activity(
        &self,
        slot: u16,
        mut listener: impl HumanActionListener + 'static,
    ) -> Activity<i32> {
        let state = self.state.clone();
        spawn_workflow(self.serial_lock.clone(), move |cancelled| {
            workflow::match_slot(state.lock().unwrap().channel(), slot, &mut listener, cancelled)
        })
    }

    pub fn enroll(
        &self,
        slot: u16,
        mut listener: impl HumanActionListener + 'static,
    ) -> Activity<()> {
        let state = self.state.clone();
        spawn_workflow(self.serial_lock.clone(), move |cancelled| {
            let mut guard = state.lock().unwrap();
            let settle = guard.config.settle_between_scans;
            let timeout = guard.config.default_timeout_ms;
            workflow::enroll(guard.channel(), slot, &mut listener, settle, timeout, cancelled)
        })
    }

    pub fn enroll_and_get_data(
        &self,
        slot: u16,
        mut listener: impl HumanActionListener + 'static,
    ) -> Activity<EnrollBundle> {
        let state = self.state.clone();
        spawn_workflow(self.serial_lock.clone(), move |cancelled| {
            workflow::enroll_with_data(state.lock().unwrap().channel(), slot, &mut listener, cancelled)
        })
    }

    pub fn download_image(
        &self,
        mut listener: impl HumanActionListener + 'static,
    ) -> Activity<PixelImage> {
        let state = self.state.clone();
        spawn_workflow(self.serial_lock.clone(), move |cancelled| {
            workflow::capture_and_download_image(state.lock().unwrap().channel(), &mut listener, cancelled)
        })
    }

    pub fn upload_model(&self, data: Vec<u8>) -> Activity<bool> {
        let state = self.state.clone();
        spawn_workflow(self.serial_lock.clone(), move |_| {
            let mut guard = state.lock().unwrap();
            let data_package_length = guard.params().data_package_length as usize;
            datastream::upload_model_with_verify(guard.channel(), data_package_length, &data)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_state_exposes_cached_params_without_a_round_trip() {
        // Compile-time/shape check only — constructing a real SensorState
        // needs an open serial port; the workflow engine's own tests
        // cover the interesting behaviour against `FakeSensor`.
        fn _assert_fields(_: fn(&SensorState) -> SysParams) {}
        _assert_fields(SensorState::params);
    }
}
