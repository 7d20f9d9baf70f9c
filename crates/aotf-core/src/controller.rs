//! AOTF controller engine
//!
//! [`Aotf`] owns one controller handle and turns typed requests into device
//! commands:
//!
//! | Operation                     | Command                        | Reply  |
//! |-------------------------------|--------------------------------|--------|
//! | [`Aotf::serial`]              | `BoardId Serial`               | query  |
//! | [`Aotf::date`]                | `BoardId Date`                 | query  |
//! | [`Aotf::reset`]               | `dds reset`                    | none   |
//! | [`Aotf::set_acoustic_frequency_mhz`] | `Dds Frequency <ch> <f>` | none   |
//! | [`Aotf::set_acoustic_frequency_hz`]  | `Dds Frequency <ch> !<f>`| none   |
//! | [`Aotf::set_amplitude_int`]   | `Dds Amplitude <ch> <a>`       | none   |
//!
//! Setters are fire-and-forget: nothing is read back. Callers that need
//! confirmation issue a separate query.

use core::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::calibration::{Calibration, CalibrationTable};
use crate::error::{Error, Result};
use crate::protocol::{
    frame_command, PendingExchange, Response, DEFAULT_POLL_INTERVAL, DEFAULT_READ_LEN,
    DEFAULT_TIMEOUT,
};
use crate::transport::{Handle, Transport};
use crate::{AMPLITUDE_MAX, CHANNEL_COUNT};

/// Engine tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AotfConfig {
    /// Wall-clock budget of one query
    pub timeout: Duration,
    /// Sleep between polls while no data is available
    pub poll_interval: Duration,
    /// Maximum bytes requested per transport read
    pub read_len: usize,
}

impl Default for AotfConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            read_len: DEFAULT_READ_LEN,
        }
    }
}

impl AotfConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the query timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the poll interval
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set the per-read length (at least one byte)
    pub fn with_read_len(mut self, read_len: usize) -> Self {
        self.read_len = read_len.max(1);
        self
    }
}

/// Why a request was deliberately not sent to the controller
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The calibration id is not in the table
    UnknownCalibration(String),
    /// No calibration is active
    NoCalibration,
    /// The wavelength lies outside the active calibration's domain
    OutOfDomain {
        /// Requested wavelength
        wavelength: f64,
        /// Domain lower bound
        min: f64,
        /// Domain upper bound
        max: f64,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCalibration(id) => write!(f, "unknown calibration '{}'", id),
            Self::NoCalibration => write!(f, "no calibration selected"),
            Self::OutOfDomain {
                wavelength,
                min,
                max,
            } => write!(
                f,
                "wavelength {} outside calibration domain [{}, {}]",
                wavelength, min, max
            ),
        }
    }
}

/// Result of a request that may be ignored without it being an error
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Outcome<T = ()> {
    /// The request took effect
    Applied(T),
    /// The request was ignored
    Skipped(SkipReason),
}

impl<T> Outcome<T> {
    /// Whether the request took effect
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// Value of an applied request
    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(value) => Some(value),
            Self::Skipped(_) => None,
        }
    }
}

/// AOTF controller
///
/// Holds at most one device handle. Every operation except [`Aotf::open`]
/// and calibration selection fails with [`Error::NotOpen`] while no handle is
/// held. Not reentrant: one owner drives one controller.
pub struct Aotf<T: Transport> {
    transport: T,
    handle: Option<Handle>,
    calibrations: Arc<CalibrationTable>,
    active: Option<String>,
    config: AotfConfig,
}

impl<T: Transport> Aotf<T> {
    /// Create an engine with the default configuration
    pub fn new(transport: T, calibrations: Arc<CalibrationTable>) -> Self {
        Self::with_config(transport, calibrations, AotfConfig::default())
    }

    /// Create an engine with a custom configuration
    pub fn with_config(
        transport: T,
        calibrations: Arc<CalibrationTable>,
        config: AotfConfig,
    ) -> Self {
        Self {
            transport,
            handle: None,
            calibrations,
            active: None,
            config,
        }
    }

    /// Engine configuration
    pub fn config(&self) -> &AotfConfig {
        &self.config
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // ---- Handle lifecycle ----

    /// Open the controller with the given enumeration index
    ///
    /// A handle that is already held is closed first.
    pub fn open(&mut self, index: u32) -> Result<()> {
        if self.handle.is_some() {
            log::debug!("aotf: closing current handle before reopening");
            self.close()?;
        }

        let handle = self
            .transport
            .open(index)
            .ok_or(Error::DeviceOpen { index })?;
        log::info!("aotf: opened controller {} (handle {})", index, handle);
        self.handle = Some(handle);
        Ok(())
    }

    /// Close the controller
    ///
    /// If the transport refuses, the handle is kept so the close can be
    /// retried.
    pub fn close(&mut self) -> Result<()> {
        let handle = self.require_handle()?;
        if !self.transport.close(handle) {
            return Err(Error::DeviceClose);
        }
        self.handle = None;
        log::info!("aotf: closed handle {}", handle);
        Ok(())
    }

    /// Whether a handle is held
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Controller index reported by the driver
    pub fn controller_index(&mut self) -> Result<u32> {
        let handle = self.require_handle()?;
        Ok(self.transport.instance(handle))
    }

    fn require_handle(&self) -> Result<Handle> {
        self.handle.ok_or(Error::NotOpen)
    }

    // ---- Command/response ----

    /// Send a command without waiting for a reply
    pub fn write(&mut self, command: &str) -> Result<()> {
        let handle = self.require_handle()?;
        self.send(handle, command)
    }

    /// Send a command and wait for its framed reply
    ///
    /// Returns [`Response::TimedOut`] if no complete reply arrives within
    /// the configured timeout. Transport failures are errors.
    pub fn query(&mut self, command: &str) -> Result<Response> {
        let handle = self.require_handle()?;
        self.send(handle, command)?;

        let mut exchange = PendingExchange::new(command, self.config.timeout);
        let mut buf = vec![0u8; self.config.read_len];
        loop {
            let n = if self.transport.is_data_available(handle) {
                self.transport
                    .read(handle, &mut buf)
                    .ok_or(Error::TransportRead)?
                    .min(buf.len())
            } else {
                0
            };

            if n > 0 {
                exchange.push(&buf[..n]);
                if let Some(payload) = exchange.payload() {
                    log::debug!(
                        "aotf: <- {:?} after {} ms",
                        payload,
                        exchange.elapsed().as_millis()
                    );
                    return Ok(Response::Completed(payload));
                }
            } else {
                // Nothing pending, or the driver claimed data but delivered none
                thread::sleep(self.config.poll_interval);
            }

            if exchange.is_expired() {
                log::warn!(
                    "aotf: no complete reply to {:?} within {:?} (received {:?})",
                    command,
                    self.config.timeout,
                    exchange.buffer()
                );
                return Ok(Response::TimedOut);
            }
        }
    }

    fn send(&mut self, handle: Handle, command: &str) -> Result<()> {
        log::debug!("aotf: -> {:?}", command);
        if !self.transport.write(handle, &frame_command(command)) {
            return Err(Error::TransportWrite);
        }
        Ok(())
    }

    // ---- Board information ----

    /// Board serial number
    pub fn serial(&mut self) -> Result<Response> {
        self.query("BoardId Serial")
    }

    /// Board manufacturing date
    pub fn date(&mut self) -> Result<Response> {
        self.query("BoardId Date")
    }

    // ---- DDS setters ----

    /// Reset the direct digital synthesizer
    pub fn reset(&mut self) -> Result<()> {
        self.write("dds reset")
    }

    /// Set the acoustic frequency in Hz
    pub fn set_acoustic_frequency(&mut self, frequency: f64, channel: i32) -> Result<()> {
        self.set_acoustic_frequency_hz(frequency, channel)
    }

    /// Set the acoustic frequency in Hz
    pub fn set_acoustic_frequency_hz(&mut self, frequency: f64, channel: i32) -> Result<()> {
        self.require_handle()?;
        let channel = check_channel(channel)?;
        check_frequency(frequency)?;
        self.write(&format!(
            "Dds Frequency {} !{}",
            channel,
            format_value(frequency)
        ))
    }

    /// Set the acoustic frequency in MHz (the device default unit)
    pub fn set_acoustic_frequency_mhz(&mut self, frequency: f64, channel: i32) -> Result<()> {
        self.require_handle()?;
        let channel = check_channel(channel)?;
        check_frequency(frequency)?;
        self.write(&format!(
            "Dds Frequency {} {}",
            channel,
            format_value(frequency)
        ))
    }

    /// Set the amplitude as a device-native value in `[0, AMPLITUDE_MAX]`
    pub fn set_amplitude_int(&mut self, amplitude: i32, channel: i32) -> Result<()> {
        self.require_handle()?;
        let channel = check_channel(channel)?;
        if !(0..=i32::from(AMPLITUDE_MAX)).contains(&amplitude) {
            return Err(Error::InvalidAmplitude {
                value: f64::from(amplitude),
            });
        }
        self.write(&format!("Dds Amplitude {} {}", channel, amplitude))
    }

    /// Set the amplitude in percent of full scale
    ///
    /// The device value is `AMPLITUDE_MAX * percent / 100`, truncated toward
    /// zero; 50% gives 8191.
    pub fn set_amplitude_percent(&mut self, amplitude: f64, channel: i32) -> Result<()> {
        self.require_handle()?;
        check_channel(channel)?;
        let value = percent_to_int(amplitude)?;
        self.set_amplitude_int(value, channel)
    }

    /// Set the amplitude in percent of full scale
    pub fn set_amplitude(&mut self, amplitude: f64, channel: i32) -> Result<()> {
        self.set_amplitude_percent(amplitude, channel)
    }

    // ---- Calibration ----

    /// Calibration table this engine was built with
    pub fn calibrations(&self) -> &CalibrationTable {
        &self.calibrations
    }

    /// Active calibration, if any
    pub fn calibration(&self) -> Option<&Calibration> {
        self.active
            .as_deref()
            .and_then(|id| self.calibrations.get(id))
    }

    /// Make the calibration `id` active
    ///
    /// An id missing from the table is ignored and the current selection is
    /// kept, so an operator typo never leaves the engine without calibration.
    pub fn select_calibration(&mut self, id: &str) -> Outcome {
        if !self.calibrations.contains(id) {
            log::warn!("aotf: ignoring unknown calibration '{}'", id);
            return Outcome::Skipped(SkipReason::UnknownCalibration(id.to_string()));
        }
        log::debug!("aotf: calibration '{}' selected", id);
        self.active = Some(id.to_string());
        Outcome::Applied(())
    }

    /// Deselect the active calibration
    pub fn clear_calibration(&mut self) {
        self.active = None;
    }

    /// Tune a channel to a wavelength through the active calibration
    ///
    /// Without an active calibration, or for a wavelength outside its
    /// domain, nothing is sent: an extrapolated frequency never reaches the
    /// hardware. On success the frequency sent (MHz) is returned.
    pub fn set_wavelength(&mut self, wavelength: f64, channel: i32) -> Result<Outcome<f64>> {
        self.require_handle()?;
        check_channel(channel)?;

        let lookup = match self.calibration() {
            None => Err(SkipReason::NoCalibration),
            Some(cal) => cal
                .frequency_mhz(wavelength)
                .ok_or(SkipReason::OutOfDomain {
                    wavelength,
                    min: cal.domain.min,
                    max: cal.domain.max,
                }),
        };

        match lookup {
            Ok(frequency) => {
                self.set_acoustic_frequency_mhz(frequency, channel)?;
                Ok(Outcome::Applied(frequency))
            }
            Err(reason) => {
                log::warn!("aotf: wavelength request skipped: {}", reason);
                Ok(Outcome::Skipped(reason))
            }
        }
    }
}

impl<T: Transport> Drop for Aotf<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if self.transport.close(handle) {
                log::info!("aotf: closed handle {} on drop", handle);
            } else {
                log::warn!("aotf: failed to close handle {} on drop", handle);
            }
        }
    }
}

/// Validate a channel argument
fn check_channel(channel: i32) -> Result<u8> {
    u8::try_from(channel)
        .ok()
        .filter(|&c| c < CHANNEL_COUNT)
        .ok_or(Error::InvalidChannel { channel })
}

/// Reject frequencies the firmware cannot parse
fn check_frequency(frequency: f64) -> Result<()> {
    if !frequency.is_finite() {
        return Err(Error::InvalidFrequency { value: frequency });
    }
    Ok(())
}

/// Convert a percentage to a device-native amplitude
fn percent_to_int(percent: f64) -> Result<i32> {
    let value = f64::from(AMPLITUDE_MAX) * percent / 100.0;
    if !(0.0..=f64::from(AMPLITUDE_MAX)).contains(&value) {
        return Err(Error::InvalidAmplitude { value });
    }
    Ok(value.trunc() as i32)
}

/// Format a number the way the controller firmware expects
///
/// Shortest round-trip decimal in plain notation, keeping a fractional part
/// on integral values (`200.0`, not `200`; `0.00005`, not `5e-5`).
fn format_value(value: f64) -> String {
    let mut text = value.to_string();
    if !text.contains('.') {
        text.push_str(".0");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{Domain, Polynomial};
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};
    use std::rc::Rc;
    use std::time::Instant;

    /// Shared state of the scripted transport
    #[derive(Default)]
    struct Script {
        replies: HashMap<String, Vec<Vec<u8>>>,
        pending: VecDeque<Vec<u8>>,
        written: Vec<String>,
        refuse_open: bool,
        refuse_close: bool,
        fail_write: bool,
        fail_read: bool,
        stall: bool,
        reads: usize,
        closed: usize,
    }

    /// Transport that answers known commands with canned chunks
    #[derive(Clone, Default)]
    struct ScriptTransport(Rc<RefCell<Script>>);

    impl ScriptTransport {
        fn reply(&self, command: &str, chunks: &[&str]) {
            self.0.borrow_mut().replies.insert(
                command.to_string(),
                chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
            );
        }

        fn written(&self) -> Vec<String> {
            self.0.borrow().written.clone()
        }
    }

    impl Transport for ScriptTransport {
        fn open(&mut self, _index: u32) -> Option<Handle> {
            if self.0.borrow().refuse_open {
                None
            } else {
                Handle::from_raw(0x1000)
            }
        }

        fn close(&mut self, _handle: Handle) -> bool {
            let mut s = self.0.borrow_mut();
            if s.refuse_close {
                return false;
            }
            s.closed += 1;
            true
        }

        fn write(&mut self, _handle: Handle, data: &[u8]) -> bool {
            let mut s = self.0.borrow_mut();
            if s.fail_write {
                return false;
            }
            let text = String::from_utf8_lossy(data).into_owned();
            let command = text.trim_end_matches('\r').to_string();
            if let Some(chunks) = s.replies.get(&command).cloned() {
                s.pending.extend(chunks);
            }
            s.written.push(text);
            true
        }

        fn read(&mut self, _handle: Handle, buf: &mut [u8]) -> Option<usize> {
            let mut s = self.0.borrow_mut();
            if s.fail_read {
                return None;
            }
            s.reads += 1;
            if s.stall {
                return Some(0);
            }
            let mut chunk = s.pending.pop_front().unwrap_or_default();
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                s.pending.push_front(chunk.split_off(n));
            }
            Some(n)
        }

        fn is_data_available(&mut self, _handle: Handle) -> bool {
            let s = self.0.borrow();
            s.stall || !s.pending.is_empty()
        }

        fn instance(&mut self, _handle: Handle) -> u32 {
            3
        }
    }

    fn identity_table() -> Arc<CalibrationTable> {
        Arc::new(CalibrationTable::from_calibrations([
            Calibration {
                id: "identity".into(),
                polynomial: Polynomial::new(vec![0.0, 1.0]),
                domain: Domain::new(500.0, 600.0).unwrap(),
            },
            Calibration {
                id: "linear".into(),
                polynomial: Polynomial::new(vec![10.0, 0.5]),
                domain: Domain::new(400.0, 800.0).unwrap(),
            },
        ]))
    }

    fn fast_config() -> AotfConfig {
        AotfConfig::new()
            .with_timeout(Duration::from_millis(200))
            .with_poll_interval(Duration::from_millis(10))
    }

    fn opened() -> (Aotf<ScriptTransport>, ScriptTransport) {
        let transport = ScriptTransport::default();
        let mut aotf = Aotf::with_config(transport.clone(), identity_table(), fast_config());
        aotf.open(0).unwrap();
        (aotf, transport)
    }

    #[test]
    fn test_query_strips_echo_and_marker() {
        let (mut aotf, transport) = opened();
        transport.reply("Custom Cmd", &["Custom Cmd\r\ndone\r\n*\r\n"]);
        assert_eq!(
            aotf.query("Custom Cmd").unwrap(),
            Response::Completed("done".to_string())
        );
        assert_eq!(transport.written(), vec!["Custom Cmd\r"]);
    }

    #[test]
    fn test_query_accumulates_chunks() {
        let (mut aotf, transport) = opened();
        transport.reply(
            "BoardId Serial",
            &["Board", "Id Serial\r", "\n2410-", "0042\r\n", "* "],
        );
        assert_eq!(aotf.serial().unwrap().payload(), Some("2410-0042"));
    }

    #[test]
    fn test_query_with_small_reads() {
        let transport = ScriptTransport::default();
        let config = fast_config().with_read_len(3);
        let mut aotf = Aotf::with_config(transport.clone(), identity_table(), config);
        aotf.open(0).unwrap();
        transport.reply("BoardId Date", &["BoardId Date\r\n2019-04-01\r\n*\r\n"]);
        assert_eq!(aotf.date().unwrap().payload(), Some("2019-04-01"));
    }

    #[test]
    fn test_query_times_out_without_data() {
        let (mut aotf, _transport) = opened();
        let start = Instant::now();
        let response = aotf.query("BoardId Serial").unwrap();
        let elapsed = start.elapsed();

        assert_eq!(response, Response::TimedOut);
        let config = *aotf.config();
        assert!(elapsed >= config.timeout);
        // Allow scheduler slack on top of one poll interval
        assert!(elapsed < config.timeout + config.poll_interval + Duration::from_millis(150));
    }

    #[test]
    fn test_query_sleeps_on_empty_reads() {
        let (mut aotf, transport) = opened();
        transport.0.borrow_mut().stall = true;
        assert_eq!(aotf.serial(), Ok(Response::TimedOut));

        // 200 ms timeout at a 10 ms poll interval
        let reads = transport.0.borrow().reads;
        assert!(reads <= 25, "polled {} times", reads);
    }

    #[test]
    fn test_query_times_out_on_wrong_echo() {
        let (mut aotf, transport) = opened();
        transport.reply("BoardId Serial", &["BoardId Date\r\nx\r\n*"]);
        assert!(aotf.serial().unwrap().is_timed_out());
    }

    #[test]
    fn test_empty_reply_is_not_a_timeout() {
        let (mut aotf, transport) = opened();
        transport.reply("BoardId Serial", &["BoardId Serial\r\n*\r\n"]);
        assert_eq!(
            aotf.serial().unwrap(),
            Response::Completed(String::new())
        );
    }

    #[test]
    fn test_channel_validation() {
        for channel in -3..12 {
            let (mut aotf, transport) = opened();
            let result = aotf.set_acoustic_frequency_hz(1.0e6, channel);
            if !(0..8).contains(&channel) {
                assert_eq!(result, Err(Error::InvalidChannel { channel }));
                assert!(transport.written().is_empty());
            } else {
                assert_eq!(result, Ok(()));
                assert_eq!(
                    transport.written(),
                    vec![format!("Dds Frequency {} !1000000.0\r", channel)]
                );
            }
        }
    }

    #[test]
    fn test_frequency_commands() {
        let (mut aotf, transport) = opened();
        aotf.set_acoustic_frequency_mhz(200.0, 3).unwrap();
        aotf.set_acoustic_frequency_mhz(80.125, 7).unwrap();
        aotf.set_acoustic_frequency(75_000_000.5, 0).unwrap();
        assert_eq!(
            transport.written(),
            vec![
                "Dds Frequency 3 200.0\r",
                "Dds Frequency 7 80.125\r",
                "Dds Frequency 0 !75000000.5\r",
            ]
        );
    }

    #[test]
    fn test_frequency_must_be_finite() {
        let (mut aotf, transport) = opened();
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                aotf.set_acoustic_frequency_mhz(value, 0),
                Err(Error::InvalidFrequency { .. })
            ));
            assert!(matches!(
                aotf.set_acoustic_frequency_hz(value, 0),
                Err(Error::InvalidFrequency { .. })
            ));
        }
        assert_eq!(
            aotf.set_acoustic_frequency_mhz(f64::NAN, 8),
            Err(Error::InvalidChannel { channel: 8 })
        );
        assert!(transport.written().is_empty());

        aotf.set_acoustic_frequency_mhz(0.00005, 1).unwrap();
        aotf.set_acoustic_frequency_hz(1.0e21, 1).unwrap();
        assert_eq!(
            transport.written(),
            vec![
                "Dds Frequency 1 0.00005\r",
                "Dds Frequency 1 !1000000000000000000000.0\r",
            ]
        );
    }

    #[test]
    fn test_amplitude_int_domain() {
        let (mut aotf, transport) = opened();
        assert!(matches!(
            aotf.set_amplitude_int(-1, 0),
            Err(Error::InvalidAmplitude { .. })
        ));
        assert!(matches!(
            aotf.set_amplitude_int(16384, 0),
            Err(Error::InvalidAmplitude { .. })
        ));
        assert!(transport.written().is_empty());

        aotf.set_amplitude_int(0, 1).unwrap();
        aotf.set_amplitude_int(16383, 2).unwrap();
        assert_eq!(
            transport.written(),
            vec!["Dds Amplitude 1 0\r", "Dds Amplitude 2 16383\r"]
        );
    }

    #[test]
    fn test_amplitude_percent_truncates() {
        let (mut aotf, transport) = opened();
        aotf.set_amplitude_percent(50.0, 0).unwrap();
        aotf.set_amplitude_percent(100.0, 0).unwrap();
        aotf.set_amplitude(0.0, 0).unwrap();
        aotf.set_amplitude(60.0, 0).unwrap();
        assert_eq!(
            transport.written(),
            vec![
                "Dds Amplitude 0 8191\r",
                "Dds Amplitude 0 16383\r",
                "Dds Amplitude 0 0\r",
                "Dds Amplitude 0 9829\r",
            ]
        );
    }

    #[test]
    fn test_amplitude_percent_rejects_out_of_range() {
        let (mut aotf, transport) = opened();
        for percent in [-0.5, 100.5, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                aotf.set_amplitude_percent(percent, 0),
                Err(Error::InvalidAmplitude { .. })
            ));
        }
        assert_eq!(
            aotf.set_amplitude_percent(50.0, 8),
            Err(Error::InvalidChannel { channel: 8 })
        );
        assert!(transport.written().is_empty());
    }

    #[test]
    fn test_reset_command() {
        let (mut aotf, transport) = opened();
        aotf.reset().unwrap();
        assert_eq!(transport.written(), vec!["dds reset\r"]);
    }

    #[test]
    fn test_wavelength_gated_by_domain() {
        let (mut aotf, transport) = opened();
        assert!(aotf.select_calibration("identity").is_applied());

        assert_eq!(aotf.set_wavelength(550.0, 0), Ok(Outcome::Applied(550.0)));
        assert_eq!(transport.written(), vec!["Dds Frequency 0 550.0\r"]);

        assert_eq!(
            aotf.set_wavelength(700.0, 0),
            Ok(Outcome::Skipped(SkipReason::OutOfDomain {
                wavelength: 700.0,
                min: 500.0,
                max: 600.0,
            }))
        );
        assert_eq!(transport.written().len(), 1);
    }

    #[test]
    fn test_wavelength_domain_bounds_inclusive() {
        let (mut aotf, transport) = opened();
        let _ = aotf.select_calibration("identity");
        assert!(aotf.set_wavelength(500.0, 1).unwrap().is_applied());
        assert!(aotf.set_wavelength(600.0, 1).unwrap().is_applied());
        assert_eq!(transport.written().len(), 2);
    }

    #[test]
    fn test_wavelength_uses_polynomial() {
        let (mut aotf, transport) = opened();
        let _ = aotf.select_calibration("linear");
        assert_eq!(
            aotf.set_wavelength(532.0, 2).unwrap().applied(),
            Some(276.0)
        );
        assert_eq!(transport.written(), vec!["Dds Frequency 2 276.0\r"]);
    }

    #[test]
    fn test_wavelength_without_calibration() {
        let (mut aotf, transport) = opened();
        assert_eq!(
            aotf.set_wavelength(550.0, 0),
            Ok(Outcome::Skipped(SkipReason::NoCalibration))
        );
        assert_eq!(
            aotf.set_wavelength(550.0, 9),
            Err(Error::InvalidChannel { channel: 9 })
        );
        assert!(transport.written().is_empty());
    }

    #[test]
    fn test_unknown_calibration_keeps_selection() {
        let transport = ScriptTransport::default();
        let mut aotf = Aotf::new(transport, identity_table());
        assert!(aotf.calibration().is_none());

        assert_eq!(
            aotf.select_calibration("RF9"),
            Outcome::Skipped(SkipReason::UnknownCalibration("RF9".to_string()))
        );
        assert!(aotf.calibration().is_none());

        assert!(aotf.select_calibration("identity").is_applied());
        assert!(!aotf.select_calibration("RF9").is_applied());
        assert_eq!(aotf.calibration().map(|c| c.id.as_str()), Some("identity"));

        aotf.clear_calibration();
        assert!(aotf.calibration().is_none());
        assert_eq!(aotf.calibrations().len(), 2);
    }

    #[test]
    fn test_operations_require_open_handle() {
        let transport = ScriptTransport::default();
        let mut aotf = Aotf::new(transport.clone(), identity_table());
        let _ = aotf.select_calibration("identity");

        assert_eq!(aotf.close(), Err(Error::NotOpen));
        assert_eq!(aotf.controller_index(), Err(Error::NotOpen));
        assert_eq!(aotf.write("dds reset"), Err(Error::NotOpen));
        assert_eq!(aotf.query("BoardId Serial"), Err(Error::NotOpen));
        assert_eq!(aotf.serial(), Err(Error::NotOpen));
        assert_eq!(aotf.date(), Err(Error::NotOpen));
        assert_eq!(aotf.reset(), Err(Error::NotOpen));
        assert_eq!(aotf.set_acoustic_frequency(1.0, 0), Err(Error::NotOpen));
        assert_eq!(aotf.set_acoustic_frequency_hz(1.0, 0), Err(Error::NotOpen));
        assert_eq!(aotf.set_acoustic_frequency_mhz(1.0, 0), Err(Error::NotOpen));
        assert_eq!(aotf.set_amplitude_int(1, 0), Err(Error::NotOpen));
        assert_eq!(aotf.set_amplitude_percent(1.0, 0), Err(Error::NotOpen));
        assert_eq!(aotf.set_amplitude(1.0, 0), Err(Error::NotOpen));
        assert_eq!(aotf.set_wavelength(550.0, 0), Err(Error::NotOpen));
        assert!(transport.written().is_empty());
    }

    #[test]
    fn test_open_failure() {
        let transport = ScriptTransport::default();
        transport.0.borrow_mut().refuse_open = true;
        let mut aotf = Aotf::new(transport, identity_table());
        assert_eq!(aotf.open(2), Err(Error::DeviceOpen { index: 2 }));
        assert!(!aotf.is_open());
        assert_eq!(aotf.reset(), Err(Error::NotOpen));
    }

    #[test]
    fn test_close_failure_keeps_handle() {
        let (mut aotf, transport) = opened();
        transport.0.borrow_mut().refuse_close = true;
        assert_eq!(aotf.close(), Err(Error::DeviceClose));
        assert!(aotf.is_open());

        transport.0.borrow_mut().refuse_close = false;
        aotf.close().unwrap();
        assert!(!aotf.is_open());
        assert_eq!(aotf.close(), Err(Error::NotOpen));
    }

    #[test]
    fn test_transport_failures() {
        let (mut aotf, transport) = opened();
        transport.0.borrow_mut().fail_write = true;
        assert_eq!(aotf.reset(), Err(Error::TransportWrite));
        assert_eq!(aotf.serial(), Err(Error::TransportWrite));

        transport.0.borrow_mut().fail_write = false;
        transport.0.borrow_mut().fail_read = true;
        transport.reply("BoardId Serial", &["BoardId Serial\r\n1\r\n*"]);
        assert_eq!(aotf.serial(), Err(Error::TransportRead));
    }

    #[test]
    fn test_controller_index() {
        let (mut aotf, _transport) = opened();
        assert_eq!(aotf.controller_index(), Ok(3));
    }

    #[test]
    fn test_reopen_closes_previous_handle() {
        let (mut aotf, transport) = opened();
        aotf.open(1).unwrap();
        assert!(aotf.is_open());
        assert_eq!(transport.0.borrow().closed, 1);
    }

    #[test]
    fn test_drop_closes_handle() {
        let (aotf, transport) = opened();
        drop(aotf);
        assert_eq!(transport.0.borrow().closed, 1);

        let transport = ScriptTransport::default();
        let aotf = Aotf::new(transport.clone(), identity_table());
        drop(aotf);
        assert_eq!(transport.0.borrow().closed, 0);
    }

    #[test]
    fn test_end_to_end() {
        let transport = ScriptTransport::default();
        transport.reply("BoardId Serial", &["BoardId Serial\r\n", "2410-0042\r\n*\r\n"]);
        let mut aotf = Aotf::with_config(transport.clone(), identity_table(), fast_config());

        aotf.open(0).unwrap();
        assert_eq!(aotf.serial().unwrap().payload(), Some("2410-0042"));
        aotf.set_acoustic_frequency_mhz(200.0, 3).unwrap();
        assert_eq!(
            transport.written().last().map(String::as_str),
            Some("Dds Frequency 3 200.0\r")
        );
        aotf.close().unwrap();
        assert_eq!(aotf.serial(), Err(Error::NotOpen));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(200.0), "200.0");
        assert_eq!(format_value(80.125), "80.125");
        assert_eq!(format_value(-1.5), "-1.5");
        assert_eq!(format_value(0.00005), "0.00005");
        assert_eq!(format_value(1.0e21), "1000000000000000000000.0");
        assert_eq!(format_value(75_000_000.5), "75000000.5");
    }

    #[test]
    fn test_percent_to_int() {
        assert_eq!(percent_to_int(50.0), Ok(8191));
        assert_eq!(percent_to_int(100.0), Ok(16383));
        assert_eq!(percent_to_int(0.0), Ok(0));
        assert!(percent_to_int(-0.001).is_err());
    }
}
