//! aotf-dummy - Simulated AOTF controller for testing
//!
//! This crate provides an in-memory controller that speaks the AOTF
//! command/response protocol. It answers board queries, records DDS
//! settings per channel and can be told to misbehave, which makes it
//! useful for testing and development without real hardware.

use std::collections::{BTreeMap, VecDeque};

use aotf_core::protocol::{COMMAND_TERMINATOR, COMPLETION_MARKER, LINE_SEPARATOR};
use aotf_core::{Handle, Transport, AMPLITUDE_MAX, CHANNEL_COUNT};

/// Configuration for the simulated controller
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Reply to `BoardId Serial`
    pub serial: String,
    /// Reply to `BoardId Date`
    pub date: String,
    /// Number of controllers that can be opened (indices `0..controllers`)
    pub controllers: u32,
    /// Maximum bytes delivered per read
    pub chunk_size: usize,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            serial: "DUMMY-0001".to_string(),
            date: "2024-01-01".to_string(),
            controllers: 1,
            chunk_size: 16,
        }
    }
}

/// Failures the simulated controller can be told to produce
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyFaults {
    /// `open` returns no handle
    pub refuse_open: bool,
    /// `close` reports failure
    pub refuse_close: bool,
    /// `write` reports failure
    pub fail_write: bool,
    /// `read` reports failure
    pub fail_read: bool,
    /// Commands are accepted but never answered
    pub silent: bool,
}

/// Frequency setting of one DDS channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Frequency {
    /// Set in MHz
    Mhz(f64),
    /// Set in Hz (`!` prefix)
    Hz(f64),
}

impl Frequency {
    /// Frequency in MHz, whatever unit it was set in
    pub fn as_mhz(self) -> f64 {
        match self {
            Self::Mhz(f) => f,
            Self::Hz(f) => f / 1e6,
        }
    }
}

/// State of one DDS channel
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DdsChannel {
    /// Last frequency set
    pub frequency: Option<Frequency>,
    /// Last amplitude set
    pub amplitude: Option<u16>,
}

/// Simulated AOTF controller
pub struct DummyController {
    config: DummyConfig,
    faults: DummyFaults,
    /// Open handles (raw value to controller index)
    handles: BTreeMap<usize, u32>,
    outbox: VecDeque<u8>,
    written: Vec<String>,
    channels: [DdsChannel; CHANNEL_COUNT as usize],
}

impl DummyController {
    /// Create a simulated controller with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        Self {
            config,
            faults: DummyFaults::default(),
            handles: BTreeMap::new(),
            outbox: VecDeque::new(),
            written: Vec::new(),
            channels: [DdsChannel::default(); CHANNEL_COUNT as usize],
        }
    }

    /// Create a simulated controller with default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Get the active faults
    pub fn faults(&self) -> &DummyFaults {
        &self.faults
    }

    /// Get the active faults for modification
    pub fn faults_mut(&mut self) -> &mut DummyFaults {
        &mut self.faults
    }

    /// Every chunk written so far, terminator included
    pub fn written(&self) -> &[String] {
        &self.written
    }

    /// DDS state of a channel
    pub fn channel(&self, channel: u8) -> Option<&DdsChannel> {
        self.channels.get(usize::from(channel))
    }

    /// Number of handles currently open
    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    fn handle_raw(index: u32) -> usize {
        0x100 + index as usize
    }

    fn reply(&mut self, command: &str, lines: &[&str]) {
        if self.faults.silent {
            return;
        }
        let mut text = String::from(command);
        text.push_str(LINE_SEPARATOR);
        for line in lines {
            text.push_str(line);
            text.push_str(LINE_SEPARATOR);
        }
        text.push(COMPLETION_MARKER);
        text.push(' ');
        self.outbox.extend(text.as_bytes());
    }

    fn execute(&mut self, command: &str) {
        let words: Vec<&str> = command.split_whitespace().collect();
        match words.as_slice() {
            ["BoardId", "Serial"] => {
                let serial = self.config.serial.clone();
                self.reply(command, &[serial.as_str()]);
            }
            ["BoardId", "Date"] => {
                let date = self.config.date.clone();
                self.reply(command, &[date.as_str()]);
            }
            ["dds", "reset"] => {
                log::debug!("dummy: dds reset");
                self.channels = [DdsChannel::default(); CHANNEL_COUNT as usize];
            }
            ["Dds", "Frequency", channel, value] => {
                let frequency = match value.strip_prefix('!') {
                    Some(hz) => hz.parse().ok().map(Frequency::Hz),
                    None => value.parse().ok().map(Frequency::Mhz),
                };
                match (self.dds_channel(channel), frequency) {
                    (Some(ch), Some(f)) => ch.frequency = Some(f),
                    _ => log::warn!("dummy: malformed command {:?}", command),
                }
            }
            ["Dds", "Amplitude", channel, value] => {
                let amplitude = value.parse::<u16>().ok().filter(|&a| a <= AMPLITUDE_MAX);
                match (self.dds_channel(channel), amplitude) {
                    (Some(ch), Some(a)) => ch.amplitude = Some(a),
                    _ => log::warn!("dummy: malformed command {:?}", command),
                }
            }
            _ => {
                log::debug!("dummy: unknown command {:?}", command);
                self.reply(command, &["Unknown command"]);
            }
        }
    }

    fn dds_channel(&mut self, channel: &str) -> Option<&mut DdsChannel> {
        let channel: usize = channel.parse().ok()?;
        self.channels.get_mut(channel)
    }
}

impl Default for DummyController {
    fn default() -> Self {
        Self::new_default()
    }
}

impl Transport for DummyController {
    fn open(&mut self, index: u32) -> Option<Handle> {
        if self.faults.refuse_open || index >= self.config.controllers {
            return None;
        }
        let raw = Self::handle_raw(index);
        self.handles.insert(raw, index);
        log::debug!("dummy: controller {} opened", index);
        Handle::from_raw(raw)
    }

    fn close(&mut self, handle: Handle) -> bool {
        if self.faults.refuse_close {
            return false;
        }
        let closed = self.handles.remove(&handle.raw()).is_some();
        if self.handles.is_empty() {
            self.outbox.clear();
        }
        closed
    }

    fn write(&mut self, handle: Handle, data: &[u8]) -> bool {
        if self.faults.fail_write || !self.handles.contains_key(&handle.raw()) {
            return false;
        }

        let text = String::from_utf8_lossy(data).into_owned();
        log::debug!("dummy: write {:?}", text);
        self.written.push(text.clone());

        match text.strip_suffix(COMMAND_TERMINATOR) {
            Some(command) => self.execute(command),
            None => log::warn!("dummy: unterminated command {:?}", text),
        }
        true
    }

    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Option<usize> {
        if self.faults.fail_read || !self.handles.contains_key(&handle.raw()) {
            return None;
        }
        let n = buf.len().min(self.config.chunk_size).min(self.outbox.len());
        for (dst, src) in buf.iter_mut().zip(self.outbox.drain(..n)) {
            *dst = src;
        }
        Some(n)
    }

    fn is_data_available(&mut self, handle: Handle) -> bool {
        self.handles.contains_key(&handle.raw()) && !self.outbox.is_empty()
    }

    fn instance(&mut self, handle: Handle) -> u32 {
        self.handles.get(&handle.raw()).copied().unwrap_or(0)
    }
}
