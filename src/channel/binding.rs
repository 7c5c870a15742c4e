//! Connectors between external records and channels
//!
//! A record is attached to a channel through a link string:
//!
//! ```text
//! <channel> <signal> [trigger=<Y|N>]
//! A1 input-real trigger=Y
//! ```
//!
//! Whitespace separates tokens; a backslash makes the next character literal.

use crate::analysis::WindowType;
use crate::channel::Channel;
use crate::error::{Result, SpectraError};
use crate::types::{OutputFrame, OutputKind, SignalType};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const YES_CHARS: &str = "YyTt1";
const NO_CHARS: &str = "NnFf0";

/// Parsed form of a link string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSpec {
    pub channel: String,
    pub signal: SignalType,
    pub trigger: bool,
}

impl LinkSpec {
    pub fn parse(link: &str) -> Result<Self> {
        let invalid = |message: &str| SpectraError::InvalidLink {
            link: link.to_string(),
            message: message.to_string(),
        };

        let tokens = split_escaped(link).map_err(|m| invalid(m))?;
        let mut tokens = tokens.into_iter();
        let channel = tokens.next().ok_or_else(|| invalid("missing channel name"))?;
        let signal = tokens.next().ok_or_else(|| invalid("missing signal type"))?;
        let signal = SignalType::from_str(&signal).map_err(|e| invalid(&e.to_string()))?;

        let mut trigger = false;
        for option in tokens {
            let (key, value) = option
                .split_once('=')
                .ok_or_else(|| invalid(&format!("expected option=value, got '{}'", option)))?;
            match key {
                "trigger" => trigger = parse_flag(value).ok_or_else(|| {
                    invalid(&format!("bad trigger value '{}'", value))
                })?,
                _ => return Err(invalid(&format!("unknown option '{}'", key))),
            }
        }

        Ok(Self {
            channel,
            signal,
            trigger,
        })
    }
}

impl FromStr for LinkSpec {
    type Err = SpectraError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for LinkSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} trigger={}",
            escape(&self.channel),
            self.signal,
            if self.trigger { 'Y' } else { 'N' }
        )
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    let mut chars = value.chars();
    let c = chars.next()?;
    if YES_CHARS.contains(c) {
        Some(true)
    } else if NO_CHARS.contains(c) {
        Some(false)
    } else {
        None
    }
}

/// Split on whitespace, honouring backslash escapes
pub fn split_escaped(input: &str) -> std::result::Result<Vec<String>, &'static str> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let next = chars.next().ok_or("dangling escape")?;
                current.push(next);
                in_token = true;
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn escape(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    for c in token.chars() {
        if c == '\\' || c.is_whitespace() {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One record attached to one channel
pub struct Binding {
    signal: SignalType,
    channel: Arc<Channel>,
    is_trigger: bool,
    samples: Mutex<Option<Vec<f64>>>,
    sample_rate: Mutex<Option<f64>>,
    window: Mutex<Option<WindowType>>,
    next_output: Mutex<Option<OutputFrame>>,
}

impl Binding {
    pub(crate) fn new(channel: Arc<Channel>, signal: SignalType, is_trigger: bool) -> Self {
        Self {
            signal,
            channel,
            is_trigger,
            samples: Mutex::new(None),
            sample_rate: Mutex::new(None),
            window: Mutex::new(None),
            next_output: Mutex::new(None),
        }
    }

    pub fn signal(&self) -> SignalType {
        self.signal
    }

    pub fn channel(&self) -> &Arc<Channel> {
        &self.channel
    }

    /// Whether writes through this binding trigger the channel
    pub fn is_trigger(&self) -> bool {
        self.is_trigger
    }

    fn require_signal(&self, signal: SignalType, operation: &'static str) -> Result<()> {
        if self.signal == signal {
            Ok(())
        } else {
            Err(SpectraError::SignalMismatch {
                signal: self.signal.name(),
                operation,
            })
        }
    }

    fn written(&self) -> Result<()> {
        if self.is_trigger {
            self.channel.trigger()?;
        }
        Ok(())
    }

    /// Copy samples into the pending slot of an `input-real` binding
    pub fn write_samples(&self, samples: &[f64]) -> Result<()> {
        self.require_signal(SignalType::InputReal, "write_samples")?;
        *lock(&self.samples) = Some(samples.to_vec());
        self.written()
    }

    pub fn write_sample_rate(&self, fsamp: f64) -> Result<()> {
        self.require_signal(SignalType::SetSampleFreq, "write_sample_rate")?;
        *lock(&self.sample_rate) = Some(fsamp);
        self.written()
    }

    pub fn write_window(&self, window: WindowType) -> Result<()> {
        self.require_signal(SignalType::SetWindowType, "write_window")?;
        *lock(&self.window) = Some(window);
        self.written()
    }

    /// Write a raw menu index; unknown indices are rejected
    pub fn write_window_raw(&self, raw: u32) -> Result<()> {
        self.require_signal(SignalType::SetWindowType, "write_window")?;
        let window = WindowType::try_from(raw)?;
        self.write_window(window)
    }

    /// Declare how many elements this consumer holds
    pub fn declare_size(&self, nelm: usize) -> Result<()> {
        let kind = self.output_kind("declare_size")?;
        self.channel.set_required_output_size(kind, nelm);
        Ok(())
    }

    /// Take the newest snapshot offered since the last read.
    ///
    /// The returned frame's `valid_len` is capped at `nelm`.
    pub fn read_output(&self, nelm: usize) -> Result<Option<OutputFrame>> {
        self.output_kind("read_output")?;
        if !self.channel.is_valid() {
            return Err(SpectraError::StaleOutput(self.channel.name().to_string()));
        }
        Ok(lock(&self.next_output).take().map(|mut frame| {
            frame.valid_len = frame.valid_len.min(nelm);
            frame
        }))
    }

    pub fn read_execution_time(&self) -> Result<Duration> {
        self.require_signal(SignalType::ExecutionTime, "read_execution_time")?;
        Ok(self.channel.last_duration())
    }

    fn output_kind(&self, operation: &'static str) -> Result<OutputKind> {
        self.signal
            .output_kind()
            .ok_or(SpectraError::SignalMismatch {
                signal: self.signal.name(),
                operation,
            })
    }

    pub(crate) fn take_samples(&self) -> Option<Vec<f64>> {
        lock(&self.samples).take()
    }

    pub(crate) fn sample_rate(&self) -> Option<f64> {
        *lock(&self.sample_rate)
    }

    pub(crate) fn window_type(&self) -> Option<WindowType> {
        *lock(&self.window)
    }

    pub(crate) fn offer(&self, frame: OutputFrame) {
        *lock(&self.next_output) = Some(frame);
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        if let Some(kind) = self.signal.output_kind() {
            self.channel.release_consumer(kind);
        }
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("channel", &self.channel.name())
            .field("signal", &self.signal)
            .field("is_trigger", &self.is_trigger)
            .finish()
    }
}
