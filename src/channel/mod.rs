//! Named transform channels
//!
//! A [`Channel`] ties one [`TransformEngine`] to its bindings, its job on the
//! shared worker pool and its published output streams. Channels are owned by
//! a [`ChannelRegistry`] and live as long as it does.
//!
//! # Calculation cycle
//!
//! Each trigger queues the channel's job. The worker then:
//!
//! 1. pulls pending samples and parameters from input bindings and from
//!    values staged directly on the channel
//! 2. runs window → plan → transform on the engine
//! 3. publishes fresh snapshots and notifies the [`ScanNotifier`]
//! 4. updates the execution counter, duration and validity flag
//!
//! Spectrum values are republished every successful cycle. The frequency
//! scale and the window shape are republished only when they changed or
//! were never published. A binding attached after a stream was published
//! is offered the current snapshot right away.
//!
//! Published buffers are `Arc<[f64]>` snapshots that are never written after
//! handoff, so readers may keep them while the next cycle runs.

pub mod binding;
pub mod registry;

pub use binding::{Binding, LinkSpec};
pub use registry::ChannelRegistry;

use crate::analysis::{PhaseTimer, TransformEngine, WindowType};
use crate::error::Result;
use crate::scheduler::{Calculation, Job, QueueOutcome, WorkerPool};
use crate::types::{ChannelStatus, OutputFrame, OutputKind, ScanKind, SignalType};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::{Duration, Instant};

const PREPARE_THRESHOLD: Duration = Duration::from_millis(5);
const REPLAN_THRESHOLD: Duration = Duration::from_millis(100);
const EXECUTE_THRESHOLD: Duration = Duration::from_millis(3);
const PUBLISH_THRESHOLD: Duration = Duration::from_millis(1);

/// Receives "new data" notifications for downstream consumers
#[cfg_attr(test, mockall::automock)]
pub trait ScanNotifier: Send + Sync {
    /// `channel` republished the streams of scan group `scan`
    fn notify(&self, channel: &str, scan: ScanKind);
}

/// Notifier that only traces
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl ScanNotifier for LogNotifier {
    fn notify(&self, channel: &str, scan: ScanKind) {
        tracing::trace!("{}: {:?} scan requested", channel, scan);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Values set directly on a channel, applied at the next calculation
#[derive(Debug, Default)]
struct Staged {
    samples: Option<Vec<f64>>,
    sample_rate: Option<f64>,
    window: Option<WindowType>,
}

/// Bindings attached to a channel. The collaborator layer owns them.
#[derive(Debug, Default)]
struct Links {
    trigger_src: Option<Weak<Binding>>,
    inputs: Vec<Weak<Binding>>,
    outputs: Vec<Weak<Binding>>,
}

#[derive(Debug, Default)]
struct OutputStream {
    latest: Mutex<Option<OutputFrame>>,
    required_size: AtomicUsize,
    consumers: AtomicUsize,
}

/// A named, independently triggered transform unit
pub struct Channel {
    name: String,
    engine: Mutex<TransformEngine>,
    staged: Mutex<Staged>,
    links: RwLock<Links>,
    streams: [OutputStream; OutputKind::COUNT],
    job: Arc<Job>,
    notifier: Arc<dyn ScanNotifier>,

    calc_count: AtomicU64,
    valid: AtomicBool,
    last_duration_ns: AtomicU64,
    last_trigger: Mutex<Option<DateTime<Utc>>>,
    /// Timer of the cycle in progress, if any
    cycle_timer: Mutex<Option<PhaseTimer>>,
    done: Condvar,
    done_lock: Mutex<()>,
}

impl Channel {
    pub(crate) fn new(
        name: impl Into<String>,
        pool: &WorkerPool,
        notifier: Arc<dyn ScanNotifier>,
    ) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|weak: &Weak<Channel>| {
            let target: Weak<dyn Calculation> = weak.clone();
            Channel {
                job: pool.create_job(name.clone(), target),
                name,
                engine: Mutex::new(TransformEngine::new()),
                staged: Mutex::new(Staged::default()),
                links: RwLock::new(Links::default()),
                streams: std::array::from_fn(|_| OutputStream::default()),
                notifier,
                calc_count: AtomicU64::new(0),
                valid: AtomicBool::new(false),
                last_duration_ns: AtomicU64::new(0),
                last_trigger: Mutex::new(None),
                cycle_timer: Mutex::new(None),
                done: Condvar::new(),
                done_lock: Mutex::new(()),
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a calculation. Never blocks; a pending run absorbs the request.
    pub fn trigger(&self) -> Result<QueueOutcome> {
        *lock(&self.last_trigger) = Some(Utc::now());
        let outcome = self.job.queue()?;
        tracing::trace!("Trigger for {}: {:?}", self.name, outcome);
        Ok(outcome)
    }

    /// Stage a new input; the channel takes ownership of the samples
    pub fn set_input(&self, samples: Vec<f64>) {
        lock(&self.staged).samples = Some(samples);
    }

    /// Stage a new sample rate in Hz
    pub fn set_sample_rate(&self, fsamp: f64) {
        lock(&self.staged).sample_rate = Some(fsamp);
    }

    /// Stage a new window type
    pub fn set_window_type(&self, window: WindowType) {
        lock(&self.staged).window = Some(window);
    }

    /// Record that a consumer of `kind` needs at least `size` elements.
    ///
    /// Published buffers of that stream are zero padded up to the largest
    /// size ever declared. Nothing is recomputed.
    pub fn set_required_output_size(&self, kind: OutputKind, size: usize) {
        self.streams[kind.index()]
            .required_size
            .fetch_max(size, Ordering::AcqRel);
    }

    pub fn required_output_size(&self, kind: OutputKind) -> usize {
        self.streams[kind.index()].required_size.load(Ordering::Acquire)
    }

    /// Latest published snapshot of a stream
    pub fn output(&self, kind: OutputKind) -> Option<OutputFrame> {
        lock(&self.streams[kind.index()].latest).clone()
    }

    /// Number of completed calculation cycles, successful or not
    pub fn calc_count(&self) -> u64 {
        self.calc_count.load(Ordering::Acquire)
    }

    /// Whether the last calculation completed
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Duration of the last calculation
    pub fn last_duration(&self) -> Duration {
        Duration::from_nanos(self.last_duration_ns.load(Ordering::Acquire))
    }

    pub fn last_trigger(&self) -> Option<DateTime<Utc>> {
        *lock(&self.last_trigger)
    }

    pub fn job(&self) -> &Arc<Job> {
        &self.job
    }

    /// Block until at least `count` cycles completed or `timeout` passed.
    /// Returns whether the count was reached.
    pub fn wait_for_count(&self, count: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = lock(&self.done_lock);
        while self.calc_count() < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = match self.done.wait_timeout(guard, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }

    /// Summary of configuration and counters
    pub fn status(&self) -> ChannelStatus {
        let (input_size, window, sample_rate) = {
            let engine = lock(&self.engine);
            (engine.ntime(), engine.window_type(), engine.sample_rate())
        };
        let links = self.links.read().unwrap_or_else(PoisonError::into_inner);
        ChannelStatus {
            name: self.name.clone(),
            calc_count: self.calc_count(),
            valid: self.is_valid(),
            last_duration_secs: self.last_duration().as_secs_f64(),
            last_trigger: self.last_trigger(),
            input_size,
            window,
            sample_rate,
            has_trigger: links
                .trigger_src
                .as_ref()
                .is_some_and(|t| t.strong_count() > 0),
            inputs: links.inputs.iter().filter(|b| b.strong_count() > 0).count(),
            outputs: links.outputs.iter().filter(|b| b.strong_count() > 0).count(),
        }
    }

    /// Attach a new binding of `signal` to this channel.
    ///
    /// The first live binding attached with `trigger` set becomes the
    /// channel's trigger source; later ones are plain bindings.
    pub fn attach(self: &Arc<Self>, signal: SignalType, trigger: bool) -> Arc<Binding> {
        let mut links = self.links.write().unwrap_or_else(PoisonError::into_inner);
        let has_trigger = links
            .trigger_src
            .as_ref()
            .is_some_and(|t| t.strong_count() > 0);
        let is_trigger = trigger && !has_trigger;

        let binding = Arc::new(Binding::new(Arc::clone(self), signal, is_trigger));
        if is_trigger {
            links.trigger_src = Some(Arc::downgrade(&binding));
            tracing::debug!("{} binding will trigger channel '{}'", signal, self.name);
        }

        if signal.is_input() {
            links.inputs.retain(|b| b.strong_count() > 0);
            links.inputs.push(Arc::downgrade(&binding));
        } else {
            links.outputs.retain(|b| b.strong_count() > 0);
            links.outputs.push(Arc::downgrade(&binding));
            if let Some(kind) = signal.output_kind() {
                self.streams[kind.index()]
                    .consumers
                    .fetch_add(1, Ordering::AcqRel);
                if let Some(frame) = self.output(kind) {
                    binding.offer(frame);
                }
            }
        }

        tracing::debug!("Connected {} to channel '{}'", signal, self.name);
        binding
    }

    pub(crate) fn release_consumer(&self, kind: OutputKind) {
        let _ = self.streams[kind.index()].consumers.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |n| n.checked_sub(1),
        );
    }

    fn consumers(&self, kind: OutputKind) -> usize {
        self.streams[kind.index()].consumers.load(Ordering::Acquire)
    }

    fn input_bindings(&self) -> Vec<Arc<Binding>> {
        let links = self.links.read().unwrap_or_else(PoisonError::into_inner);
        links.inputs.iter().filter_map(Weak::upgrade).collect()
    }

    fn output_bindings(&self, kind: OutputKind) -> Vec<Arc<Binding>> {
        let links = self.links.read().unwrap_or_else(PoisonError::into_inner);
        links
            .outputs
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|b| b.signal().output_kind() == Some(kind))
            .collect()
    }

    fn pull_inputs(&self, engine: &mut TransformEngine) -> Result<()> {
        for binding in self.input_bindings() {
            match binding.signal() {
                SignalType::InputReal => {
                    if let Some(samples) = binding.take_samples() {
                        engine.set_input(samples)?;
                    }
                }
                SignalType::SetSampleFreq => {
                    if let Some(fsamp) = binding.sample_rate() {
                        engine.set_sample_rate(fsamp);
                    }
                }
                SignalType::SetWindowType => {
                    if let Some(window) = binding.window_type() {
                        engine.set_window_type(window);
                    }
                }
                _ => {}
            }
        }

        let staged = std::mem::take(&mut *lock(&self.staged));
        if let Some(fsamp) = staged.sample_rate {
            engine.set_sample_rate(fsamp);
        }
        if let Some(window) = staged.window {
            engine.set_window_type(window);
        }
        if let Some(samples) = staged.samples {
            engine.set_input(samples)?;
        }
        Ok(())
    }

    fn run_cycle(
        &self,
        engine: &mut TransformEngine,
        timer: &mut PhaseTimer,
    ) -> Result<Vec<ScanKind>> {
        self.pull_inputs(engine)?;

        let window_changed = engine.apply_window();
        timer.maybe_snap("calculate() prepare", PREPARE_THRESHOLD);

        let fscale_changed = engine.rebuild_plan()?;
        timer.maybe_snap("calculate() replan", REPLAN_THRESHOLD);

        engine.transform()?;
        timer.maybe_snap("calculate() execute", EXECUTE_THRESHOLD);

        let scans = self.publish(engine, window_changed, fscale_changed);
        timer.maybe_snap("calculate() post-proc", PUBLISH_THRESHOLD);
        Ok(scans)
    }

    fn publish(
        &self,
        engine: &TransformEngine,
        window_changed: bool,
        fscale_changed: bool,
    ) -> Vec<ScanKind> {
        let timestamp = self.last_trigger();
        let spectrum = engine.output();
        let mut published = vec![
            self.publish_stream(OutputKind::Real, spectrum.iter().map(|c| c.re), timestamp),
            self.publish_stream(OutputKind::Imag, spectrum.iter().map(|c| c.im), timestamp),
        ];

        if self.consumers(OutputKind::Magnitude) > 0 || self.consumers(OutputKind::Phase) > 0 {
            published.push(self.publish_stream(
                OutputKind::Magnitude,
                spectrum.iter().map(|c| 20.0 * c.norm().log10()),
                timestamp,
            ));
            published.push(self.publish_stream(
                OutputKind::Phase,
                spectrum.iter().map(|c| c.im.atan2(c.re)),
                timestamp,
            ));
        }

        if fscale_changed || self.output(OutputKind::FrequencyScale).is_none() {
            published.push(self.publish_stream(
                OutputKind::FrequencyScale,
                engine.frequency_scale().iter().copied(),
                timestamp,
            ));
        }
        if window_changed || self.output(OutputKind::Window).is_none() {
            published.push(self.publish_stream(
                OutputKind::Window,
                engine.window().iter().copied(),
                timestamp,
            ));
        }

        // Streams of one scan group are published back to back
        published.dedup();
        published
    }

    fn publish_stream(
        &self,
        kind: OutputKind,
        values: impl ExactSizeIterator<Item = f64>,
        timestamp: Option<DateTime<Utc>>,
    ) -> ScanKind {
        let valid_len = values.len();
        let size = valid_len.max(self.required_output_size(kind));
        let mut buffer = Vec::with_capacity(size);
        buffer.extend(values);
        buffer.resize(size, 0.0);

        let frame = OutputFrame {
            data: buffer.into(),
            valid_len,
            timestamp,
        };
        *lock(&self.streams[kind.index()].latest) = Some(frame.clone());
        for binding in self.output_bindings(kind) {
            binding.offer(frame.clone());
        }
        kind.scan_kind()
    }

    /// Close the cycle in progress. Does nothing if none is open.
    fn finish_cycle(&self, valid: bool) {
        let Some(timer) = lock(&self.cycle_timer).take() else {
            return;
        };
        let nanos = u64::try_from(timer.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.last_duration_ns.store(nanos, Ordering::Release);
        self.valid.store(valid, Ordering::Release);

        let _guard = lock(&self.done_lock);
        self.calc_count.fetch_add(1, Ordering::AcqRel);
        self.done.notify_all();
    }
}

impl Calculation for Channel {
    fn calculate(&self) {
        let mut timer = PhaseTimer::start();
        *lock(&self.cycle_timer) = Some(timer.clone());
        let result = {
            let mut engine = lock(&self.engine);
            self.run_cycle(&mut engine, &mut timer)
        };

        match result {
            Ok(scans) => {
                for scan in scans {
                    self.notifier.notify(&self.name, scan);
                }
                self.finish_cycle(true);
            }
            Err(e) => {
                tracing::warn!("Calculation for channel '{}' failed: {}", self.name, e);
                self.finish_cycle(false);
            }
        }
    }

    fn calculation_panicked(&self) {
        lock(&self.engine).reset_plan();
        self.finish_cycle(false);
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("calc_count", &self.calc_count())
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::Sequence;

    fn pool() -> WorkerPool {
        WorkerPool::new(2).unwrap()
    }

    fn run_once(channel: &Arc<Channel>) {
        let next = channel.calc_count() + 1;
        channel.trigger().unwrap();
        assert!(channel.wait_for_count(next, Duration::from_secs(5)));
    }

    #[test]
    fn test_four_sample_channel() {
        let pool = pool();
        let channel = Channel::new("A1", &pool, Arc::new(LogNotifier));
        channel.set_sample_rate(8.0);
        channel.set_window_type(WindowType::None);
        channel.set_input(vec![1.0, 2.0, 3.0, 4.0]);
        run_once(&channel);

        assert!(channel.is_valid());
        assert_eq!(channel.calc_count(), 1);
        let real = channel.output(OutputKind::Real).unwrap();
        let imag = channel.output(OutputKind::Imag).unwrap();
        assert_eq!(real.values().len(), 3);
        assert!((real.values()[0] - 10.0).abs() < 1e-12);
        assert!((real.values()[1] + 2.0).abs() < 1e-12);
        assert!((imag.values()[1] - 2.0).abs() < 1e-12);
        assert_eq!(
            channel.output(OutputKind::FrequencyScale).unwrap().values(),
            &[0.0, 2.0, 4.0]
        );
        assert_eq!(
            channel.output(OutputKind::Window).unwrap().values(),
            &[1.0; 4]
        );
        assert!(channel.output(OutputKind::Magnitude).is_none());
        assert!(channel.last_trigger().is_some());
    }

    #[test]
    fn test_failed_cycle_counts_and_invalidates() {
        let pool = pool();
        let channel = Channel::new("empty", &pool, Arc::new(LogNotifier));
        run_once(&channel);
        assert_eq!(channel.calc_count(), 1);
        assert!(!channel.is_valid());
        assert!(channel.output(OutputKind::Real).is_none());

        channel.set_input(Vec::new());
        run_once(&channel);
        assert_eq!(channel.calc_count(), 2);
        assert!(!channel.is_valid());

        channel.set_input(vec![1.0; 8]);
        run_once(&channel);
        assert!(channel.is_valid());
    }

    #[test]
    fn test_outputs_padded_to_required_size() {
        let pool = pool();
        let channel = Channel::new("pad", &pool, Arc::new(LogNotifier));
        channel.set_required_output_size(OutputKind::Real, 10);
        channel.set_required_output_size(OutputKind::Real, 6);
        assert_eq!(channel.required_output_size(OutputKind::Real), 10);

        channel.set_input(vec![1.0; 8]);
        run_once(&channel);
        let real = channel.output(OutputKind::Real).unwrap();
        assert_eq!(real.data.len(), 10);
        assert_eq!(real.valid_len, 5);
        assert_eq!(&real.data[5..], &[0.0; 5]);
    }

    #[test]
    fn test_snapshots_survive_next_cycle() {
        let pool = pool();
        let channel = Channel::new("snap", &pool, Arc::new(LogNotifier));
        channel.set_input(vec![1.0, 0.0, 0.0, 0.0]);
        run_once(&channel);
        let first = channel.output(OutputKind::Real).unwrap();

        channel.set_input(vec![2.0, 0.0, 0.0, 0.0]);
        run_once(&channel);
        let second = channel.output(OutputKind::Real).unwrap();

        assert_eq!(first.values(), &[1.0, 1.0, 1.0]);
        assert_eq!(second.values(), &[2.0, 2.0, 2.0]);
        assert!(!Arc::ptr_eq(&first.data, &second.data));
    }

    #[test]
    fn test_scan_notifications_follow_changes() {
        let mut notifier = MockScanNotifier::new();
        let mut seq = Sequence::new();
        notifier
            .expect_notify()
            .withf(|channel, scan| channel == "N1" && *scan == ScanKind::Value)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        notifier
            .expect_notify()
            .withf(|channel, scan| channel == "N1" && *scan == ScanKind::Scale)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        notifier
            .expect_notify()
            .withf(|channel, scan| channel == "N1" && *scan == ScanKind::Window)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        notifier
            .expect_notify()
            .withf(|channel, scan| channel == "N1" && *scan == ScanKind::Value)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let pool = pool();
        let channel = Channel::new("N1", &pool, Arc::new(notifier));
        channel.set_input(vec![1.0; 16]);
        run_once(&channel);
        let scale = channel.output(OutputKind::FrequencyScale).unwrap();

        channel.set_input(vec![2.0; 16]);
        run_once(&channel);
        let scale_again = channel.output(OutputKind::FrequencyScale).unwrap();
        assert!(Arc::ptr_eq(&scale.data, &scale_again.data));
    }

    #[test]
    fn test_magnitude_and_phase_need_consumers() {
        let pool = pool();
        let channel = Channel::new("M1", &pool, Arc::new(LogNotifier));
        let magn = channel.attach(SignalType::OutputMagn, false);

        channel.set_input(vec![0.0, 1.0, 0.0, 0.0]);
        run_once(&channel);
        let m = channel.output(OutputKind::Magnitude).unwrap();
        let p = channel.output(OutputKind::Phase).unwrap();
        assert!(m.values().iter().all(|v| v.abs() < 1e-9));
        assert!((p.values()[1] + std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        drop(magn);
        assert_eq!(channel.consumers(OutputKind::Magnitude), 0);
    }

    #[test]
    fn test_status_reports_configuration() {
        let pool = pool();
        let channel = Channel::new("S1", &pool, Arc::new(LogNotifier));
        let _input = channel.attach(SignalType::InputReal, true);
        let _real = channel.attach(SignalType::OutputReal, false);
        channel.set_sample_rate(1000.0);
        channel.set_window_type(WindowType::Hann);
        channel.set_input(vec![1.0; 64]);
        run_once(&channel);

        let status = channel.status();
        assert_eq!(status.name, "S1");
        assert_eq!(status.calc_count, 1);
        assert!(status.valid);
        assert_eq!(status.input_size, 64);
        assert_eq!(status.window, WindowType::Hann);
        assert_eq!(status.sample_rate, 1000.0);
        assert!(status.has_trigger);
        assert_eq!((status.inputs, status.outputs), (1, 1));
    }

    #[test]
    fn test_late_output_binding_gets_current_frame() {
        let pool = pool();
        let channel = Channel::new("L1", &pool, Arc::new(LogNotifier));
        channel.set_sample_rate(8.0);
        channel.set_window_type(WindowType::None);
        channel.set_input(vec![1.0, 2.0, 3.0, 4.0]);
        run_once(&channel);

        let fscale = channel.attach(SignalType::OutputFscale, false);
        let window = channel.attach(SignalType::OutputWindow, false);
        channel.set_input(vec![4.0, 3.0, 2.0, 1.0]);
        run_once(&channel);

        let frame = fscale.read_output(3).unwrap().unwrap();
        assert_eq!(frame.values(), &[0.0, 2.0, 4.0]);
        let frame = window.read_output(4).unwrap().unwrap();
        assert_eq!(frame.values(), &[1.0; 4]);
        assert!(fscale.read_output(3).unwrap().is_none());
    }

    #[test]
    fn test_sample_rate_change_renotifies_scale_and_window() {
        let mut notifier = MockScanNotifier::new();
        let mut seq = Sequence::new();
        for _ in 0..2 {
            for expected in [ScanKind::Value, ScanKind::Scale, ScanKind::Window] {
                notifier
                    .expect_notify()
                    .withf(move |channel, scan| channel == "R1" && *scan == expected)
                    .times(1)
                    .in_sequence(&mut seq)
                    .return_const(());
            }
        }

        let pool = pool();
        let channel = Channel::new("R1", &pool, Arc::new(notifier));
        channel.set_sample_rate(16.0);
        channel.set_input(vec![1.0; 16]);
        run_once(&channel);
        let window = channel.output(OutputKind::Window).unwrap();

        channel.set_sample_rate(32.0);
        run_once(&channel);
        assert!(channel.is_valid());
        assert_eq!(channel.output(OutputKind::FrequencyScale).unwrap().values()[1], 2.0);
        let window_again = channel.output(OutputKind::Window).unwrap();
        assert!(!Arc::ptr_eq(&window.data, &window_again.data));
        assert_eq!(window.values(), window_again.values());
    }

    /// Panics on its first notification only
    #[derive(Default)]
    struct FailingNotifier {
        fired: AtomicBool,
    }

    impl ScanNotifier for FailingNotifier {
        fn notify(&self, channel: &str, _scan: ScanKind) {
            if !self.fired.swap(true, Ordering::SeqCst) {
                panic!("scan handler for {} failed", channel);
            }
        }
    }

    #[test]
    fn test_panicking_cycle_counts_once_and_recovers() {
        let pool = pool();
        let channel = Channel::new("P1", &pool, Arc::new(FailingNotifier::default()));
        channel.set_input(vec![1.0; 8]);
        run_once(&channel);

        assert!(wait_until_idle(&channel));
        assert_eq!(channel.calc_count(), 1);
        assert!(!channel.is_valid());
        assert!(channel.last_duration() > Duration::ZERO);
        assert!(!lock(&channel.engine).has_plan());

        run_once(&channel);
        assert!(wait_until_idle(&channel));
        assert_eq!(channel.calc_count(), 2);
        assert!(channel.is_valid());
        assert!(lock(&channel.engine).has_plan());
        assert_eq!(channel.job().runs(), 2);
    }

    fn wait_until_idle(channel: &Channel) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if channel.job().state() == crate::scheduler::JobState::Idle {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    }
}
