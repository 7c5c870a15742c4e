//! Per-channel real-to-complex transform engine
//!
//! The engine is a small lazy state machine driven by two dirty flags (see
//! [`DirtyFlags`]). Setters only record what changed; the work happens in the
//! three protocol steps, which must run in this order every cycle:
//!
//! 1. [`TransformEngine::apply_window`] - regenerate the window if stale and
//!    window freshly delivered samples exactly once
//! 2. [`TransformEngine::rebuild_plan`] - rebuild the plan and frequency scale
//!    if stale, under the process-wide planner lock
//! 3. [`TransformEngine::transform`] - execute the plan, lock free
//!
//! Plans come from one shared [`RealFftPlanner`]. Planning is serialized
//! behind [`FFT_PLANNER`]; executing an existing plan is safe from any number
//! of threads at once.

use crate::analysis::window::WindowType;
use crate::error::{Result, SpectraError};
use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

/// Global lock around the FFT planner
static FFT_PLANNER: LazyLock<Mutex<RealFftPlanner<f64>>> =
    LazyLock::new(|| Mutex::new(RealFftPlanner::new()));

fn lock_planner() -> MutexGuard<'static, RealFftPlanner<f64>> {
    // the planner is only a plan cache, a panic elsewhere cannot corrupt it
    FFT_PLANNER.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A prepared real-to-complex transform for one input length
#[derive(Clone)]
pub struct Plan {
    r2c: Arc<dyn RealToComplex<f64>>,
}

impl Plan {
    /// Build and measure a plan for `len` samples.
    ///
    /// The fresh plan is run once over junk buffers of its own. The live
    /// input is never handed to the planner.
    fn build(len: usize) -> Result<Self> {
        let mut planner = lock_planner();
        let r2c = planner.plan_fft_forward(len);

        let mut junk = r2c.make_input_vec();
        let mut spectrum = r2c.make_output_vec();
        let mut scratch = r2c.make_scratch_vec();
        r2c.process_with_scratch(&mut junk, &mut spectrum, &mut scratch)
            .map_err(|e| SpectraError::Plan(format!("measuring {} point plan: {}", len, e)))?;

        Ok(Self { r2c })
    }

    /// Input length this plan was built for
    pub(crate) fn len(&self) -> usize {
        self.r2c.len()
    }
}

impl std::fmt::Debug for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plan").field("len", &self.len()).finish()
    }
}

/// Lazy recomputation state of a [`TransformEngine`]
///
/// Transitions:
/// - `redo_plan` is set by construction, by a changed sample rate or window
///   type, and by an input whose length differs from the previous one. Only a
///   successful [`TransformEngine::rebuild_plan`] clears it.
/// - `newval` is set by construction and by every accepted input. Only
///   [`TransformEngine::apply_window`] clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyFlags {
    /// Plan, window and frequency scale are stale
    pub redo_plan: bool,
    /// The current input has not been windowed yet
    pub newval: bool,
}

impl Default for DirtyFlags {
    fn default() -> Self {
        Self {
            redo_plan: true,
            newval: true,
        }
    }
}

/// Windowed real-to-complex FFT with amortized planning
#[derive(Debug, Default)]
pub struct TransformEngine {
    window_type: WindowType,
    window: Vec<f64>,
    /// Window regenerated since the last replan request
    window_current: bool,

    input: Vec<f64>,
    /// Copy of the input consumed by the transform kernel
    work: Vec<f64>,
    output: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,

    input_len: usize,
    ntime: usize,
    nfreq: usize,

    plan: Option<Plan>,

    fsamp: f64,
    fscale: Vec<f64>,

    dirty: DirtyFlags,
}

impl TransformEngine {
    /// Create an engine with no input, boxcar window and zero sample rate
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sample rate in Hz. Returns whether it changed.
    pub fn set_sample_rate(&mut self, fsamp: f64) -> bool {
        let changed = self.fsamp != fsamp;
        if changed {
            self.fsamp = fsamp;
            self.request_replan();
        }
        changed
    }

    /// Set the window type. Returns whether it changed.
    pub fn set_window_type(&mut self, window_type: WindowType) -> bool {
        let changed = self.window_type != window_type;
        if changed {
            self.window_type = window_type;
            self.request_replan();
        }
        changed
    }

    /// Take ownership of a new time-domain input.
    ///
    /// An empty buffer is rejected and leaves the engine untouched.
    pub fn set_input(&mut self, input: Vec<f64>) -> Result<()> {
        if input.is_empty() {
            return Err(SpectraError::EmptyInput);
        }

        self.ntime = input.len();
        self.nfreq = self.ntime / 2 + 1;
        self.input = input;
        self.dirty.newval = true;

        if self.input_len != self.ntime {
            self.request_replan();
            self.input_len = self.ntime;
        }
        Ok(())
    }

    /// Regenerate the window if a replan is pending, then window a fresh
    /// input in place.
    ///
    /// The window is regenerated once per replan request. Returns whether it
    /// was regenerated.
    pub fn apply_window(&mut self) -> bool {
        let window_changed = self.dirty.redo_plan && !self.window_current;
        if window_changed {
            self.window = self.window_type.generate(self.ntime);
            self.window_current = true;
        }

        if self.dirty.newval {
            for (x, w) in self.input.iter_mut().zip(&self.window) {
                *x *= *w;
            }
            self.dirty.newval = false;
        }

        window_changed
    }

    /// Rebuild plan and frequency scale if stale.
    ///
    /// Returns whether the frequency scale was regenerated. On error the plan
    /// stays unset and the next call tries again.
    pub fn rebuild_plan(&mut self) -> Result<bool> {
        if !self.dirty.redo_plan {
            return Ok(false);
        }
        if self.ntime == 0 {
            self.window_current = false;
            return Err(SpectraError::EmptyInput);
        }

        self.release_plan();
        self.output.clear();
        self.output.resize(self.nfreq, Complex::default());

        let mult = self.fsamp / self.ntime as f64;
        self.fscale.clear();
        self.fscale.extend((0..self.nfreq).map(|i| i as f64 * mult));

        let plan = Plan::build(self.ntime).inspect_err(|_| self.window_current = false)?;
        self.work = plan.r2c.make_input_vec();
        self.scratch = plan.r2c.make_scratch_vec();
        self.plan = Some(plan);

        self.dirty.redo_plan = false;
        Ok(true)
    }

    /// Execute the plan on the current (windowed) input.
    pub fn transform(&mut self) -> Result<()> {
        let plan = self.plan.as_ref().ok_or(SpectraError::PlanMissing)?;
        if plan.len() != self.ntime {
            return Err(SpectraError::PlanLengthMismatch {
                planned: plan.len(),
                actual: self.ntime,
            });
        }

        self.work.clear();
        self.work.extend_from_slice(&self.input);
        plan.r2c
            .process_with_scratch(&mut self.work, &mut self.output, &mut self.scratch)
            .map_err(SpectraError::from_fft_error)
    }

    /// Drop the current plan so the next cycle rebuilds it
    pub fn reset_plan(&mut self) {
        self.release_plan();
        self.request_replan();
    }

    fn request_replan(&mut self) {
        self.dirty.redo_plan = true;
        self.window_current = false;
    }

    fn release_plan(&mut self) {
        if let Some(plan) = self.plan.take() {
            let _planner = lock_planner();
            drop(plan);
        }
    }

    /// Number of time-domain samples
    pub fn ntime(&self) -> usize {
        self.ntime
    }

    /// Number of frequency bins, `ntime / 2 + 1`
    pub fn nfreq(&self) -> usize {
        self.nfreq
    }

    pub fn sample_rate(&self) -> f64 {
        self.fsamp
    }

    pub fn window_type(&self) -> WindowType {
        self.window_type
    }

    /// Current input; windowed once `apply_window` has run
    pub fn input(&self) -> &[f64] {
        &self.input
    }

    pub fn window(&self) -> &[f64] {
        &self.window
    }

    pub fn output(&self) -> &[Complex<f64>] {
        &self.output
    }

    pub fn frequency_scale(&self) -> &[f64] {
        &self.fscale
    }

    pub fn has_plan(&self) -> bool {
        self.plan.is_some()
    }

    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    /// Plan, window or frequency scale must be rebuilt
    pub fn needs_replan(&self) -> bool {
        self.dirty.redo_plan
    }

    /// The current input has not been windowed yet
    pub fn has_new_value(&self) -> bool {
        self.dirty.newval
    }
}
