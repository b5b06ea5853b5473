//! The sampling loop.
//!
//! One thread, fixed ~5 ms cadence (200 Hz). Each tick: drain raw pointer
//! deltas, run the jump filter and the conditioner, emit the vector to the
//! output sink, publish it to the live feed. The loop is the single
//! authoritative owner of the configuration: every mutation — hotkeys,
//! signals, future UI — arrives as a [`ControlMsg`] on one queue, is
//! validated at the boundary, then published as an `Arc` snapshot and
//! auto-saved to the settings store.

use crate::capture::PointerState;
use crate::conditioner::{Conditioner, StickVector};
use crate::curve::{CurveLut, CurveProfile};
use crate::jump::JumpFilter;
use crate::pad::OutputSink;
use crate::settings::{Axis, AxisSettings, Settings};
use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sampling period: 200 Hz.
pub const TICK: Duration = Duration::from_millis(5);

/// Ticks between debug telemetry lines (500 ms at the 5 ms cadence).
const DEBUG_PRINT_TICKS: u32 = 100;

/// Set by the signal handler on SIGINT/SIGTERM.
pub static QUIT: AtomicBool = AtomicBool::new(false);
/// Set by the signal handler on SIGUSR1 (`mousestick toggle`).
pub static TOGGLE: AtomicBool = AtomicBool::new(false);

/// Configuration mutations. Everything that writes config goes through this
/// queue; there is no second write path.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMsg {
    TogglePause,
    SensitivityUp,
    SensitivityDown,
    SetSensitivity(f32),
    SetDecayRate(f32),
    SetAxis(Axis, AxisSettings),
    SetCurve(CurveProfile),
    Quit,
}

/// Lock-free publication of the latest tick output for any reader
/// (visualization, diagnostics) at whatever rate it likes.
#[derive(Debug, Default)]
pub struct OutputFeed {
    x_bits: AtomicU32,
    y_bits: AtomicU32,
    degraded: AtomicBool,
}

impl OutputFeed {
    fn publish(&self, v: StickVector) {
        self.x_bits.store(v.x.to_bits(), Ordering::Relaxed);
        self.y_bits.store(v.y.to_bits(), Ordering::Relaxed);
    }

    pub fn latest(&self) -> StickVector {
        StickVector {
            x: f32::from_bits(self.x_bits.load(Ordering::Relaxed)),
            y: f32::from_bits(self.y_bits.load(Ordering::Relaxed)),
        }
    }

    fn set_degraded(&self, degraded: bool) {
        self.degraded.store(degraded, Ordering::Relaxed);
    }

    /// True while the output sink is unreachable.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }
}

/// State shared with threads outside the loop: committed config snapshots
/// and the live output feed.
#[derive(Debug)]
pub struct SharedState {
    config: RwLock<Arc<Settings>>,
    pub output: OutputFeed,
}

impl SharedState {
    pub fn new(settings: &Settings) -> Self {
        Self {
            config: RwLock::new(Arc::new(settings.clone())),
            output: OutputFeed::default(),
        }
    }

    /// The most recently committed configuration.
    pub fn config(&self) -> Arc<Settings> {
        self.config.read().clone()
    }
}

pub struct Engine {
    settings: Settings,
    settings_path: PathBuf,
    lut: CurveLut,
    conditioner: Conditioner,
    jump: JumpFilter,
    sink: Box<dyn OutputSink>,
    pointer: Arc<PointerState>,
    shared: Arc<SharedState>,
    rx: Receiver<ControlMsg>,
    paused: bool,
    degraded: bool,
    last_emitted: StickVector,
    debug: bool,
    debug_tick: u32,
    debug_raw: (i64, i64),
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: Settings,
        settings_path: PathBuf,
        sink: Box<dyn OutputSink>,
        pointer: Arc<PointerState>,
        shared: Arc<SharedState>,
        rx: Receiver<ControlMsg>,
        start_paused: bool,
        debug: bool,
    ) -> Self {
        // An invalid stored curve was already swapped for linear during
        // sanitize, so compilation cannot fail here.
        let lut = settings
            .curve
            .compile()
            .unwrap_or_else(|_| CurveLut::linear());
        pointer.set_active(!start_paused);
        Self {
            settings,
            settings_path,
            lut,
            conditioner: Conditioner::new(),
            jump: JumpFilter::new(),
            sink,
            pointer,
            shared,
            rx,
            paused: start_paused,
            degraded: false,
            last_emitted: StickVector::default(),
            debug,
            debug_tick: 0,
            debug_raw: (0, 0),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Drive the loop until quit. Tick pacing uses a monotonic clock with a
    /// precise sleep for the remainder, independent of any other thread.
    pub fn run(&mut self) {
        loop {
            let tick_start = Instant::now();

            if QUIT.load(Ordering::Relaxed) || self.pointer.quit_requested() {
                break;
            }

            self.step();

            let elapsed = tick_start.elapsed();
            if elapsed < TICK {
                spin_sleep::sleep(TICK - elapsed);
            }
        }

        // Center the stick and stop consuming input before exit
        let _ = self.sink.reset();
        self.pointer.request_quit();
        log::info!("Sampling loop stopped");
    }

    /// One tick: apply pending control messages, then run the pipeline.
    /// Split out from [`run`] so tests can drive it without the clock.
    pub fn step(&mut self) {
        if TOGGLE.swap(false, Ordering::Relaxed) {
            self.apply(ControlMsg::TogglePause);
        }
        while let Ok(msg) = self.rx.try_recv() {
            self.apply(msg);
        }

        if self.paused {
            // Hold the sink at neutral; don't consume or apply deltas.
            if self.last_emitted != StickVector::default() || self.degraded {
                self.emit(StickVector::default());
            }
            return;
        }

        let (raw_dx, raw_dy) = self.pointer.drain();
        let (dx, dy) = self.jump.filter(raw_dx, raw_dy);
        let out = self.conditioner.tick(dx, dy, &self.settings, &self.lut);

        // Fire-and-forget per tick; retry every tick while degraded.
        if out != self.last_emitted || self.degraded {
            self.emit(out);
        }
        self.shared.output.publish(out);

        if self.debug {
            self.debug_raw.0 += raw_dx as i64;
            self.debug_raw.1 += raw_dy as i64;
            self.debug_tick += 1;
            if self.debug_tick >= DEBUG_PRINT_TICKS {
                if self.debug_raw != (0, 0) || out != StickVector::default() {
                    eprintln!(
                        "[dbg] raw({:+6},{:+6}) out({:+.3},{:+.3}) spikes={} degraded={}",
                        self.debug_raw.0,
                        self.debug_raw.1,
                        out.x,
                        out.y,
                        self.jump.rejected(),
                        self.degraded,
                    );
                }
                self.debug_tick = 0;
                self.debug_raw = (0, 0);
            }
        }
    }

    fn emit(&mut self, out: StickVector) {
        match self.sink.update(out.x, out.y) {
            Ok(()) => {
                self.last_emitted = out;
                if self.degraded {
                    log::info!("Output device recovered");
                    self.degraded = false;
                    self.shared.output.set_degraded(false);
                }
            }
            Err(e) => {
                if !self.degraded {
                    log::warn!("Failed to update virtual pad: {}", e);
                    self.degraded = true;
                    self.shared.output.set_degraded(true);
                }
            }
        }
    }

    /// Apply one control message at the configuration boundary. Invalid
    /// edits are logged and dropped; the prior configuration stays live.
    fn apply(&mut self, msg: ControlMsg) {
        let result = match msg {
            ControlMsg::TogglePause => {
                self.toggle_pause();
                return;
            }
            ControlMsg::Quit => {
                log::info!("Quit requested");
                QUIT.store(true, Ordering::Relaxed);
                return;
            }
            ControlMsg::SensitivityUp => {
                let v = self.settings.step_sensitivity(1.0);
                log::info!("Sensitivity increased to {}", v);
                Ok(())
            }
            ControlMsg::SensitivityDown => {
                let v = self.settings.step_sensitivity(-1.0);
                log::info!("Sensitivity decreased to {}", v);
                Ok(())
            }
            ControlMsg::SetSensitivity(v) => self.settings.set_sensitivity(v),
            ControlMsg::SetDecayRate(v) => self.settings.set_decay_rate(v),
            ControlMsg::SetAxis(axis, v) => self.settings.set_axis(axis, v),
            ControlMsg::SetCurve(curve) => self
                .settings
                .set_curve(curve)
                .and_then(|()| {
                    self.lut = self.settings.curve.compile()?;
                    Ok(())
                }),
        };

        match result {
            Ok(()) => self.commit(),
            Err(e) => log::warn!("Rejected configuration change: {}", e),
        }
    }

    /// Publish the new snapshot and auto-save. A failed save is a warning,
    /// not a rollback — the running config is already live.
    fn commit(&mut self) {
        *self.shared.config.write() = Arc::new(self.settings.clone());
        if let Err(e) = self.settings.save(&self.settings_path) {
            log::warn!("Failed to save settings: {}", e);
        }
    }

    fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        if self.paused {
            self.pointer.set_active(false);
            log::info!("Paused - mouse released");
        } else {
            // Every resume starts from a centered stick.
            self.conditioner.reset();
            self.pointer.drain();
            self.pointer.set_active(true);
            log::info!("Resumed - mouse controlling pad");
        }
    }
}
