//! Raw pointer capture over evdev.
//!
//! A dedicated reader thread blocks on the mouse device and accumulates
//! relative deltas into atomics; the sampling loop drains them once per
//! tick. While capture is active the device is grabbed, so the desktop
//! pointer never moves and no screen-edge recentring can occur. Pausing
//! releases the grab and drops incoming deltas.

use evdev::{Device, InputEventKind, RelativeAxisType};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

/// Shared accumulator between the reader thread and the sampling loop.
pub struct PointerState {
    dx: AtomicI32,
    dy: AtomicI32,
    active: AtomicBool,
    quit: AtomicBool,
}

impl PointerState {
    pub fn new() -> Self {
        Self {
            dx: AtomicI32::new(0),
            dy: AtomicI32::new(0),
            active: AtomicBool::new(false),
            quit: AtomicBool::new(false),
        }
    }

    /// Drain accumulated deltas, returning `(dx, dy)` and resetting to zero.
    pub fn drain(&self) -> (i32, i32) {
        let dx = self.dx.swap(0, Ordering::Relaxed);
        let dy = self.dy.swap(0, Ordering::Relaxed);
        (dx, dy)
    }

    /// Feed a delta into the accumulator. The reader thread is the only
    /// production caller; tests inject synthetic motion here.
    pub fn accumulate(&self, dx: i32, dy: i32) {
        self.dx.fetch_add(dx, Ordering::Relaxed);
        self.dy.fetch_add(dy, Ordering::Relaxed);
    }

    /// Engine-side switch: while inactive the reader discards deltas and
    /// releases the device grab.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn request_quit(&self) {
        self.quit.store(true, Ordering::Relaxed);
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::Relaxed)
    }
}

impl Default for PointerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Find a mouse by enumerating /dev/input/event*. Returns the first device
/// that reports REL_X, REL_Y, and a left button.
pub fn find_pointer_device() -> Option<PathBuf> {
    use evdev::Key;
    for i in 0..64 {
        let path = PathBuf::from(format!("/dev/input/event{}", i));
        if !path.exists() {
            continue;
        }
        if let Ok(device) = Device::open(&path) {
            let has_rel_x = device
                .supported_relative_axes()
                .is_some_and(|axes| axes.contains(RelativeAxisType::REL_X));
            let has_rel_y = device
                .supported_relative_axes()
                .is_some_and(|axes| axes.contains(RelativeAxisType::REL_Y));
            let has_btn_left = device
                .supported_keys()
                .is_some_and(|keys| keys.contains(Key::BTN_LEFT));

            if has_rel_x && has_rel_y && has_btn_left {
                log::info!(
                    "Found mouse: {} at {}",
                    device.name().unwrap_or("unknown"),
                    path.display()
                );
                return Some(path);
            }
        }
    }
    None
}

/// Blocking evdev reader. Owns the device; grab state follows the shared
/// active flag so pause/resume works without handing the fd across threads.
pub struct PointerReader {
    device: Device,
    state: Arc<PointerState>,
    grabbed: bool,
}

impl PointerReader {
    pub fn new(device_path: &str, state: Arc<PointerState>) -> std::io::Result<Self> {
        let device = Device::open(device_path)?;
        log::info!(
            "Opened mouse device: {} ({})",
            device.name().unwrap_or("unknown"),
            device_path
        );
        Ok(Self {
            device,
            state,
            grabbed: false,
        })
    }

    fn reconcile_grab(&mut self) {
        let want = self.state.is_active();
        if want == self.grabbed {
            return;
        }
        if want {
            match self.device.grab() {
                Ok(()) => {
                    self.grabbed = true;
                    log::info!("Mouse grabbed");
                }
                Err(e) => log::warn!("Failed to grab mouse: {}", e),
            }
        } else {
            if let Err(e) = self.device.ungrab() {
                log::warn!("Failed to ungrab mouse: {}", e);
            }
            self.grabbed = false;
            log::info!("Mouse released");
        }
    }

    /// Run the blocking event loop. Call from a dedicated thread.
    pub fn run(&mut self) {
        loop {
            if self.state.quit_requested() {
                break;
            }

            self.reconcile_grab();

            let events: Vec<_> = match self.device.fetch_events() {
                Ok(iter) => iter.collect(),
                Err(e) => {
                    if self.state.quit_requested() {
                        break;
                    }
                    // Signals interrupt the blocking read with EINTR — loop
                    // back so the quit flag and grab state get rechecked.
                    if e.kind() == std::io::ErrorKind::Interrupted {
                        continue;
                    }
                    log::error!("Error reading mouse events: {}", e);
                    std::thread::sleep(std::time::Duration::from_millis(10));
                    continue;
                }
            };

            if !self.state.is_active() {
                continue;
            }
            for ev in &events {
                if let InputEventKind::RelAxis(axis) = ev.kind() {
                    match axis {
                        RelativeAxisType::REL_X => self.state.accumulate(ev.value(), 0),
                        RelativeAxisType::REL_Y => self.state.accumulate(0, ev.value()),
                        _ => {}
                    }
                }
            }
        }

        // Release the device on the way out
        if self.grabbed {
            let _ = self.device.ungrab();
        }
    }
}
