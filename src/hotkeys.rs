//! Global hotkeys over a non-grabbed keyboard device.
//!
//! Reading the keyboard's evdev node directly makes the bindings work with
//! no window focus at all. The device is never grabbed, so normal typing is
//! unaffected; the listener just watches for the four bindings and posts
//! control messages onto the engine's queue — the same path every other
//! configuration writer uses.

use crate::engine::ControlMsg;
use crossbeam_channel::Sender;
use evdev::{Device, InputEventKind, Key};
use std::path::PathBuf;
use std::sync::atomic::Ordering;

/// Key bindings. Chosen to match the original tool's layout: backtick to
/// pause/resume, brackets for sensitivity, Esc to quit.
pub const KEY_TOGGLE: Key = Key::KEY_GRAVE;
pub const KEY_SENS_DOWN: Key = Key::KEY_LEFTBRACE;
pub const KEY_SENS_UP: Key = Key::KEY_RIGHTBRACE;
pub const KEY_QUIT: Key = Key::KEY_ESC;

/// Find a keyboard by enumerating /dev/input/event*. Wants a device with
/// letter keys and Esc, skipping anything that looks like a mouse.
pub fn find_keyboard_device() -> Option<PathBuf> {
    for i in 0..64 {
        let path = PathBuf::from(format!("/dev/input/event{}", i));
        if !path.exists() {
            continue;
        }
        if let Ok(device) = Device::open(&path) {
            let has_keys = device.supported_keys().is_some_and(|keys| {
                keys.contains(Key::KEY_ESC)
                    && keys.contains(Key::KEY_A)
                    && keys.contains(Key::KEY_GRAVE)
            });
            let is_pointer = device.supported_relative_axes().is_some();

            if has_keys && !is_pointer {
                log::info!(
                    "Found keyboard: {} at {}",
                    device.name().unwrap_or("unknown"),
                    path.display()
                );
                return Some(path);
            }
        }
    }
    None
}

pub struct HotkeyListener {
    device: Device,
    tx: Sender<ControlMsg>,
}

impl HotkeyListener {
    pub fn new(device_path: &str, tx: Sender<ControlMsg>) -> std::io::Result<Self> {
        let device = Device::open(device_path)?;
        log::info!(
            "Listening for hotkeys on: {} ({})",
            device.name().unwrap_or("unknown"),
            device_path
        );
        Ok(Self { device, tx })
    }

    /// Map a key-press to its control message, if it is one of ours.
    fn binding(key: Key) -> Option<ControlMsg> {
        match key {
            k if k == KEY_TOGGLE => Some(ControlMsg::TogglePause),
            k if k == KEY_SENS_DOWN => Some(ControlMsg::SensitivityDown),
            k if k == KEY_SENS_UP => Some(ControlMsg::SensitivityUp),
            k if k == KEY_QUIT => Some(ControlMsg::Quit),
            _ => None,
        }
    }

    /// Run the blocking event loop. Call from a dedicated thread; exits when
    /// the engine quits or the queue closes.
    pub fn run(&mut self) {
        loop {
            if crate::engine::QUIT.load(Ordering::Relaxed) {
                break;
            }

            let events: Vec<_> = match self.device.fetch_events() {
                Ok(iter) => iter.collect(),
                Err(e) => {
                    if crate::engine::QUIT.load(Ordering::Relaxed) {
                        break;
                    }
                    if e.kind() == std::io::ErrorKind::Interrupted {
                        continue;
                    }
                    log::error!("Error reading keyboard events: {}", e);
                    std::thread::sleep(std::time::Duration::from_millis(10));
                    continue;
                }
            };

            for ev in &events {
                // value 1 = key down; ignore repeats (2) and releases (0)
                if ev.value() != 1 {
                    continue;
                }
                if let InputEventKind::Key(key) = ev.kind() {
                    if let Some(msg) = Self::binding(key) {
                        if self.tx.send(msg).is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}
