//! Virtual gamepad output.
//!
//! The sink boundary is a trait so the sampling loop can be exercised
//! without /dev/uinput; the production implementation builds a uinput
//! gamepad and drives one stick with the conditioned vector.

use evdev::uinput::VirtualDeviceBuilder;
use evdev::{AbsInfo, AbsoluteAxisType, AttributeSet, BusType, InputId, Key, UinputAbsSetup};

const STICK_MIN: i32 = -32767;
const STICK_MAX: i32 = 32767;

/// Where the conditioned vector lands each tick. `update` takes components
/// in `[-1,1]`; the device handle is released when the sink is dropped.
pub trait OutputSink: Send {
    fn update(&mut self, x: f32, y: f32) -> std::io::Result<()>;

    fn reset(&mut self) -> std::io::Result<()> {
        self.update(0.0, 0.0)
    }
}

pub struct VirtualPad {
    device: evdev::uinput::VirtualDevice,
    axis_x: AbsoluteAxisType,
    axis_y: AbsoluteAxisType,
}

impl VirtualPad {
    pub fn new(use_right_stick: bool) -> std::io::Result<Self> {
        let abs = |axis: AbsoluteAxisType| -> UinputAbsSetup {
            UinputAbsSetup::new(axis, AbsInfo::new(0, STICK_MIN, STICK_MAX, 16, 128, 1))
        };

        // Declare a few buttons so games classify this as a gamepad
        let mut keys = AttributeSet::<Key>::new();
        keys.insert(Key::BTN_SOUTH);
        keys.insert(Key::BTN_EAST);
        keys.insert(Key::BTN_NORTH);
        keys.insert(Key::BTN_WEST);

        let device = VirtualDeviceBuilder::new()?
            .name("mousestick Pad")
            .input_id(InputId::new(BusType::BUS_VIRTUAL, 0x1234, 0x0057, 1))
            .with_keys(&keys)?
            .with_absolute_axis(&abs(AbsoluteAxisType::ABS_X))?
            .with_absolute_axis(&abs(AbsoluteAxisType::ABS_Y))?
            .with_absolute_axis(&abs(AbsoluteAxisType::ABS_RX))?
            .with_absolute_axis(&abs(AbsoluteAxisType::ABS_RY))?
            .build()?;

        let (axis_x, axis_y) = if use_right_stick {
            (AbsoluteAxisType::ABS_RX, AbsoluteAxisType::ABS_RY)
        } else {
            (AbsoluteAxisType::ABS_X, AbsoluteAxisType::ABS_Y)
        };

        log::info!(
            "Created virtual gamepad (output: {} stick)",
            if use_right_stick { "right" } else { "left" }
        );

        Ok(Self {
            device,
            axis_x,
            axis_y,
        })
    }
}

impl OutputSink for VirtualPad {
    fn update(&mut self, x: f32, y: f32) -> std::io::Result<()> {
        let sx = (x.clamp(-1.0, 1.0) * STICK_MAX as f32) as i32;
        let sy = (y.clamp(-1.0, 1.0) * STICK_MAX as f32) as i32;
        self.device.emit(&[
            evdev::InputEvent::new_now(evdev::EventType::ABSOLUTE, self.axis_x.0, sx),
            evdev::InputEvent::new_now(evdev::EventType::ABSOLUTE, self.axis_y.0, sy),
            evdev::InputEvent::new_now(evdev::EventType::SYNCHRONIZATION, 0, 0),
        ])
    }
}
