use crate::curve::CurvePreset;
use clap::Parser;
use std::path::PathBuf;

/// Linux mouse-to-gamepad stick mapper (evdev/uinput).
/// Grabs your mouse and conditions its motion into a virtual analog stick.
#[derive(Parser, Debug)]
#[command(name = "mousestick")]
pub struct Cli {
    /// Sensitivity override for this run (2-100); committed to settings
    #[arg(short, long)]
    pub sensitivity: Option<f32>,

    /// Curve preset override (linear, aggressive, precise, s-curve)
    #[arg(long, value_enum)]
    pub curve: Option<CurvePreset>,

    /// Specific mouse evdev path (e.g. /dev/input/event5)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Specific keyboard evdev path for global hotkeys
    #[arg(long)]
    pub keyboard: Option<String>,

    /// Output to right stick (ABS_RX/ABS_RY) instead of left (ABS_X/ABS_Y)
    #[arg(long, default_value_t = false)]
    pub right_stick: bool,

    /// Settings file path (default: per-user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Disable the keyboard hotkey listener
    #[arg(long, default_value_t = false)]
    pub no_hotkeys: bool,

    /// Start paused (mouse stays free until toggled)
    #[arg(long, default_value_t = false)]
    pub start_paused: bool,

    /// Print debug diagnostics every 500ms (raw deltas, output, spikes)
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}
