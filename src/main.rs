use anyhow::Context;
use clap::Parser;
use mousestick::capture::{find_pointer_device, PointerReader, PointerState};
use mousestick::cli::Cli;
use mousestick::curve::CurveProfile;
use mousestick::engine::{Engine, SharedState, QUIT, TOGGLE};
use mousestick::hotkeys::{find_keyboard_device, HotkeyListener};
use mousestick::pad::VirtualPad;
use mousestick::settings::Settings;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    // Handle "mousestick toggle" / "mousestick quit" before clap parsing.
    // These send a signal to the running instance and exit immediately.
    if let Some(cmd) = std::env::args().nth(1) {
        match cmd.as_str() {
            "toggle" => {
                send_to_running(libc::SIGUSR1, "Toggle");
                return Ok(());
            }
            "quit" => {
                send_to_running(libc::SIGTERM, "Quit");
                return Ok(());
            }
            _ => {}
        }
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let settings_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load(&settings_path);

    // CLI overrides are committed edits: validated at the boundary, then
    // persisted like any other committed change.
    let mut overridden = false;
    if let Some(v) = cli.sensitivity {
        settings.set_sensitivity(v).context("invalid --sensitivity")?;
        overridden = true;
    }
    if let Some(preset) = cli.curve {
        settings
            .set_curve(CurveProfile::Preset(preset))
            .context("invalid --curve")?;
        overridden = true;
    }
    if overridden {
        if let Err(e) = settings.save(&settings_path) {
            log::warn!("Failed to save settings: {}", e);
        }
    }

    println!("mousestick - Mouse to virtual gamepad stick");
    println!("  Sensitivity: {:.0}", settings.sensitivity);
    println!("  Curve:       {}", curve_label(&settings.curve));
    println!(
        "  Output:      {} stick",
        if cli.right_stick { "right" } else { "left" }
    );
    println!();

    signal_setup();

    // Find mouse device
    let device_path = match &cli.device {
        Some(path) => path.clone(),
        None => match find_pointer_device() {
            Some(p) => {
                let s = p.to_string_lossy().to_string();
                log::info!("Auto-detected mouse: {}", s);
                s
            }
            None => {
                log::error!("No mouse device found. Are you in the 'input' group?");
                log::error!("Try: sudo usermod -aG input $USER (then re-login)");
                std::process::exit(1);
            }
        },
    };

    // Create virtual gamepad
    let pad = match VirtualPad::new(cli.right_stick) {
        Ok(p) => p,
        Err(e) => {
            log::error!("Failed to create virtual gamepad: {}", e);
            log::error!("Do you have /dev/uinput access? Try: sudo modprobe uinput");
            std::process::exit(1);
        }
    };

    // Spawn mouse reader thread
    let pointer = Arc::new(PointerState::new());
    let pointer_clone = Arc::clone(&pointer);
    let device_path_clone = device_path.clone();

    let mouse_thread = std::thread::Builder::new()
        .name("mouse-reader".into())
        .spawn(move || match PointerReader::new(&device_path_clone, pointer_clone) {
            Ok(mut reader) => reader.run(),
            Err(e) => {
                log::error!("Failed to open mouse device: {}", e);
                log::error!("Check permissions on {}", device_path_clone);
            }
        })
        .expect("Failed to spawn mouse thread");

    // Control queue: hotkeys, signals, and any future UI all mutate
    // configuration through this one path.
    let (tx, rx) = crossbeam_channel::bounded(64);

    if cli.no_hotkeys {
        drop(tx);
    } else {
        let keyboard_path = match &cli.keyboard {
            Some(path) => Some(path.clone()),
            None => find_keyboard_device().map(|p| p.to_string_lossy().to_string()),
        };
        match keyboard_path {
            Some(path) => {
                std::thread::Builder::new()
                    .name("hotkeys".into())
                    .spawn(move || match HotkeyListener::new(&path, tx) {
                        Ok(mut listener) => listener.run(),
                        Err(e) => log::warn!("Failed to open keyboard device: {}", e),
                    })
                    .expect("Failed to spawn hotkey thread");
            }
            None => {
                log::warn!("No keyboard device found; global hotkeys disabled");
                drop(tx);
            }
        }
    }

    println!("Hotkeys: ` pause/resume   [ ] sensitivity   Esc quit");
    println!("Or from another shell: mousestick toggle | mousestick quit");
    println!("Point games at the 'mousestick Pad' controller.");
    println!();

    let shared = Arc::new(SharedState::new(&settings));
    let mut engine = Engine::new(
        settings,
        settings_path,
        Box::new(pad),
        Arc::clone(&pointer),
        shared,
        rx,
        cli.start_paused,
        cli.debug,
    );
    engine.run();

    log::info!("Shutting down...");
    pointer.request_quit();
    let _ = mouse_thread.join();
    log::info!("Done");
    Ok(())
}

fn curve_label(curve: &CurveProfile) -> String {
    use mousestick::curve::CurvePreset;
    match curve {
        CurveProfile::Preset(CurvePreset::Linear) => "linear".into(),
        CurveProfile::Preset(CurvePreset::Aggressive) => "aggressive".into(),
        CurveProfile::Preset(CurvePreset::Precise) => "precise".into(),
        CurveProfile::Preset(CurvePreset::SCurve) => "s-curve".into(),
        CurveProfile::Custom(points) => format!("custom ({} points)", points.len()),
    }
}

fn signal_setup() {
    unsafe {
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGUSR1, signal_handler as libc::sighandler_t);
    }
}

extern "C" fn signal_handler(sig: libc::c_int) {
    match sig {
        libc::SIGUSR1 => TOGGLE.store(true, Ordering::Relaxed),
        _ => QUIT.store(true, Ordering::Relaxed),
    }
}

/// Find PID of a running mousestick instance by scanning /proc.
fn find_running_instance() -> Option<i32> {
    let my_pid = std::process::id() as i32;
    for entry in std::fs::read_dir("/proc").ok()? {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        let pid: i32 = match entry.file_name().to_str().and_then(|s| s.parse().ok()) {
            Some(p) => p,
            None => continue,
        };
        if pid == my_pid {
            continue;
        }
        if let Ok(comm) = std::fs::read_to_string(entry.path().join("comm")) {
            if comm.trim() == "mousestick" {
                return Some(pid);
            }
        }
    }
    None
}

/// Send a signal to the running mousestick instance, or exit with an error.
fn send_to_running(sig: libc::c_int, action: &str) {
    match find_running_instance() {
        Some(pid) => {
            let ret = unsafe { libc::kill(pid, sig) };
            if ret == 0 {
                eprintln!("{} sent to mousestick (pid {})", action, pid);
            } else {
                eprintln!("Failed to send signal to mousestick (pid {})", pid);
                std::process::exit(1);
            }
        }
        None => {
            eprintln!("No running mousestick instance found");
            std::process::exit(1);
        }
    }
}
