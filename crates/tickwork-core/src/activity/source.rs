//! Host-facing sensors feeding the activity classifier.
//!
//! - Windows: `GetForegroundWindow`/`GetWindowTextW` and `GetLastInputInfo`.
//! - Linux (X11): `xdotool getactivewindow getwindowname` and `xprintidle`,
//!   when installed.
//! - Elsewhere, or when a tool is missing: the descriptor `"None"` and zero
//!   idle seconds.

/// Supplies a descriptor of what is in the foreground right now.
pub trait ContextSource {
    fn current_context(&mut self) -> String;
}

/// Supplies the time since the last keyboard or mouse input.
pub trait IdleSource {
    /// Seconds since last input; 0 when unsupported on this host.
    fn seconds_since_last_input(&mut self) -> f64;
}

/// Descriptor reported when no foreground window can be determined.
pub const NO_CONTEXT: &str = "None";

/// Title of the active window.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForegroundWindow;

impl ContextSource for ForegroundWindow {
    fn current_context(&mut self) -> String {
        platform::foreground_title().unwrap_or_else(|| NO_CONTEXT.to_string())
    }
}

/// System-wide input idle time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemIdle;

impl IdleSource for SystemIdle {
    fn seconds_since_last_input(&mut self) -> f64 {
        platform::idle_seconds().unwrap_or(0.0)
    }
}

/// Idle source for hosts without input tracking.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIdle;

impl IdleSource for NoIdle {
    fn seconds_since_last_input(&mut self) -> f64 {
        0.0
    }
}

#[cfg(windows)]
mod platform {
    use windows::Win32::System::SystemInformation::GetTickCount;
    use windows::Win32::UI::Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO};
    use windows::Win32::UI::WindowsAndMessaging::{GetForegroundWindow, GetWindowTextW};

    pub fn foreground_title() -> Option<String> {
        let mut buf = [0u16; 512];
        // SAFETY: plain Win32 queries writing into a stack buffer we own.
        let len = unsafe {
            let hwnd = GetForegroundWindow();
            GetWindowTextW(hwnd, &mut buf)
        };
        // Nothing in the foreground yields an empty title.
        let len = usize::try_from(len).unwrap_or(0);
        Some(String::from_utf16_lossy(&buf[..len]))
    }

    pub fn idle_seconds() -> Option<f64> {
        let mut info = LASTINPUTINFO {
            cbSize: std::mem::size_of::<LASTINPUTINFO>() as u32,
            dwTime: 0,
        };
        // SAFETY: `info` is a properly sized LASTINPUTINFO.
        let ok = unsafe { GetLastInputInfo(&mut info) }.as_bool();
        if !ok {
            return None;
        }
        // SAFETY: no arguments, no side effects.
        let millis = unsafe { GetTickCount() }.wrapping_sub(info.dwTime);
        Some(f64::from(millis) / 1000.0)
    }
}

#[cfg(target_os = "linux")]
mod platform {
    use std::process::{Command, Stdio};

    fn run(program: &str, args: &[&str]) -> Option<String> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn foreground_title() -> Option<String> {
        run("xdotool", &["getactivewindow", "getwindowname"])
    }

    pub fn idle_seconds() -> Option<f64> {
        let millis: f64 = run("xprintidle", &[])?.parse().ok()?;
        Some(millis / 1000.0)
    }
}

#[cfg(not(any(windows, target_os = "linux")))]
mod platform {
    pub fn foreground_title() -> Option<String> {
        None
    }

    pub fn idle_seconds() -> Option<f64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn foreground_window_never_panics() {
        // Headless CI has no window manager; the descriptor may be anything,
        // including the fallback.
        let _ = ForegroundWindow.current_context();
    }

    #[test]
    fn idle_sources_are_non_negative() {
        assert!(SystemIdle.seconds_since_last_input() >= 0.0);
        assert_eq!(NoIdle.seconds_since_last_input(), 0.0);
    }
}
