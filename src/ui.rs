use std::io::Write;

/// Presentation seam. The engine talks to a human through exactly these
/// three calls; anything richer (TUI, GUI) stays outside the core.
pub trait Presenter: Send + Sync {
    fn log(&self, msg: &str);
    fn update_progress(&self, name: &str, percent: f64, speed: &str, eta: &str);
    /// Ask the user one question and return their raw answer. Used once per
    /// resolution to pick among ranked candidates.
    fn prompt(&self, message: &str) -> String;
}

pub struct Console;

impl Presenter for Console {
    fn log(&self, msg: &str) {
        println!("{}", msg);
    }

    fn update_progress(&self, name: &str, percent: f64, speed: &str, eta: &str) {
        print!("\r{}: {:5.1}% {} ETA {}    ", name, percent, speed, eta);
        let _ = std::io::stdout().flush();
        if percent >= 100.0 {
            println!();
        }
    }

    fn prompt(&self, message: &str) -> String {
        print!("{}", message);
        let _ = std::io::stdout().flush();
        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() {
            return String::new();
        }
        answer
    }
}

pub fn format_size(size: Option<u64>) -> String {
    let Some(size) = size else {
        return "?".to_string();
    };
    let mut value = size as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if value < 1024.0 {
            return format!("{:.1} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.1} TB", value)
}
