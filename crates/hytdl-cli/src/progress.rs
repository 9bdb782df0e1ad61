//! Progress rendering: bar and human-readable byte counts on stdout.
//! Pure formatting over the download's progress events.

use std::io::{self, Write};

use hytdl_core::download::Progress;

const BAR_WIDTH: usize = 50;

/// Renders progress events as a single in-place terminal line.
pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&mut self, event: Progress) {
        match event {
            Progress::Percent {
                percent,
                downloaded,
                total,
            } => {
                print!(
                    "\r{} {}% {} / {}",
                    bar(percent),
                    percent,
                    format_bytes(downloaded),
                    format_bytes(total)
                );
                let _ = io::stdout().flush();
            }
            Progress::Bytes { downloaded } => {
                print!("\r{}", format_bytes(downloaded));
                let _ = io::stdout().flush();
            }
            // Terminate the in-place progress line.
            Progress::Finished { .. } => println!(),
        }
    }
}

fn bar(percent: u32) -> String {
    let filled = (percent.min(100) as usize * BAR_WIDTH) / 100;
    format!("[{}{}]", "=".repeat(filled), " ".repeat(BAR_WIDTH - filled))
}

fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1} {}B", bytes as f64 / div as f64, ["K", "M", "G", "T", "P", "E"][exp])
}
