//! Terminal output with colored module prefixes and build progress.
//!
//! - `log!` prints `[module] message`
//! - `debug!` only fires with `--verbose`
//! - [`ProgressLine`] keeps per-job counters on a single line
//! - `status_*` helpers print timestamped rebuild results in watch mode
//!
//! ```ignore
//! log!("resolve"; "{} documents", count);
//! debug!("links"; "[{}] {} -> {}", source, old, new);
//!
//! let progress = ProgressLine::new(&[("documents", 40), ("downloads", 0)]);
//! progress.add_total("downloads", 1);
//! progress.inc("documents");
//! progress.finish();
//! ```

use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::{
    io::{Write, stdout},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set verbose mode globally (`--verbose`).
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

#[allow(dead_code)] // Used by debug! macro
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

/// Number of live progress lines below the log cursor.
static BAR_COUNT: AtomicUsize = AtomicUsize::new(0);

// ============================================================================
// Macros
// ============================================================================

/// Log a message with a colored module prefix.
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log only when `--verbose` is set.
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Output
// ============================================================================

#[inline]
pub fn log(module: &str, message: &str) {
    let prefix = colorize_prefix(module);

    let mut stdout = stdout().lock();

    if BAR_COUNT.load(Ordering::SeqCst) > 0 {
        execute!(stdout, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
    }

    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

fn colorize_prefix(module: &str) -> String {
    let prefix = format!("[{module}]");
    match module.to_ascii_lowercase().as_str() {
        "watch" => prefix.bright_green().bold().to_string(),
        "error" => prefix.bright_red().bold().to_string(),
        "warning" => prefix.bright_magenta().bold().to_string(),
        "build" | "resolve" => prefix.bright_blue().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

// ============================================================================
// Watch status
// ============================================================================

fn now() -> String {
    let format = time::macros::format_description!("[hour]:[minute]:[second]");
    time::OffsetDateTime::now_utc()
        .format(&format)
        .unwrap_or_default()
}

fn status_line(symbol: String, message: &str) {
    let timestamp = format!("[{}]", now()).dimmed().to_string();
    let mut stdout = stdout().lock();
    writeln!(stdout, "{timestamp} {symbol} {message}").ok();
    stdout.flush().ok();
}

/// Rebuild finished in watch mode.
pub fn status_success(message: &str) {
    status_line("✓".green().to_string(), message);
}

/// Rebuild failed in watch mode.
pub fn status_error(summary: &str, detail: &str) {
    let message = if detail.is_empty() {
        summary.to_string()
    } else {
        format!("{summary}\n{detail}")
    };
    status_line("✗".red().to_string(), &message);
}

// ============================================================================
// Progress line
// ============================================================================

/// Single-line progress display: `[build] documents(12/40) downloads(3/9)`.
///
/// Totals may grow while the build runs, since downloads are discovered
/// while documents are processed. Refreshes use `try_lock` so workers never
/// wait on the terminal.
pub struct ProgressLine {
    counters: Vec<Counter>,
    lock: Mutex<()>,
}

struct Counter {
    name: &'static str,
    total: AtomicUsize,
    current: AtomicUsize,
}

impl ProgressLine {
    pub fn new(items: &[(&'static str, usize)]) -> Self {
        let counters = items
            .iter()
            .map(|(name, total)| Counter {
                name,
                total: AtomicUsize::new(*total),
                current: AtomicUsize::new(0),
            })
            .collect();

        BAR_COUNT.store(1, Ordering::SeqCst);

        let progress = Self {
            counters,
            lock: Mutex::new(()),
        };
        progress.display();
        progress
    }

    fn counter(&self, name: &str) -> Option<&Counter> {
        self.counters.iter().find(|c| c.name == name)
    }

    #[inline]
    pub fn inc(&self, name: &str) {
        if let Some(counter) = self.counter(name) {
            counter.current.fetch_add(1, Ordering::Relaxed);
            if self.lock.try_lock().is_some() {
                self.display();
            }
        }
    }

    pub fn add_total(&self, name: &str, n: usize) {
        if let Some(counter) = self.counter(name) {
            counter.total.fetch_add(n, Ordering::Relaxed);
        }
    }

    fn line(&self) -> String {
        self.counters
            .iter()
            .filter(|c| c.total.load(Ordering::Relaxed) > 0)
            .map(|c| {
                format!(
                    "{}({}/{})",
                    c.name,
                    c.current.load(Ordering::Relaxed),
                    c.total.load(Ordering::Relaxed)
                )
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn display(&self) {
        let line = self.line();
        let mut stdout = stdout().lock();
        execute!(stdout, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
        write!(stdout, "{} {}", colorize_prefix("build"), line).ok();
        stdout.flush().ok();
    }

    /// Keep the final counts on screen and release the line.
    pub fn finish(self) {
        BAR_COUNT.store(0, Ordering::SeqCst);
        {
            let _guard = self.lock.lock();
            let line = self.line();
            let mut stdout = stdout().lock();
            execute!(stdout, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
            writeln!(stdout, "{} {}", colorize_prefix("build"), line).ok();
            stdout.flush().ok();
        }
        std::mem::forget(self);
    }
}

impl Drop for ProgressLine {
    fn drop(&mut self) {
        BAR_COUNT.store(0, Ordering::SeqCst);
        let mut stdout = stdout().lock();
        execute!(stdout, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine)).ok();
        stdout.flush().ok();
    }
}
