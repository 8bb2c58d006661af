//! Terminal lifecycle management for revflow.
//!
//! revflow draws its prompts in a small inline viewport at the bottom of the
//! normal screen rather than an alternate screen, so the review transcript
//! stays in the scrollback. Everything renders to stderr, which keeps stdout
//! clean for pipelines.
//!
//! Raw mode is only enabled while a prompt is reading keys. Between prompts the
//! terminal is in cooked mode, so Ctrl-C raises SIGINT and reaches the shutdown
//! flag registered by [`register_shutdown_signals`].

use crossterm::cursor::Show;
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use ratatui::backend::CrosstermBackend;
use ratatui::{Terminal, TerminalOptions, Viewport};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag::register;
use std::io::{stderr, BufWriter, Stderr};
use std::panic;
use std::sync::{atomic::AtomicBool, Arc};

/// The terminal type used by revflow: CrosstermBackend over a buffered stderr writer.
pub type Tui = Terminal<CrosstermBackend<BufWriter<Stderr>>>;

/// Creates an inline terminal with a viewport `height` rows tall.
///
/// # Errors
///
/// Returns `Err` if the terminal size or cursor position cannot be queried.
pub fn init_inline(height: u16) -> std::io::Result<Tui> {
    let backend = CrosstermBackend::new(BufWriter::new(stderr()));
    Terminal::with_options(backend, TerminalOptions { viewport: Viewport::Inline(height) })
}

/// Restore the terminal to its pre-prompt state.
///
/// Disables raw mode and shows the cursor. Idempotent; called from
/// [`RawMode`]'s `Drop` and from the panic hook.
pub fn restore_tui() -> std::io::Result<()> {
    disable_raw_mode()?;
    execute!(stderr(), Show)?;
    Ok(())
}

/// Raw mode for the lifetime of the guard.
pub struct RawMode(());

impl RawMode {
    pub fn enable() -> std::io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self(()))
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = restore_tui();
    }
}

/// Install a panic hook that restores the terminal before printing the panic message.
///
/// Chains onto any previously installed hook so the default printer still runs.
pub fn install_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_tui();
        original_hook(panic_info);
    }));
}

/// Register SIGTERM and SIGINT handlers that set a shared `AtomicBool`.
///
/// The flag is polled by `main`, which stops the workflow and restores the
/// operator's branch.
///
/// # Panics
///
/// Panics if the OS refuses to register a signal handler (treated as a fatal
/// initialisation error).
pub fn register_shutdown_signals() -> Arc<AtomicBool> {
    let term = Arc::new(AtomicBool::new(false));
    // Safety: signal_hook::flag::register is safe for AtomicBool targets;
    // the handler only calls atomic_store, which is async-signal-safe.
    register(SIGTERM, Arc::clone(&term)).expect("Failed to register SIGTERM handler");
    register(SIGINT, Arc::clone(&term)).expect("Failed to register SIGINT handler");
    term
}
