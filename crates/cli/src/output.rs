// Output format selection for the CLI.
//
// TTY → human-readable text. Piped/redirected → JSON.
// `--json` forces JSON output regardless of terminal.

use containersync_engine::SyncError;
use serde::Serialize;
use std::io::{self, IsTerminal, Write};

const ANSI_RED: &str = "\x1b[31m";
const ANSI_RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    /// JSON if `--json` was passed or stdout is not a TTY.
    pub fn detect(json_flag: bool) -> Self {
        if json_flag {
            return Self::Json;
        }
        Self::detect_from_terminal(io::stdout().is_terminal())
    }

    pub fn detect_from_terminal(is_tty: bool) -> Self {
        if is_tty {
            Self::Human
        } else {
            Self::Json
        }
    }
}

pub fn print_output<T, F>(format: OutputFormat, value: &T, human_fn: F) -> io::Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    write_output(&mut io::stdout().lock(), format, value, human_fn)
}

/// Same as `print_output`, against any writer.
pub fn write_output<W, T, F>(
    writer: &mut W,
    format: OutputFormat,
    value: &T,
    human_fn: F,
) -> io::Result<()>
where
    W: Write,
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Human => writeln!(writer, "{}", human_fn(value)),
        OutputFormat::Json => {
            serde_json::to_writer(&mut *writer, value).map_err(io::Error::other)?;
            writeln!(writer)
        }
    }
}

/// Errors always go to stderr; JSON mode wraps them in an `error` object.
pub fn print_error(format: OutputFormat, code: &str, message: &str) {
    let mut err = io::stderr().lock();
    match format {
        OutputFormat::Human => {
            let line = render_human_error(message, io::stderr().is_terminal());
            let _ = writeln!(err, "{line}");
        }
        OutputFormat::Json => {
            let obj = serde_json::json!({
                "error": {
                    "code": code,
                    "message": message,
                }
            });
            let _ = serde_json::to_writer(&mut err, &obj);
            let _ = writeln!(err);
        }
    }
}

/// Report a failed command, adding a next step for known sync errors.
pub fn print_anyhow_error(format: OutputFormat, error: &anyhow::Error) {
    let (code, message) = actionable_error(error);
    print_error(format, code, &message);
}

fn actionable_error(error: &anyhow::Error) -> (&'static str, String) {
    let message = format!("{error:#}");
    let Some(sync_err) = error.chain().find_map(|cause| cause.downcast_ref::<SyncError>()) else {
        return ("ERROR", message);
    };

    let hint = match sync_err {
        SyncError::MissingJoinEntry { .. } => {
            Some("Another device wrote assignments without their identity map. Run: containersync backup")
        }
        SyncError::UnresolvedUuid { .. } => Some("Run: containersync sync to recreate missing identities"),
        SyncError::Decode { .. } => Some("Remote state is malformed; inspect or remove the remote state file"),
        _ => None,
    };
    match hint {
        Some(hint) => (sync_err.code(), format!("{message}. {hint}")),
        None => (sync_err.code(), message),
    }
}

fn render_human_error(message: &str, is_tty: bool) -> String {
    if is_tty {
        format!("{ANSI_RED}error:{ANSI_RESET} {message}")
    } else {
        format!("error: {message}")
    }
}
