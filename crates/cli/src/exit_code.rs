// Consistent exit codes for the containersync CLI.
//
//   0  = success
//   1  = general error
//   2  = usage/argument error
//   10 = sync storage not aligned with itself or with local state
//   11 = stored data could not be decoded
//   12 = config file unreadable

use std::process;

use containersync_engine::config::ConfigError;
use containersync_engine::SyncError;

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    NotAligned = 10,
    Corrupt = 11,
    Config = 12,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(sync_err) = cause.downcast_ref::<SyncError>() {
                return Self::from_sync_code(sync_err.code());
            }
            if cause.downcast_ref::<ConfigError>().is_some() {
                return Self::Config;
            }
        }
        Self::Error
    }

    /// Argument errors exit as `Usage`; `--help` and `--version` succeed.
    pub fn from_clap(err: &clap::Error) -> Self {
        match err.kind() {
            clap::error::ErrorKind::DisplayHelp
            | clap::error::ErrorKind::DisplayVersion
            | clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => Self::Success,
            _ => Self::Usage,
        }
    }

    /// Map a `SyncError::code()` string to an exit code.
    pub fn from_sync_code(code: &str) -> Self {
        match code {
            "MISSING_JOIN_ENTRY" | "UNRESOLVED_UUID" => Self::NotAligned,
            "DECODE" | "INVALID_KEY" => Self::Corrupt,
            _ => Self::Error,
        }
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}
