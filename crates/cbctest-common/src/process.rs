//! Exit status conventions shared by every external program the harness runs.

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

/// Offset added to the signal number of a killed process, as shells do.
pub const SIGNAL_EXIT_BASE: i32 = 128;

/// Exit code as a shell would report it: `128 + signal` for a killed process.
#[must_use]
pub fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| status.signal().map_or(-1, |signal| SIGNAL_EXIT_BASE + signal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_exit_keeps_its_code() {
        assert_eq!(exit_code(ExitStatus::from_raw(0)), 0);
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
    }

    #[test]
    fn killed_process_reports_shell_style_code() {
        assert_eq!(exit_code(ExitStatus::from_raw(9)), 137);
        assert_eq!(exit_code(ExitStatus::from_raw(15)), 143);
    }
}
