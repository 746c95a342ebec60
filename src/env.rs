use crate::command::ExitCode;

/// State that survives from one input line to the next.
///
/// The environment contains:
/// - `last_status`: exit code of the most recently completed foreground unit.
/// - `should_exit`: set by the `exit` builtin; the driver stops reading lines.
///
/// The working directory is not mirrored here: `cd` changes the directory of
/// the shell process itself so that spawned children and relative redirection
/// paths see it.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Consulted by `status`, the short-circuit connectors and `cd` error paths.
    pub last_status: ExitCode,
    /// When set to true, indicates that the rest of the line and the session end.
    pub should_exit: bool,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the exit code of a finished command or builtin.
    pub fn set_status(&mut self, status: ExitCode) {
        self.last_status = status;
    }
}
