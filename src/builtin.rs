use crate::command::{ExitCode, EXIT_NOT_FOUND, EXIT_USAGE};
use crate::env::Environment;
use anyhow::Result;
use argh::{EarlyExit, FromArgs};
use log::info;
use std::io::Write;
use std::marker::PhantomData;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and run directly
/// in the shell process. They never take part in a pipeline or redirection.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "status" or "cd".
    fn name() -> &'static str;

    /// Whether the builtin still runs when a connector says its chain must be
    /// skipped.
    fn runs_when_skipped(_env: &Environment) -> bool {
        false
    }

    /// Executes the command, writing user-facing messages to `stdout`.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<()>;
}

/// Object-safe handle on one builtin, as stored by the interpreter.
pub trait Builtin {
    fn name(&self) -> &'static str;

    /// Runs the builtin with the options that followed its name.
    ///
    /// `eligible` is false when the previous connector short-circuits this
    /// chain; the options have been consumed either way.
    fn invoke(
        &self,
        args: &[&str],
        eligible: bool,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<()>;
}

/// Creates the [`Builtin`] handle for a [`BuiltinCommand`] type.
pub(crate) struct Factory<T> {
    _phantom: PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T: BuiltinCommand> Builtin for Factory<T> {
    fn name(&self) -> &'static str {
        T::name()
    }

    fn invoke(
        &self,
        args: &[&str],
        eligible: bool,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<()> {
        if !eligible && !T::runs_when_skipped(env) {
            info!("skipping builtin {}", T::name());
            return Ok(());
        }
        // Everything after the name is an operand, never a flag or `help`.
        let operands: Vec<&str> = std::iter::once("--").chain(args.iter().copied()).collect();
        match T::from_args(&[T::name()], &operands) {
            Ok(cmd) => cmd.execute(stdout, env),
            Err(EarlyExit { output, status }) => {
                stdout.write_all(output.as_bytes())?;
                if status.is_err() {
                    env.set_status(EXIT_USAGE);
                }
                Ok(())
            }
        }
    }
}

/// The builtins every shell starts with: `exit`, `status` and `cd`.
pub fn default_builtins() -> Vec<Box<dyn Builtin>> {
    vec![
        Box::new(Factory::<Exit>::default()),
        Box::new(Factory::<Status>::default()),
        Box::new(Factory::<Cd>::default()),
    ]
}

#[derive(FromArgs)]
/// Exit the shell with status 0, ignoring the rest of the line.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<()> {
        env.should_exit = true;
        Ok(())
    }
}

#[derive(FromArgs)]
/// Print the exit code of the most recent command.
pub struct Status {
    #[argh(positional, greedy)]
    /// ignored
    pub _args: Vec<String>,
}

impl BuiltinCommand for Status {
    fn name() -> &'static str {
        "status"
    }

    /// A failed exec is always reported, even after a short-circuit.
    fn runs_when_skipped(env: &Environment) -> bool {
        env.last_status == EXIT_NOT_FOUND
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<()> {
        writeln!(stdout, "The most recent exit code is: {}", env.last_status)?;
        Ok(())
    }
}

#[derive(FromArgs)]
/// Change the working directory of the shell.
pub struct Cd {
    #[argh(positional, greedy)]
    /// the directory to switch to; only the first one is used.
    pub targets: Vec<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<()> {
        let Some(target) = self.targets.first() else {
            writeln!(stdout, "Error: cd requires folder to navigate to!")?;
            env.set_status(EXIT_USAGE);
            return Ok(());
        };

        let status: ExitCode = match std::env::set_current_dir(target) {
            Ok(()) => {
                info!("changed directory to {target}");
                0
            }
            Err(err) => {
                info!("cd {target}: {err}");
                writeln!(stdout, "Error: cd directory not found!")?;
                EXIT_USAGE
            }
        };
        env.set_status(status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn invoke<T: BuiltinCommand>(
        args: &[&str],
        eligible: bool,
        env: &mut Environment,
    ) -> String {
        let mut out = Vec::new();
        Factory::<T>::default()
            .invoke(args, eligible, &mut out, env)
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn default_registry_names() {
        let names: Vec<_> = default_builtins().iter().map(|b| b.name()).collect();
        assert_eq!(names, vec!["exit", "status", "cd"]);
    }

    #[test]
    fn status_prints_last_code() {
        let mut env = Environment::new();
        env.set_status(3);
        assert_eq!(
            invoke::<Status>(&[], true, &mut env),
            "The most recent exit code is: 3\n"
        );
    }

    #[test]
    fn skipped_status_is_silent_unless_exec_failed() {
        let mut env = Environment::new();
        env.set_status(1);
        assert_eq!(invoke::<Status>(&[], false, &mut env), "");

        env.set_status(EXIT_NOT_FOUND);
        assert_eq!(
            invoke::<Status>(&[], false, &mut env),
            "The most recent exit code is: 127\n"
        );
    }

    #[test]
    fn exit_only_when_eligible() {
        let mut env = Environment::new();
        invoke::<Exit>(&["5"], false, &mut env);
        assert!(!env.should_exit);
        invoke::<Exit>(&["5"], true, &mut env);
        assert!(env.should_exit);
    }

    #[test]
    fn exit_ignores_flag_like_arguments() {
        for args in [&["--help"][..], &["help"], &["-1"], &["-h", "now"]] {
            let mut env = Environment::new();
            let out = invoke::<Exit>(args, true, &mut env);
            assert_eq!(out, "", "exit {args:?}");
            assert!(env.should_exit, "exit {args:?}");
            assert_eq!(env.last_status, 0);
        }
    }

    #[test]
    fn status_ignores_flag_like_arguments() {
        let mut env = Environment::new();
        env.set_status(4);
        assert_eq!(
            invoke::<Status>(&["-v"], true, &mut env),
            "The most recent exit code is: 4\n"
        );
        assert_eq!(env.last_status, 4);
    }

    #[test]
    #[serial]
    fn cd_treats_help_as_a_directory_name() {
        let before = std::env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().canonicalize().unwrap();
        std::fs::create_dir(target.join("help")).unwrap();
        std::env::set_current_dir(&target).unwrap();

        let mut env = Environment::new();
        env.set_status(1);
        let out = invoke::<Cd>(&["help"], true, &mut env);
        let after = std::env::current_dir().unwrap();
        std::env::set_current_dir(&before).unwrap();

        assert_eq!(out, "");
        assert_eq!(after, target.join("help"));
        assert_eq!(env.last_status, 0);
    }

    #[test]
    #[serial]
    fn cd_dash_is_a_missing_directory() {
        let before = std::env::current_dir().unwrap();
        let mut env = Environment::new();
        let out = invoke::<Cd>(&["-"], true, &mut env);
        assert_eq!(out, "Error: cd directory not found!\n");
        assert_eq!(env.last_status, EXIT_USAGE);
        assert_eq!(std::env::current_dir().unwrap(), before);
    }

    #[test]
    #[serial]
    fn cd_without_argument_sets_usage_status() {
        let mut env = Environment::new();
        let before = std::env::current_dir().unwrap();
        let out = invoke::<Cd>(&[], true, &mut env);
        assert_eq!(out, "Error: cd requires folder to navigate to!\n");
        assert_eq!(env.last_status, EXIT_USAGE);
        assert_eq!(std::env::current_dir().unwrap(), before);
    }

    #[test]
    fn cd_to_missing_directory_sets_usage_status() {
        let mut env = Environment::new();
        let out = invoke::<Cd>(&["/nonexistent/dir/xyz"], true, &mut env);
        assert_eq!(out, "Error: cd directory not found!\n");
        assert_eq!(env.last_status, EXIT_USAGE);
    }

    #[test]
    #[serial]
    fn cd_changes_process_directory() {
        let before = std::env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().canonicalize().unwrap();

        let mut env = Environment::new();
        env.set_status(1);
        invoke::<Cd>(&[target.to_str().unwrap(), "ignored"], true, &mut env);
        let after = std::env::current_dir().unwrap();
        std::env::set_current_dir(&before).unwrap();

        assert_eq!(after, target);
        assert_eq!(env.last_status, 0);
    }

    #[test]
    fn skipped_cd_changes_nothing() {
        let mut env = Environment::new();
        env.set_status(1);
        let out = invoke::<Cd>(&[], false, &mut env);
        assert_eq!(out, "");
        assert_eq!(env.last_status, 1);
    }
}
