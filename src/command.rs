use crate::operator::Operator;
use std::path::Path;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Exit code of a child whose program could not be executed.
pub const EXIT_NOT_FOUND: ExitCode = 127;

/// Exit code for user and configuration errors (`cd` misuse, same in/out file).
pub const EXIT_USAGE: ExitCode = 2;

/// Exit code of a child that could not open one of its redirection files.
pub const EXIT_OPEN_FAILED: ExitCode = 1;

/// One simple command: the executable name followed by its options.
///
/// The strings are borrowed from the token sequence of the line being parsed,
/// which outlives every command built from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command<'a> {
    argv: Vec<&'a str>,
}

impl<'a> Command<'a> {
    /// Builds a command from a finished argument vector.
    ///
    /// Returns `None` for an empty vector, since index 0 is the executable.
    pub fn new(argv: Vec<&'a str>) -> Option<Self> {
        if argv.is_empty() {
            None
        } else {
            Some(Self { argv })
        }
    }

    pub fn program(&self) -> &'a str {
        self.argv[0]
    }

    pub fn args(&self) -> &[&'a str] {
        &self.argv[1..]
    }

    pub fn argv(&self) -> &[&'a str] {
        &self.argv
    }
}

/// Commands connected by `|`, in stage order.
///
/// The output of stage `i` feeds the input of stage `i + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline<'a> {
    stages: Vec<Command<'a>>,
}

impl<'a> Pipeline<'a> {
    pub fn new(first: Command<'a>) -> Self {
        Self {
            stages: vec![first],
        }
    }

    pub fn push(&mut self, stage: Command<'a>) {
        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[Command<'a>] {
        &self.stages
    }
}

/// Files substituted for standard input and output of a whole pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redirections<'a> {
    pub input: Option<&'a str>,
    pub output: Option<&'a str>,
}

impl Redirections<'_> {
    pub fn is_empty(&self) -> bool {
        self.input.is_none() && self.output.is_none()
    }

    /// Whether input and output name the same file.
    ///
    /// Paths are compared as written and, when both exist, after resolving
    /// them against the current working directory.
    pub fn same_file(&self) -> bool {
        let (Some(input), Some(output)) = (self.input, self.output) else {
            return false;
        };
        if input == output {
            return true;
        }
        match (
            Path::new(input).canonicalize(),
            Path::new(output).canonicalize(),
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

/// The unit that connectors join: a builtin invocation or a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chain<'a> {
    /// A builtin name and its options. Builtins are never piped or redirected.
    Builtin { name: &'a str, args: Vec<&'a str> },
    /// A pipeline of one or more external commands with optional redirection.
    Pipeline {
        pipeline: Pipeline<'a>,
        redirections: Redirections<'a>,
    },
}

/// The operator separating one chain from the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    /// `&` or `&&`: the next chain runs only after success.
    And,
    /// `||`: the next chain runs only after failure.
    Or,
    /// `;`: the next chain always runs.
    Sequence,
}

impl Connector {
    pub fn from_operator(op: Operator) -> Option<Self> {
        match op {
            Operator::Ampersand | Operator::And => Some(Connector::And),
            Operator::Or => Some(Connector::Or),
            Operator::Sequence => Some(Connector::Sequence),
            Operator::RedirectIn | Operator::RedirectOut | Operator::Pipe => None,
        }
    }

    /// Whether the chain following this connector may run, given the exit
    /// status left by the chain before it.
    pub fn allows(self, last_status: ExitCode) -> bool {
        match self {
            Connector::And => last_status == 0,
            Connector::Or => last_status != 0,
            Connector::Sequence => true,
        }
    }
}
