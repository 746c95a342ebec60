use crate::builtin::{default_builtins, Builtin};
use crate::command::{Chain, Connector, ExitCode};
use crate::env::Environment;
use crate::external;
use crate::input::LineSource;
use crate::lexer;
use crate::parser::{Parser, ParsingError};
use anyhow::Result;
use log::{debug, info};
use std::io::Write;

/// What the caller should do after a line has been run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line.
    Continue,
    /// The `exit` builtin ran; stop with status 0.
    Exit,
}

/// A shell that parses and runs one input line at a time.
///
/// The interpreter owns the [`Environment`] that carries the exit status from
/// line to line, and the registry of builtins that the parser consults to
/// recognize builtin chains.
///
/// Example
/// ```
/// use chainsh::{Flow, Interpreter};
/// let mut sh = Interpreter::default();
/// let mut out = Vec::new();
/// let flow = sh.run_line_with_output("status", &mut out).unwrap();
/// assert_eq!(flow, Flow::Continue);
/// assert_eq!(out, b"The most recent exit code is: 0\n");
/// ```
pub struct Interpreter {
    env: Environment,
    builtins: Vec<Box<dyn Builtin>>,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of builtins.
    pub fn new(builtins: Vec<Box<dyn Builtin>>) -> Self {
        Self {
            env: Environment::new(),
            builtins,
        }
    }

    /// Exit status of the most recently completed command.
    pub fn last_status(&self) -> ExitCode {
        self.env.last_status
    }

    /// Run one line, writing builtin output to standard output.
    pub fn run_line(&mut self, line: &str) -> Result<Flow> {
        let stdout = std::io::stdout();
        let mut stdout = stdout.lock();
        self.run_line_with_output(line, &mut stdout)
    }

    /// Run one line, writing builtin output and shell diagnostics to `out`.
    ///
    /// Child processes always write to the shell's real standard output.
    /// A syntax error is returned as a [`ParsingError`] (wrapped in
    /// [`anyhow::Error`]) after any chains before it have already run.
    pub fn run_line_with_output(&mut self, line: &str, out: &mut dyn Write) -> Result<Flow> {
        let tokens = lexer::split_into_tokens(line).map_err(ParsingError::from)?;
        debug!("tokens: {tokens:?}");
        self.run_tokens(&tokens, out)
    }

    /// Walks the chains of one line left to right, running or skipping each
    /// one according to the connector before it.
    fn run_tokens(&mut self, tokens: &[String], out: &mut dyn Write) -> Result<Flow> {
        let builtins = &self.builtins;
        let mut parser = Parser::new(tokens, |name: &str| {
            builtins.iter().any(|builtin| builtin.name() == name)
        });
        let mut pending: Option<Connector> = None;

        while !parser.is_finished() {
            let chain = parser.parse_chain()?;
            let eligible = pending.is_none_or(|connector| connector.allows(self.env.last_status));
            debug!("chain {chain:?} eligible={eligible}");

            run_chain(&self.builtins, &mut self.env, &chain, eligible, out)?;
            if self.env.should_exit {
                return Ok(Flow::Exit);
            }

            pending = parser.parse_connector();
            if pending.is_none() {
                break;
            }
        }

        parser.expect_finished()?;
        Ok(Flow::Continue)
    }

    /// Read-Eval-Print Loop over `source` until end of input or `exit`.
    ///
    /// Returns the status the shell process should exit with.
    pub fn repl(&mut self, source: &mut dyn LineSource) -> Result<ExitCode> {
        while let Some(line) = source.read_line()? {
            match self.run_line(&line) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => return Ok(0),
                Err(err) if err.is::<ParsingError>() => {
                    debug!("syntax error: {err}");
                    println!("Error: invalid syntax!");
                    return Ok(1);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(0)
    }
}

/// Runs or skips one parsed chain.
fn run_chain(
    builtins: &[Box<dyn Builtin>],
    env: &mut Environment,
    chain: &Chain<'_>,
    eligible: bool,
    out: &mut dyn Write,
) -> Result<()> {
    match chain {
        Chain::Builtin { name, args } => {
            if let Some(builtin) = builtins.iter().find(|b| b.name() == *name) {
                builtin.invoke(args, eligible, out, env)?;
            }
        }
        Chain::Pipeline {
            pipeline,
            redirections,
        } => {
            if !eligible {
                info!("skipping {:?}", pipeline.stages()[0].program());
                return Ok(());
            }
            if let Some(status) = external::run_pipeline(pipeline, redirections, out)? {
                env.set_status(status);
            }
        }
    }
    out.flush()?;
    Ok(())
}

impl Default for Interpreter {
    /// Create an interpreter with the `exit`, `status` and `cd` builtins.
    fn default() -> Self {
        Self::new(default_builtins())
    }
}
