//! A small command-line shell.
//!
//! A line is split into tokens, then walked chain by chain: each chain is
//! either a builtin (`exit`, `status`, `cd`) or a pipeline of external
//! programs with optional `<file` / `>file` redirection, and chains are joined
//! by `&&` (or `&`), `||` and `;`. Every chain runs to completion before the
//! next one is parsed, and the exit status it leaves behind decides whether
//! the next one runs at all.
//!
//! The main entry point is [`Interpreter`], which owns the exit status carried
//! between lines. The parser and the data model in [`command`] are usable on
//! their own, without spawning anything.

mod builtin;
pub mod command;
pub mod env;
mod external;
pub mod input;
mod interpreter;
pub mod lexer;
pub mod operator;
pub mod parser;

pub use builtin::{default_builtins, Builtin};
pub use interpreter::{Flow, Interpreter};
pub use parser::ParsingError;
