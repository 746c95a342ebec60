use crate::command::{Chain, Command, Connector, Pipeline, Redirections};
use crate::lexer::LexingError;
use crate::operator::{is_operator, Operator};
use std::fmt;

/// Errors that can occur while matching a token sequence against the grammar.
///
/// Any of these makes the whole input line invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    /// Encountered a token that was not expected at the current position according to the grammar.
    UnexpectedToken(String),
    /// Reached the end of the token stream where a command was required.
    UnexpectedEnd,
    /// A redirection operator was not followed by a filename.
    MissingFilename(Operator),
    /// The line could not even be tokenized.
    Lexing(LexingError),
}

impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParsingError::UnexpectedToken(token) => write!(f, "unexpected token `{token}`"),
            ParsingError::UnexpectedEnd => f.write_str("unexpected end of line"),
            ParsingError::MissingFilename(op) => write!(f, "expected a filename after `{op}`"),
            ParsingError::Lexing(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ParsingError {}

impl From<LexingError> for ParsingError {
    fn from(err: LexingError) -> Self {
        ParsingError::Lexing(err)
    }
}

/// Recursive-descent parser over the tokens of one input line.
///
/// The parser never runs anything. The caller alternates between
/// [`Parser::parse_chain`] and [`Parser::parse_connector`], executing each
/// chain before asking for the next one, which keeps evaluation single-pass
/// and left to right:
///
/// ```text
/// inputline    ::= chain OP inputline | chain | ε
/// chain        ::= BUILTIN options | pipeline redirections
/// pipeline     ::= command '|' pipeline | command
/// command      ::= executable options
/// redirections ::= '<' filename ('>' filename)? | '>' filename ('<' filename)? | ε
/// ```
pub struct Parser<'a, F> {
    tokens: &'a [String],
    pos: usize,
    is_builtin: F,
}

impl<'a, F> Parser<'a, F>
where
    F: Fn(&str) -> bool,
{
    /// `is_builtin` decides which executable names start a builtin chain.
    pub fn new(tokens: &'a [String], is_builtin: F) -> Self {
        Self {
            tokens,
            pos: 0,
            is_builtin,
        }
    }

    /// True once every token has been consumed.
    pub fn is_finished(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Fails with the first unconsumed token, if any.
    pub fn expect_finished(&self) -> Result<(), ParsingError> {
        match self.peek() {
            Some(token) => Err(ParsingError::UnexpectedToken(token.to_string())),
            None => Ok(()),
        }
    }

    /// Parse a chain: a builtin with its options, or a pipeline with redirections.
    pub fn parse_chain(&mut self) -> Result<Chain<'a>, ParsingError> {
        if let Some(name) = self.peek().filter(|token| (self.is_builtin)(*token)) {
            self.pos += 1;
            let args = self.parse_options();
            return Ok(Chain::Builtin { name, args });
        }

        let pipeline = self.parse_pipeline()?;
        let redirections = self.parse_redirections()?;
        Ok(Chain::Pipeline {
            pipeline,
            redirections,
        })
    }

    /// Consumes the connector after a chain, if the next token is one.
    ///
    /// Returns `None` without consuming anything otherwise, which ends the line.
    pub fn parse_connector(&mut self) -> Option<Connector> {
        let connector = self
            .peek()
            .and_then(Operator::classify)
            .and_then(Connector::from_operator)?;
        self.pos += 1;
        Some(connector)
    }

    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    fn consume(&mut self) -> Option<&'a str> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Consumes the next token if it is `op`.
    fn accept(&mut self, op: Operator) -> bool {
        if self.peek() == Some(op.as_str()) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Parse a pipeline: command ('|' command)*
    fn parse_pipeline(&mut self) -> Result<Pipeline<'a>, ParsingError> {
        let mut pipeline = Pipeline::new(self.parse_command()?);
        while self.accept(Operator::Pipe) {
            pipeline.push(self.parse_command()?);
        }
        Ok(pipeline)
    }

    /// Parse a command: executable options
    fn parse_command(&mut self) -> Result<Command<'a>, ParsingError> {
        let executable = match self.peek() {
            None => return Err(ParsingError::UnexpectedEnd),
            Some(token) if is_operator(token) => {
                return Err(ParsingError::UnexpectedToken(token.to_string()));
            }
            Some(token) => token,
        };
        self.pos += 1;

        let mut argv = vec![executable];
        argv.extend(self.parse_options());
        Command::new(argv).ok_or(ParsingError::UnexpectedEnd)
    }

    /// Everything up to the next operator or the end of the line.
    fn parse_options(&mut self) -> Vec<&'a str> {
        let mut options = Vec::new();
        while let Some(token) = self.peek().filter(|token| !is_operator(token)) {
            options.push(token);
            self.pos += 1;
        }
        options
    }

    /// Parse at most one input and one output redirection, in either order.
    fn parse_redirections(&mut self) -> Result<Redirections<'a>, ParsingError> {
        let mut redirections = Redirections::default();
        if self.accept(Operator::RedirectIn) {
            redirections.input = Some(self.parse_filename(Operator::RedirectIn)?);
            if self.accept(Operator::RedirectOut) {
                redirections.output = Some(self.parse_filename(Operator::RedirectOut)?);
            }
        } else if self.accept(Operator::RedirectOut) {
            redirections.output = Some(self.parse_filename(Operator::RedirectOut)?);
            if self.accept(Operator::RedirectIn) {
                redirections.input = Some(self.parse_filename(Operator::RedirectIn)?);
            }
        }
        Ok(redirections)
    }

    fn parse_filename(&mut self, after: Operator) -> Result<&'a str, ParsingError> {
        match self.peek() {
            Some(token) if !is_operator(token) => {
                self.consume();
                Ok(token)
            }
            _ => Err(ParsingError::MissingFilename(after)),
        }
    }
}
