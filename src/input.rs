//! Where input lines come from.

use anyhow::{Context, Result};
use log::debug;
use nix::unistd;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::IsTerminal;
use std::os::fd::{AsFd, AsRawFd};

/// A source of input lines.
pub trait LineSource {
    /// Returns the next line without its terminator, or `None` at end of input.
    fn read_line(&mut self) -> Result<Option<String>>;
}

/// Picks the line editor for a terminal and the raw reader otherwise.
pub fn stdin_source(prompt: &str) -> Result<Box<dyn LineSource>> {
    if std::io::stdin().is_terminal() {
        Ok(Box::new(EditorSource::new(prompt)?))
    } else {
        Ok(Box::new(RawStdin::new(std::io::stdin())))
    }
}

/// Interactive input through `rustyline`. Lines are not added to any history.
pub struct EditorSource {
    editor: DefaultEditor,
    prompt: String,
}

impl EditorSource {
    pub fn new(prompt: &str) -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
            prompt: prompt.to_string(),
        })
    }
}

impl LineSource for EditorSource {
    fn read_line(&mut self) -> Result<Option<String>> {
        loop {
            match self.editor.readline(&self.prompt) {
                Ok(line) => return Ok(Some(line)),
                Err(ReadlineError::Interrupted) => {
                    debug!("line discarded by interrupt");
                }
                Err(ReadlineError::Eof) => return Ok(None),
                Err(err) => return Err(err).context("failed to read input line"),
            }
        }
    }
}

/// Reads a descriptor one byte at a time.
///
/// Nothing past the current newline is consumed, so the remaining input is
/// still there for children that inherit the descriptor.
pub struct RawStdin<F> {
    fd: F,
}

impl<F: AsFd> RawStdin<F> {
    pub fn new(fd: F) -> Self {
        Self { fd }
    }
}

impl<F: AsFd> LineSource for RawStdin<F> {
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match unistd::read(self.fd.as_fd().as_raw_fd(), &mut byte) {
                Ok(0) if line.is_empty() => return Ok(None),
                Ok(0) => break,
                Ok(_) if byte[0] == b'\n' => break,
                Ok(_) => line.push(byte[0]),
                Err(nix::Error::EINTR) => continue,
                Err(err) => return Err(err).context("failed to read standard input"),
            }
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom, Write};

    fn source_with(content: &str) -> RawStdin<std::fs::File> {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        RawStdin::new(file)
    }

    #[test]
    fn reads_lines_until_end_of_input() {
        let mut source = source_with("ls -l\r\n\nstatus");
        assert_eq!(source.read_line().unwrap().as_deref(), Some("ls -l"));
        assert_eq!(source.read_line().unwrap().as_deref(), Some(""));
        assert_eq!(source.read_line().unwrap().as_deref(), Some("status"));
        assert_eq!(source.read_line().unwrap(), None);
    }

    #[test]
    fn leaves_following_lines_unread() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"first\nsecond\n").unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut source = RawStdin::new(file.try_clone().unwrap());

        assert_eq!(source.read_line().unwrap().as_deref(), Some("first"));
        assert_eq!(file.stream_position().unwrap(), "first\n".len() as u64);
    }
}
