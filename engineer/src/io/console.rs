//! Operator-facing terminal I/O.
//!
//! Everything the operator reads or types goes through [`Console`], so steps
//! stay testable with scripted answers. Diagnostics go to `tracing` instead.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

/// Line-oriented conversation with the human operator.
pub trait Console {
    /// Print one block of text followed by a newline.
    fn say(&self, text: &str);

    /// Show `prompt` (if non-empty) and read one line.
    ///
    /// Returns `None` once input is exhausted. The line terminator is removed.
    fn ask(&self, prompt: &str) -> Result<Option<String>>;
}

/// [`Console`] bound to the process's stdin/stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConsole;

impl Console for TerminalConsole {
    fn say(&self, text: &str) {
        println!("{text}");
    }

    fn ask(&self, prompt: &str) -> Result<Option<String>> {
        if !prompt.is_empty() {
            println!("{prompt}");
        }
        io::stdout().flush().context("flush stdout")?;
        read_answer(&mut io::stdin().lock())
    }
}

fn read_answer<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).context("read operator input")?;
    if n == 0 {
        return Ok(None);
    }
    let trimmed = line.strip_suffix('\n').unwrap_or(&line);
    let trimmed = trimmed.strip_suffix('\r').unwrap_or(trimmed);
    Ok(Some(trimmed.to_string()))
}

pub fn red(text: &str) -> String {
    format!("\x1b[31m{text}\x1b[0m")
}

pub fn green(text: &str) -> String {
    format!("\x1b[32m{text}\x1b[0m")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn strips_line_endings_only() {
        let mut input = Cursor::new("  keep spaces  \r\nnext\n");
        assert_eq!(
            read_answer(&mut input).expect("read"),
            Some("  keep spaces  ".to_string())
        );
        assert_eq!(read_answer(&mut input).expect("read"), Some("next".to_string()));
        assert_eq!(read_answer(&mut input).expect("read"), None);
    }

    #[test]
    fn empty_line_is_empty_answer_not_eof() {
        let mut input = Cursor::new("\n");
        assert_eq!(read_answer(&mut input).expect("read"), Some(String::new()));
    }
}
