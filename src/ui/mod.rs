//! Interactive terminal UI
//!
//! The menu reads answers through [`LineInput`], so the same flows run on a
//! rustyline editor in a terminal and on any `BufRead` in tests or pipes.

pub mod menu;
pub mod readline;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use std::io::{BufRead, IsTerminal, Write};

use crate::services::PortfolioService;
use crate::tickers::SymbolCatalog;

pub use menu::Menu;
pub use readline::Readline;

/// Source of menu answers, one line per prompt.
pub trait LineInput {
    /// Show `prompt` and read one line without its terminator.
    /// `Ok(None)` means the input is exhausted.
    fn read_line(&mut self, prompt: &str, out: &mut dyn Write) -> Result<Option<String>>;

    /// Offer `symbols` for completion on the following prompts
    fn set_symbols(&mut self, _symbols: &[String]) {}
}

impl LineInput for Readline {
    fn read_line(&mut self, prompt: &str, out: &mut dyn Write) -> Result<Option<String>> {
        out.flush()?;
        match self.readline(prompt) {
            Ok(line) => Ok(Some(line)),
            // Ctrl+C abandons the current answer
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(err).context("Failed to read input"),
        }
    }

    fn set_symbols(&mut self, symbols: &[String]) {
        Readline::set_symbols(self, symbols);
    }
}

/// Plain line reader for piped input and tests
pub struct BufReadInput<R> {
    reader: R,
}

impl<R: BufRead> BufReadInput<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineInput for BufReadInput<R> {
    fn read_line(&mut self, prompt: &str, out: &mut dyn Write) -> Result<Option<String>> {
        write!(out, "{}", prompt)?;
        out.flush()?;

        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .context("Failed to read input")?;
        if read == 0 {
            writeln!(out)?;
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// Run the interactive menu on the process terminal.
///
/// Uses rustyline when stdin is a terminal and plain line reads otherwise.
pub fn launch_menu(service: &PortfolioService, catalog: &dyn SymbolCatalog) -> Result<()> {
    let stdout = std::io::stdout();

    if std::io::stdin().is_terminal() {
        let readline = Readline::new(None)?;
        Menu::new(service, catalog, readline, stdout.lock()).run()
    } else {
        let input = BufReadInput::new(std::io::stdin().lock());
        Menu::new(service, catalog, input, stdout.lock()).run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_bufread_input_echoes_prompt_and_strips_newline() {
        let mut input = BufReadInput::new(Cursor::new("first\r\nsecond\n"));
        let mut out = Vec::new();

        assert_eq!(
            input.read_line("A: ", &mut out).unwrap().as_deref(),
            Some("first")
        );
        assert_eq!(
            input.read_line("B: ", &mut out).unwrap().as_deref(),
            Some("second")
        );
        assert_eq!(input.read_line("C: ", &mut out).unwrap(), None);
        assert_eq!(String::from_utf8(out).unwrap(), "A: B: C: \n");
    }
}
