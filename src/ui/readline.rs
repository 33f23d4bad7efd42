//! Readline wrapper with ticker symbol completion.

use std::path::PathBuf;

use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::{Hinter, HistoryHinter};
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Config, Context, Editor, Helper};

pub struct SymbolHelper {
    symbols: Vec<String>,
    hinter: HistoryHinter,
}

impl SymbolHelper {
    pub fn new() -> Self {
        Self {
            symbols: Vec::new(),
            hinter: HistoryHinter::default(),
        }
    }

    pub fn set_symbols(&mut self, symbols: &[String]) {
        self.symbols = symbols.to_vec();
    }
}

impl Default for SymbolHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl Helper for SymbolHelper {}
impl Validator for SymbolHelper {}
impl Highlighter for SymbolHelper {}

impl Hinter for SymbolHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &Context<'_>) -> Option<String> {
        self.hinter.hint(line, pos, ctx)
    }
}

impl Completer for SymbolHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let before = &line[..pos];
        let prefix = before.trim_start();
        let start = pos - prefix.len();

        // Menu answers are a single token
        if prefix.is_empty() || prefix.contains(char::is_whitespace) {
            return Ok((start, Vec::new()));
        }

        let prefix_upper = prefix.to_ascii_uppercase();
        let mut matches: Vec<Pair> = self
            .symbols
            .iter()
            .filter(|symbol| symbol.starts_with(&prefix_upper))
            .map(|symbol| Pair {
                display: symbol.clone(),
                replacement: symbol.clone(),
            })
            .collect();

        matches.sort_by(|a, b| a.replacement.cmp(&b.replacement));
        matches.dedup_by(|a, b| a.replacement == b.replacement);

        Ok((start, matches))
    }
}

/// Thin wrapper over `rustyline::Editor` with symbol completion and a history file.
pub struct Readline {
    editor: Editor<SymbolHelper, DefaultHistory>,
    history_path: PathBuf,
}

impl Readline {
    pub fn new(history_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config = Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .build();
        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(SymbolHelper::new()));

        let history_path = history_path.unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".stock-manager/.history")
        });

        let _ = editor.load_history(&history_path);

        Ok(Self {
            editor,
            history_path,
        })
    }

    pub fn readline(&mut self, prompt: &str) -> Result<String, ReadlineError> {
        let line = self.editor.readline(prompt)?;
        if !line.trim().is_empty() {
            let _ = self.editor.add_history_entry(line.as_str());
            let _ = self.editor.append_history(&self.history_path);
        }
        Ok(line)
    }

    pub fn set_symbols(&mut self, symbols: &[String]) {
        if let Some(helper) = self.editor.helper_mut() {
            helper.set_symbols(symbols);
        }
    }

    /// Utility for tests to inspect completions without invoking terminal input.
    pub fn completions(&self, line: &str) -> Vec<String> {
        if let Some(helper) = self.editor.helper() {
            let pos = line.len();
            let history = self.editor.history();
            if let Ok((_, pairs)) = helper.complete(line, pos, &Context::new(history)) {
                return pairs.into_iter().map(|p| p.replacement).collect();
            }
        }
        Vec::new()
    }
}
