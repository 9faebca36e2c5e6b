//! Ordered, case-insensitively unique list of watched symbols

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Watchlist(Vec<String>);

impl Watchlist {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(symbols.into_iter().map(Into::into).collect())
    }

    /// Cleaned copy for a refresh: trimmed, empties dropped, first spelling of
    /// each symbol kept, order preserved.
    pub fn snapshot(&self) -> Vec<String> {
        let mut symbols: Vec<String> = Vec::with_capacity(self.0.len());
        for symbol in self.0.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            if !symbols.iter().any(|seen| seen.eq_ignore_ascii_case(symbol)) {
                symbols.push(symbol.to_string());
            }
        }
        symbols
    }

    /// Replace the stored list with its cleaned form
    pub fn normalise(&mut self) {
        self.0 = self.snapshot();
    }

    pub fn contains(&self, symbol: &str) -> bool {
        let symbol = symbol.trim();
        self.0.iter().any(|s| s.trim().eq_ignore_ascii_case(symbol))
    }

    /// Append `symbol` at the end. Empty or already-present symbols are refused.
    pub fn add(&mut self, symbol: &str) -> bool {
        let symbol = symbol.trim();
        if symbol.is_empty() || self.contains(symbol) {
            return false;
        }
        self.0.push(symbol.to_string());
        true
    }

    /// Remove the first case-insensitive match of `symbol`
    pub fn remove(&mut self, symbol: &str) -> bool {
        let symbol = symbol.trim();
        match self.0.iter().position(|s| s.trim().eq_ignore_ascii_case(symbol)) {
            Some(index) => {
                self.0.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for Watchlist {
    fn from(symbols: Vec<String>) -> Self {
        Self(symbols)
    }
}
