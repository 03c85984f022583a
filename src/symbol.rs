use lasso::{Key, Spur, ThreadedRodeo};

use crate::error::{GdlError, Result};
use crate::trace::warn;

/// Text of the reserved padding symbol. Brackets never appear in KIF atoms
/// produced by the reader, so it cannot collide with a game symbol.
pub const BLANK_TEXT: &str = "][";

/// Dense integer code of one interned ground atom.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    pub const fn from_raw(raw: u32) -> Self {
        Symbol(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interner mapping atom text to [`Symbol`] codes and back.
///
/// Guarantees:
/// - Codes are handed out densely from zero in first-intern order, so
///   interning the role names first gives role N the code N.
/// - The same text always produces the same code.
/// - The table is only grown while a ruleset is built; afterwards it is
///   shared read-only (behind an `Arc`) by every compiled graph.
pub struct SymbolTable {
    rodeo: ThreadedRodeo,
    blank: Option<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
            blank: None,
        }
    }

    /// Create a table whose first codes are the given roles, in order.
    pub fn with_roles<S: AsRef<str>>(roles: &[S]) -> Self {
        let table = Self::new();
        for role in roles {
            table.intern(role.as_ref());
        }
        table
    }

    /// Intern `text`, returning its code. Idempotent.
    pub fn intern(&self, text: &str) -> Symbol {
        to_symbol(self.rodeo.get_or_intern(text))
    }

    /// Reserve the padding symbol. Call after every rule and fact symbol is known.
    pub fn intern_blank(&mut self) -> Symbol {
        let blank = self.intern(BLANK_TEXT);
        self.blank = Some(blank);
        blank
    }

    pub fn blank(&self) -> Option<Symbol> {
        self.blank
    }

    pub fn is_blank(&self, sym: Symbol) -> bool {
        self.blank == Some(sym)
    }

    /// Text of an interned code. An unused code means the caller mixed
    /// relations from two different tables.
    pub fn lookup(&self, sym: Symbol) -> Result<&str> {
        Spur::try_from_usize(sym.index())
            .and_then(|spur| self.rodeo.try_resolve(&spur))
            .ok_or_else(|| GdlError::UnknownSymbol(format!("#{}", sym.raw())))
    }

    /// Exact lookup without interning.
    pub fn get(&self, text: &str) -> Option<Symbol> {
        self.rodeo.get(text).map(to_symbol)
    }

    /// Lookup that falls back to a case-insensitive match before failing.
    pub fn resolve(&self, text: &str) -> Result<Symbol> {
        if let Some(sym) = self.get(text) {
            return Ok(sym);
        }
        let found = self
            .rodeo
            .iter()
            .find(|(_, candidate)| candidate.eq_ignore_ascii_case(text))
            .map(|(spur, _)| to_symbol(spur));
        match found {
            Some(sym) => {
                warn!(requested = text, "symbol resolved case-insensitively");
                Ok(sym)
            }
            None => {
                warn!(requested = text, "symbol was never interned");
                Err(GdlError::UnknownSymbol(text.to_string()))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rodeo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rodeo.is_empty()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SymbolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolTable")
            .field("len", &self.len())
            .field("blank", &self.blank)
            .finish()
    }
}

fn to_symbol(spur: Spur) -> Symbol {
    Symbol(spur.into_usize() as u32)
}

#[cfg(test)]
#[path = "tests/symbol.rs"]
mod tests;
