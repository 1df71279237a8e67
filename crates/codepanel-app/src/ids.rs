// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a backend addresses one of its rows.
///
/// Spreadsheet proxies count rows from 1, the local REST server uses 0-based
/// array indices, and the sheet-as-API service keys rows by their `Codes`
/// value. The controller never interprets a key; it only hands it back to the
/// backend that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowKey {
    Position(u32),
    Index(usize),
    Code(String),
}

impl RowKey {
    pub fn position(&self) -> Option<u32> {
        match self {
            Self::Position(position) => Some(*position),
            _ => None,
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Code(code) => Some(code),
            _ => None,
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position(position) => write!(f, "row {position}"),
            Self::Index(index) => write!(f, "#{index}"),
            Self::Code(code) => write!(f, "{code:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RowKey;

    #[test]
    fn accessors_only_match_their_variant() {
        let key = RowKey::Position(3);
        assert_eq!(key.position(), Some(3));
        assert_eq!(key.index(), None);
        assert_eq!(key.code(), None);

        let key = RowKey::Code("ABC".to_owned());
        assert_eq!(key.code(), Some("ABC"));
        assert_eq!(key.position(), None);
    }

    #[test]
    fn display_names_the_addressing_scheme() {
        assert_eq!(RowKey::Position(2).to_string(), "row 2");
        assert_eq!(RowKey::Index(0).to_string(), "#0");
        assert_eq!(RowKey::Code("X1".to_owned()).to_string(), "\"X1\"");
    }
}
