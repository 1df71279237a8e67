// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::ids::RowKey;

pub const DEFAULT_COLOR: &str = "#ffffff";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    Codes,
    UrlName,
    ColorId,
}

impl Field {
    pub const ALL: [Self; 3] = [Self::Codes, Self::UrlName, Self::ColorId];

    /// 1-based spreadsheet column holding this field.
    pub const fn column(self) -> u8 {
        match self {
            Self::Codes => 1,
            Self::UrlName => 2,
            Self::ColorId => 3,
        }
    }

    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Codes => "Codes",
            Self::UrlName => "UrlName",
            Self::ColorId => "ColorId",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Codes => "code",
            Self::UrlName => "URL name",
            Self::ColorId => "color",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which fields the add/edit forms expose and require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormProfile {
    /// A bare list of codes.
    Simple,
    /// Codes with a landing-page name and a color tag.
    Rich,
}

impl FormProfile {
    pub fn fields(self) -> &'static [Field] {
        match self {
            Self::Simple => &[Field::Codes],
            Self::Rich => &Field::ALL,
        }
    }

    pub fn requires(self, field: Field) -> bool {
        match (self, field) {
            (_, Field::Codes) => true,
            (Self::Rich, Field::UrlName) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFields {
    #[serde(rename = "Codes", deserialize_with = "cell_text")]
    pub codes: String,
    #[serde(
        rename = "UrlName",
        default,
        deserialize_with = "optional_cell_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub url_name: Option<String>,
    #[serde(
        rename = "ColorId",
        default,
        deserialize_with = "optional_cell_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub color_id: Option<String>,
}

impl RowFields {
    pub fn new(codes: impl Into<String>) -> Self {
        Self {
            codes: codes.into(),
            url_name: None,
            color_id: None,
        }
    }

    pub fn with_url_name(mut self, url_name: impl Into<String>) -> Self {
        self.set(Field::UrlName, url_name.into());
        self
    }

    pub fn with_color(mut self, color_id: impl Into<String>) -> Self {
        self.set(Field::ColorId, color_id.into());
        self
    }

    /// Missing optional fields read as the empty string.
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Codes => &self.codes,
            Field::UrlName => self.url_name.as_deref().unwrap_or_default(),
            Field::ColorId => self.color_id.as_deref().unwrap_or_default(),
        }
    }

    pub fn set(&mut self, field: Field, value: String) {
        match field {
            Field::Codes => self.codes = value,
            Field::UrlName => self.url_name = non_empty(value),
            Field::ColorId => self.color_id = non_empty(value),
        }
    }
}

/// One row as last loaded from a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: RowKey,
    pub fields: RowFields,
    /// Only set by backends that track per-row versions.
    pub version: Option<u64>,
}

impl Row {
    pub fn new(key: RowKey, fields: RowFields) -> Self {
        Self {
            key,
            fields,
            version: None,
        }
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: Field,
    pub value: String,
}

/// The fields of a row that differ from a loaded snapshot, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowPatch {
    changes: Vec<FieldChange>,
}

impl RowPatch {
    pub fn diff(before: &RowFields, after: &RowFields) -> Self {
        let changes = Field::ALL
            .into_iter()
            .filter(|field| before.get(*field) != after.get(*field))
            .map(|field| FieldChange {
                field,
                value: after.get(field).to_owned(),
            })
            .collect();
        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn changes(&self) -> &[FieldChange] {
        &self.changes
    }

    pub fn fields(&self) -> Vec<Field> {
        self.changes.iter().map(|change| change.field).collect()
    }

    pub fn value(&self, field: Field) -> Option<&str> {
        self.changes
            .iter()
            .find(|change| change.field == field)
            .map(|change| change.value.as_str())
    }

    pub fn apply_to(&self, fields: &RowFields) -> RowFields {
        let mut merged = fields.clone();
        for change in &self.changes {
            merged.set(change.field, change.value.clone());
        }
        merged
    }
}

/// Parses `#rrggbb` (or `#rgb`) into its components. Anything else is `None`.
pub fn parse_hex_color(value: &str) -> Option<(u8, u8, u8)> {
    let hex = value.trim().strip_prefix('#')?;
    if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        6 => Some((
            u8::from_str_radix(&hex[0..2], 16).ok()?,
            u8::from_str_radix(&hex[2..4], 16).ok()?,
            u8::from_str_radix(&hex[4..6], 16).ok()?,
        )),
        3 => {
            let mut parts = hex.chars().map(|ch| {
                let nibble = ch.to_digit(16).unwrap_or_default() as u8;
                nibble * 17
            });
            Some((parts.next()?, parts.next()?, parts.next()?))
        }
        _ => None,
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

// Spreadsheet-backed services hand back numeric cells as JSON numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Cell {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl Cell {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Integer(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
            Self::Bool(value) => value.to_string(),
        }
    }
}

fn cell_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Cell::deserialize(deserializer).map(Cell::into_text)
}

fn optional_cell_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let cell = Option::<Cell>::deserialize(deserializer)?;
    Ok(cell.map(Cell::into_text).and_then(non_empty))
}
