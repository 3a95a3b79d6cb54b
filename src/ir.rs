use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// `[` + ASCII digits + `]`. `\d` would also accept non-ASCII digits.
pub static MARKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[0-9]+\]").expect("marker regex"));

/// Marker text (brackets included, e.g. `"[5]"`) to replacement text.
pub type MarkerValueMap = HashMap<String, String>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableLocation {
    pub row: usize,
    pub col: usize,
}

/// One marker occurrence discovered on a slide.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TemplateInput {
    #[serde(rename_all = "camelCase")]
    Textbox {
        marker: String,
        marker_number: u64,
        element_name: String,
    },
    #[serde(rename_all = "camelCase")]
    Table {
        marker: String,
        marker_number: u64,
        element_name: String,
        table_location: TableLocation,
    },
}

impl TemplateInput {
    pub fn textbox(marker: &str, element_name: &str) -> Self {
        Self::Textbox {
            marker: marker.to_string(),
            marker_number: extract_marker_number(marker),
            element_name: element_name.to_string(),
        }
    }

    pub fn table(marker: &str, element_name: &str, row: usize, col: usize) -> Self {
        Self::Table {
            marker: marker.to_string(),
            marker_number: extract_marker_number(marker),
            element_name: element_name.to_string(),
            table_location: TableLocation { row, col },
        }
    }

    pub fn marker(&self) -> &str {
        match self {
            Self::Textbox { marker, .. } | Self::Table { marker, .. } => marker,
        }
    }

    pub fn marker_number(&self) -> u64 {
        match self {
            Self::Textbox { marker_number, .. } | Self::Table { marker_number, .. } => {
                *marker_number
            }
        }
    }

    pub fn element_name(&self) -> &str {
        match self {
            Self::Textbox { element_name, .. } | Self::Table { element_name, .. } => element_name,
        }
    }

    pub fn table_location(&self) -> Option<TableLocation> {
        match self {
            Self::Textbox { .. } => None,
            Self::Table { table_location, .. } => Some(*table_location),
        }
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Self::Table { .. })
    }

    /// Location key: the element name for textboxes, `name:row:col` for table cells.
    pub fn input_id(&self) -> String {
        match self {
            Self::Textbox { element_name, .. } => element_name.clone(),
            Self::Table {
                element_name,
                table_location,
                ..
            } => format!(
                "{}:{}:{}",
                element_name, table_location.row, table_location.col
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub slide_number: usize,
    pub inputs: Vec<TemplateInput>,
}

impl ExtractionResult {
    /// Marker texts in result order, duplicates included.
    pub fn markers(&self) -> Vec<&str> {
        self.inputs.iter().map(|i| i.marker()).collect()
    }
}

/// `"[5]"` -> 5. Unparsable digits (overflow) yield 0.
pub fn extract_marker_number(marker: &str) -> u64 {
    let digits: String = marker
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u64>().unwrap_or(0)
}

pub fn find_markers(text: &str) -> impl Iterator<Item = &str> {
    MARKER_RE.find_iter(text).map(|m| m.as_str())
}
