use log::{debug, info};

use crate::error::Result;
use crate::ir::{find_markers, ExtractionResult, TemplateInput};

use super::package::PptxPackage;
use super::slide::{locate, SlideElement, SlidePart};
use super::xml::{XmlEvent, XmlPart};

/// Scans slide `slide_number` for `[n]` markers.
///
/// Text elements are visited first, then tables, each in document order; the combined list is
/// then stable-sorted by marker number. Text inside one element (or one table cell) is the
/// concatenation of all its `a:t` runs, so a marker split across runs by formatting is still
/// found. Any failure aborts the whole scan.
pub fn extract_template_inputs(pkg: &PptxPackage, slide_number: usize) -> Result<ExtractionResult> {
    let slide = locate(pkg, slide_number)?;
    let inputs = scan_slide(&slide);
    info!(
        "slide {}: {} template input(s) in {}",
        slide_number,
        inputs.len(),
        slide.part_name
    );
    Ok(ExtractionResult {
        slide_number,
        inputs,
    })
}

pub fn scan_slide(slide: &SlidePart) -> Vec<TemplateInput> {
    let mut inputs: Vec<TemplateInput> = Vec::new();

    for el in slide.text_elements() {
        let text = element_text(&slide.xml, el.start, el.end);
        for marker in find_markers(&text) {
            debug!("textbox {:?}: {}", el.name, marker);
            inputs.push(TemplateInput::textbox(marker, &el.name));
        }
    }

    for el in slide.table_elements() {
        for (row, col, text) in table_cells(&slide.xml, el) {
            for marker in find_markers(&text) {
                debug!("table {:?} ({row}, {col}): {}", el.name, marker);
                inputs.push(TemplateInput::table(marker, &el.name, row, col));
            }
        }
    }

    // `sort_by_key` is stable: equal marker numbers keep discovery order.
    inputs.sort_by_key(|i| i.marker_number());
    inputs
}

/// Concatenated content of every `a:t` between events `start` and `end`.
fn element_text(xml: &XmlPart, start: usize, end: usize) -> String {
    let mut text = String::new();
    let mut in_t = false;
    for ev in &xml.events[start..=end] {
        match ev {
            XmlEvent::Start { name, .. } if name == "a:t" => in_t = true,
            XmlEvent::End { name } if name == "a:t" => in_t = false,
            XmlEvent::Text { text: t } if in_t => text.push_str(t),
            _ => {}
        }
    }
    text
}

/// `(row, col, text)` for each `a:tc`, zero-based in document order.
fn table_cells(xml: &XmlPart, table: &SlideElement) -> Vec<(usize, usize, String)> {
    let mut cells = Vec::new();
    let mut row: Option<usize> = None;
    let mut next_row = 0usize;
    let mut col = 0usize;

    let mut idx = table.start;
    while idx <= table.end {
        match &xml.events[idx] {
            XmlEvent::Start { name, .. } if name == "a:tr" => {
                row = Some(next_row);
                next_row += 1;
                col = 0;
            }
            XmlEvent::Empty { name, .. } if name == "a:tr" => {
                next_row += 1;
            }
            XmlEvent::End { name } if name == "a:tr" => row = None,
            XmlEvent::Start { name, .. } if name == "a:tc" => {
                let cell_end = xml.matching_end(idx).unwrap_or(table.end);
                if let Some(r) = row {
                    cells.push((r, col, element_text(xml, idx, cell_end)));
                }
                col += 1;
                idx = cell_end;
            }
            XmlEvent::Empty { name, .. } if name == "a:tc" => col += 1,
            _ => {}
        }
        idx += 1;
    }
    cells
}
