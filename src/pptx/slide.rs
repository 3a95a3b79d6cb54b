use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{EngineError, Result};

use super::package::PptxPackage;
use super::xml::{find_attr, parse_xml_part, XmlEvent, XmlPart};

static SLIDE_PART_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ppt/slides/slide([0-9]+)\.xml$").expect("slide part regex"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementKind {
    /// `p:sp` carrying a `p:txBody`.
    Text,
    /// `p:graphicFrame` carrying an `a:tbl`.
    Table,
    Picture,
    Group,
    /// Anything else: connectors, charts, shapes without text.
    Other,
}

#[derive(Clone, Debug)]
pub struct SlideElement {
    pub id: Option<String>,
    pub name: String,
    pub kind: ElementKind,
    /// Event range `[start, end]` in the slide's `XmlPart`.
    pub start: usize,
    pub end: usize,
}

pub struct SlidePart {
    pub number: usize,
    pub part_name: String,
    pub xml: XmlPart,
    /// Document order; shapes inside groups follow their group.
    pub elements: Vec<SlideElement>,
}

impl SlidePart {
    pub fn text_elements(&self) -> impl Iterator<Item = &SlideElement> {
        self.elements.iter().filter(|e| e.kind == ElementKind::Text)
    }

    pub fn table_elements(&self) -> impl Iterator<Item = &SlideElement> {
        self.elements.iter().filter(|e| e.kind == ElementKind::Table)
    }
}

pub fn slide_part_name(slide_number: usize) -> String {
    format!("ppt/slides/slide{slide_number}.xml")
}

pub fn slide_count(pkg: &PptxPackage) -> usize {
    pkg.part_names()
        .filter(|n| SLIDE_PART_RE.is_match(n))
        .count()
}

/// Resolves a 1-based slide number and parses only that slide's markup.
pub fn locate(pkg: &PptxPackage, slide_number: usize) -> Result<SlidePart> {
    if slide_number == 0 {
        return Err(EngineError::SlideNotFound(slide_number));
    }
    let part_name = slide_part_name(slide_number);
    let bytes = pkg
        .part_bytes(&part_name)
        .ok_or(EngineError::SlideNotFound(slide_number))?;
    let xml = parse_xml_part(&part_name, bytes)?;
    let elements = collect_elements(&xml);
    Ok(SlidePart {
        number: slide_number,
        part_name,
        xml,
        elements,
    })
}

struct OpenElement {
    index: usize,
    tag: String,
    id: Option<String>,
    name: Option<String>,
    kind: ElementKind,
}

fn initial_kind(tag: &str) -> Option<ElementKind> {
    match tag {
        "p:sp" | "p:graphicFrame" | "p:cxnSp" => Some(ElementKind::Other),
        "p:pic" => Some(ElementKind::Picture),
        "p:grpSp" => Some(ElementKind::Group),
        _ => None,
    }
}

fn collect_elements(xml: &XmlPart) -> Vec<SlideElement> {
    let mut out: Vec<Option<SlideElement>> = Vec::new();
    let mut stack: Vec<(usize, OpenElement)> = Vec::new();

    for (idx, ev) in xml.events.iter().enumerate() {
        match ev {
            XmlEvent::Start { name, attrs } | XmlEvent::Empty { name, attrs } => {
                let is_empty = matches!(ev, XmlEvent::Empty { .. });
                if let Some(kind) = initial_kind(name) {
                    if !is_empty {
                        // Reserve the slot so output keeps opening order.
                        out.push(None);
                        stack.push((
                            out.len() - 1,
                            OpenElement {
                                index: idx,
                                tag: name.clone(),
                                id: None,
                                name: None,
                                kind,
                            },
                        ));
                    }
                    continue;
                }
                let Some((_, top)) = stack.last_mut() else {
                    continue;
                };
                match name.as_str() {
                    "p:cNvPr" if top.name.is_none() => {
                        top.id = find_attr(attrs, "id").map(str::to_string);
                        top.name = find_attr(attrs, "name").map(str::to_string);
                    }
                    "p:txBody" if top.tag == "p:sp" => top.kind = ElementKind::Text,
                    "a:tbl" if top.tag == "p:graphicFrame" => top.kind = ElementKind::Table,
                    _ => {}
                }
            }
            XmlEvent::End { name } => {
                let closes_top = stack.last().is_some_and(|(_, top)| &top.tag == name);
                if !closes_top {
                    continue;
                }
                if let Some((slot, open)) = stack.pop() {
                    let name = open
                        .name
                        .filter(|n| !n.is_empty())
                        .or_else(|| open.id.clone())
                        .unwrap_or_else(|| format!("element@{}", open.index));
                    out[slot] = Some(SlideElement {
                        id: open.id,
                        name,
                        kind: open.kind,
                        start: open.index,
                        end: idx,
                    });
                }
            }
            XmlEvent::Text { .. } => {}
        }
    }

    out.into_iter().flatten().collect()
}
