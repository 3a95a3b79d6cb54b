use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{EngineError, Result};

/// Flattened XML event. Declarations, comments and processing instructions are dropped;
/// this list is only ever read, the raw part text is what gets rewritten.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlEvent {
    Start {
        name: String,
        attrs: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    Empty {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text {
        text: String,
    },
}

#[derive(Clone, Debug)]
pub struct XmlPart {
    pub name: String,
    pub events: Vec<XmlEvent>,
}

impl XmlPart {
    /// Index of the `End` event closing the element that starts at `start`.
    /// `Empty` elements close themselves.
    pub fn matching_end(&self, start: usize) -> Option<usize> {
        match self.events.get(start)? {
            XmlEvent::Empty { .. } => return Some(start),
            XmlEvent::Start { .. } => {}
            _ => return None,
        }
        let mut depth = 0usize;
        for (idx, ev) in self.events.iter().enumerate().skip(start) {
            match ev {
                XmlEvent::Start { .. } => depth += 1,
                XmlEvent::End { .. } => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(idx);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

pub fn parse_xml_part(name: &str, xml_bytes: &[u8]) -> Result<XmlPart> {
    let mut reader = Reader::from_reader(xml_bytes);
    reader.config_mut().trim_text(false);

    let mut events: Vec<XmlEvent> = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let ev = reader
            .read_event_into(&mut buf)
            .map_err(|e| EngineError::xml(name, e))?;
        match ev {
            Event::Eof => break,
            Event::Start(s) => {
                events.push(XmlEvent::Start {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(name, &s)?,
                });
            }
            Event::End(e) => {
                events.push(XmlEvent::End {
                    name: bytes_to_string(e.name().as_ref()),
                });
            }
            Event::Empty(s) => {
                events.push(XmlEvent::Empty {
                    name: bytes_to_string(s.name().as_ref()),
                    attrs: collect_attrs(name, &s)?,
                });
            }
            Event::Text(t) => {
                let text = t
                    .unescape()
                    .map_err(|e| EngineError::xml(name, e))?
                    .into_owned();
                events.push(XmlEvent::Text { text });
            }
            Event::CData(t) => {
                events.push(XmlEvent::Text {
                    text: bytes_to_string(t.into_inner()),
                });
            }
            _ => {}
        }
    }

    Ok(XmlPart {
        name: name.to_string(),
        events,
    })
}

fn collect_attrs(part: &str, s: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    for a in s.attributes() {
        let a = a.map_err(|e| EngineError::xml(part, e))?;
        let key = bytes_to_string(a.key.as_ref());
        let val = a
            .unescape_value()
            .map_err(|e| EngineError::xml(part, e))?
            .into_owned();
        attrs.push((key, val));
    }
    Ok(attrs)
}

fn bytes_to_string(bytes: impl AsRef<[u8]>) -> String {
    String::from_utf8_lossy(bytes.as_ref()).into_owned()
}

pub fn find_attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}
