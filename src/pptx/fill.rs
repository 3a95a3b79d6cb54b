use std::collections::HashSet;

use log::{debug, info};

use crate::error::{EngineError, Result};
use crate::ir::{MarkerValueMap, TemplateInput};

use super::package::PptxPackage;
use super::slide::slide_part_name;

/// Escapes the five reserved markup characters; safe in text and attribute values.
pub fn escape_markup(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Replaces marker tokens in raw slide markup, one global literal replace per input.
///
/// Inputs are processed in order and every replace consumes all occurrences of its token, so
/// for a token listed several times the first value wins everywhere. Tokens without a value
/// stay in place. A marker whose characters are split across runs is not a literal substring
/// of the markup and is therefore left untouched.
pub fn substitute_markers(
    xml: &str,
    inputs: &[TemplateInput],
    values: &MarkerValueMap,
) -> (String, usize) {
    let mut out = xml.to_string();
    let mut replaced = 0usize;
    let mut seen: HashSet<&str> = HashSet::new();
    for input in inputs {
        let marker = input.marker();
        let Some(value) = values.get(marker) else {
            continue;
        };
        if !seen.insert(marker) {
            // Already replaced everywhere by an earlier input.
            continue;
        }
        let count = out.matches(marker).count();
        if count == 0 {
            continue;
        }
        out = out.replace(marker, &escape_markup(value));
        debug!("{marker}: {count} occurrence(s) replaced");
        replaced += count;
    }
    (out, replaced)
}

/// Rewrites slide `slide_number` inside `pkg`. Returns the number of replaced occurrences.
pub fn fill_slide(
    pkg: &mut PptxPackage,
    slide_number: usize,
    inputs: &[TemplateInput],
    values: &MarkerValueMap,
) -> Result<usize> {
    let part_name = slide_part_name(slide_number);
    let xml = pkg
        .part_text(&part_name)
        .ok_or(EngineError::SlideNotFound(slide_number))?
        .into_owned();
    let (filled, replaced) = substitute_markers(&xml, inputs, values);
    if replaced > 0 {
        pkg.write_part(&part_name, filled);
    }
    info!(
        "slide {}: {} marker occurrence(s) filled from {} value(s)",
        slide_number,
        replaced,
        values.len()
    );
    Ok(replaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pptx::scan::extract_template_inputs;
    use crate::pptx::slide::tests::{deck, slide, table, textbox};

    fn values(pairs: &[(&str, &str)]) -> MarkerValueMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn escapes_reserved_characters() {
        assert_eq!(
            escape_markup(r#"A & B <C> "D" 'E'"#),
            "A &amp; B &lt;C&gt; &quot;D&quot; &apos;E&apos;"
        );
    }

    #[test]
    fn escaped_value_lands_in_markup() {
        let xml = "<a:t>[1]</a:t>";
        let inputs = vec![TemplateInput::textbox("[1]", "Box")];
        let (out, n) = substitute_markers(xml, &inputs, &values(&[("[1]", r#"A & B <C> "D""#)]));
        assert_eq!(n, 1);
        assert_eq!(out, "<a:t>A &amp; B &lt;C&gt; &quot;D&quot;</a:t>");
        let inner = out.trim_start_matches("<a:t>").trim_end_matches("</a:t>");
        assert!(!inner.contains('<') && !inner.contains('>') && !inner.contains('"'));
    }

    #[test]
    fn marker_is_matched_literally() {
        let xml = "<a:t>[1] [11] [1]1</a:t>";
        let inputs = vec![TemplateInput::textbox("[1]", "Box")];
        let (out, n) = substitute_markers(xml, &inputs, &values(&[("[1]", "$0 x")]));
        assert_eq!(n, 2);
        assert_eq!(out, "<a:t>$0 x [11] $0 x1</a:t>");
    }

    #[test]
    fn missing_values_leave_markers_in_place() {
        let xml = "<a:t>[1]</a:t><a:t>[2]</a:t>";
        let inputs = vec![
            TemplateInput::textbox("[1]", "A"),
            TemplateInput::textbox("[2]", "B"),
        ];
        let (out, n) = substitute_markers(xml, &inputs, &values(&[("[1]", "one"), ("[9]", "x")]));
        assert_eq!(n, 1);
        assert_eq!(out, "<a:t>one</a:t><a:t>[2]</a:t>");
    }

    #[test]
    fn duplicate_marker_takes_one_value_everywhere() {
        let xml = "<a:t>[3] ... [3]</a:t>";
        let inputs = vec![
            TemplateInput::textbox("[3]", "Box"),
            TemplateInput::textbox("[3]", "Box"),
        ];
        let (out, n) = substitute_markers(xml, &inputs, &values(&[("[3]", "v")]));
        assert_eq!(n, 2);
        assert_eq!(out, "<a:t>v ... v</a:t>");
    }

    #[test]
    fn empty_value_map_leaves_slide_untouched() {
        let mut pkg = deck(&[slide(&[textbox(2, "Box", &["[1]"])])]);
        let before = pkg.part_bytes("ppt/slides/slide1.xml").expect("slide").to_vec();
        let inputs = extract_template_inputs(&pkg, 1).expect("extract").inputs;
        let n = fill_slide(&mut pkg, 1, &inputs, &MarkerValueMap::new()).expect("fill");
        assert_eq!(n, 0);
        assert_eq!(pkg.part_bytes("ppt/slides/slide1.xml"), Some(before.as_slice()));
    }

    #[test]
    fn fills_textbox_and_table_cell() {
        let mut pkg = deck(&[slide(&[
            textbox(2, "Status", &["Status: [5]"]),
            table(3, "Table 1", &[&["[6]"], &[""]]),
        ])]);
        let inputs = extract_template_inputs(&pkg, 1).expect("extract").inputs;
        let n = fill_slide(
            &mut pkg,
            1,
            &inputs,
            &values(&[("[5]", "80%"), ("[6]", "On track")]),
        )
        .expect("fill");
        assert_eq!(n, 2);
        let xml = pkg.part_text("ppt/slides/slide1.xml").expect("slide");
        assert!(xml.contains("<a:t>Status: 80%</a:t>"));
        assert!(xml.contains("<a:t>On track</a:t>"));
    }

    #[test]
    fn missing_slide_part_fails() {
        let mut pkg = deck(&[slide(&[])]);
        let err = fill_slide(&mut pkg, 3, &[], &MarkerValueMap::new())
            .err()
            .expect("should fail");
        assert!(matches!(err, EngineError::SlideNotFound(3)));
    }
}
