use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::ir::{ExtractionResult, MarkerValueMap};

/// External producer of replacement text for one marker.
pub trait ValueGenerator {
    fn generate(&self, marker: &str, prompt: &str, context: &str) -> Result<String>;
}

impl<F> ValueGenerator for F
where
    F: Fn(&str, &str, &str) -> Result<String>,
{
    fn generate(&self, marker: &str, prompt: &str, context: &str) -> Result<String> {
        self(marker, prompt, context)
    }
}

/// Serves values from a fixed map; markers outside the map fail to generate.
pub struct StaticValues(pub MarkerValueMap);

impl ValueGenerator for StaticValues {
    fn generate(&self, marker: &str, _prompt: &str, _context: &str) -> Result<String> {
        self.0
            .get(marker)
            .cloned()
            .ok_or_else(|| EngineError::Generation {
                marker: marker.to_string(),
                message: "no value supplied".to_string(),
            })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerPrompt {
    pub marker: String,
    pub prompt: String,
}

#[derive(Clone, Debug, Default)]
pub struct GeneratedValues {
    pub values: MarkerValueMap,
    /// `(marker, message)` for every prompt that produced no value.
    pub failures: Vec<(String, String)>,
}

impl GeneratedValues {
    pub fn failed_markers(&self) -> Vec<&str> {
        self.failures.iter().map(|(m, _)| m.as_str()).collect()
    }
}

/// Context handed to the generator for every marker of one slide.
pub fn slide_context(
    extraction: &ExtractionResult,
    general_context: &str,
    content_prompt: &str,
) -> String {
    let mut combined = String::new();
    if !general_context.is_empty() {
        combined.push_str(general_context);
    }
    if !content_prompt.is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str("\n----\n\nTHE ACTUAL CONTENT TO FILL THE TEXTBOXES FROM:\n\n");
        combined.push_str(content_prompt);
    }

    let mut out = format!(
        "Slide {} of a PowerPoint presentation.\n\
         The content should be professional and suitable for a presentation.\n\
         Markers in the template: {}\n",
        extraction.slide_number,
        extraction.markers().join(", ")
    );
    if !combined.is_empty() {
        out.push_str("\nContext:\n");
        out.push_str(&combined);
    }
    out
}

/// Asks `generator` for each prompt in order. A failed or empty generation leaves that
/// marker without a value, so the fill keeps its literal token.
pub fn generate_values(
    generator: &dyn ValueGenerator,
    prompts: &[MarkerPrompt],
    context: &str,
) -> GeneratedValues {
    let mut out = GeneratedValues::default();
    for p in prompts {
        match generator.generate(&p.marker, &p.prompt, context) {
            Ok(value) => {
                let value = value.trim();
                if value.is_empty() {
                    warn!("{}: generator returned empty text", p.marker);
                    out.failures
                        .push((p.marker.clone(), "empty generation".to_string()));
                } else {
                    out.values.insert(p.marker.clone(), value.to_string());
                }
            }
            Err(e) => {
                warn!("{}: {e}", p.marker);
                out.failures.push((p.marker.clone(), e.to_string()));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::TemplateInput;

    fn prompt(marker: &str, prompt: &str) -> MarkerPrompt {
        MarkerPrompt {
            marker: marker.to_string(),
            prompt: prompt.to_string(),
        }
    }

    #[test]
    fn failures_become_missing_values() {
        let generator = |marker: &str, prompt: &str, _ctx: &str| -> Result<String> {
            if marker == "[2]" {
                Err(EngineError::Generation {
                    marker: marker.to_string(),
                    message: "rate limited".to_string(),
                })
            } else {
                Ok(format!("  {prompt}!  "))
            }
        };
        let out = generate_values(
            &generator,
            &[prompt("[1]", "status"), prompt("[2]", "risks"), prompt("[3]", "")],
            "ctx",
        );
        assert_eq!(out.values.get("[1]").map(String::as_str), Some("status!"));
        assert_eq!(out.values.get("[3]").map(String::as_str), Some("!"));
        assert!(!out.values.contains_key("[2]"));
        assert_eq!(out.failed_markers(), vec!["[2]"]);
    }

    #[test]
    fn static_values_fail_for_unknown_markers() {
        let generator = StaticValues(
            [("[1]".to_string(), "one".to_string())]
                .into_iter()
                .collect(),
        );
        let out = generate_values(&generator, &[prompt("[1]", ""), prompt("[4]", "")], "");
        assert_eq!(out.values.len(), 1);
        assert_eq!(out.failed_markers(), vec!["[4]"]);
    }

    #[test]
    fn context_lists_markers_and_sections() {
        let extraction = ExtractionResult {
            slide_number: 2,
            inputs: vec![
                TemplateInput::textbox("[1]", "A"),
                TemplateInput::table("[2]", "T", 0, 0),
            ],
        };
        let ctx = slide_context(&extraction, "weekly report", "done: ux");
        assert!(ctx.starts_with("Slide 2 of a PowerPoint presentation."));
        assert!(ctx.contains("Markers in the template: [1], [2]"));
        assert!(ctx.contains("Context:\nweekly report\n"));
        assert!(ctx.ends_with("FILL THE TEXTBOXES FROM:\n\ndone: ux"));

        let bare = slide_context(&extraction, "", "");
        assert!(!bare.contains("Context:"));
    }
}
