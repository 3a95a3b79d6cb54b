use std::collections::HashSet;

use base64::Engine as _;
use log::{info, warn};

use crate::config::Preset;
use crate::engine::TemplateEngine;
use crate::error::{EngineError, Result};
use crate::generate::{generate_values, slide_context, MarkerPrompt, ValueGenerator};
use crate::ir::TemplateInput;
use crate::jobs::{JobDir, JobStore};
use crate::pptx::Compression;

/// An uploaded template plus the marker prompts to fill one slide with.
#[derive(Clone, Debug)]
pub struct ProcessRequest {
    pub file_name: String,
    pub file_bytes: Vec<u8>,
    pub slide_number: usize,
    pub general_context: String,
    pub content_prompt: String,
    pub prompts: Vec<MarkerPrompt>,
    /// Fail the whole request when any marker could not be generated.
    pub strict: bool,
}

impl ProcessRequest {
    pub fn from_preset(file_name: &str, file_bytes: Vec<u8>, preset: &Preset) -> Self {
        Self {
            file_name: file_name.to_string(),
            file_bytes,
            slide_number: preset.slide_number,
            general_context: preset.general_context.clone(),
            content_prompt: preset.content_prompt.clone(),
            prompts: preset.prompts.clone(),
            strict: false,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.prompts.is_empty() {
            return Err(EngineError::InvalidRequest(
                "at least one marker-prompt pair is required".to_string(),
            ));
        }
        if !self.file_name.to_ascii_lowercase().ends_with(".pptx") {
            return Err(EngineError::InvalidRequest(format!(
                "invalid file type {:?}, expected a .pptx file",
                self.file_name
            )));
        }
        if self.slide_number == 0 {
            return Err(EngineError::InvalidRequest(
                "slide numbers start at 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct ProcessOutcome {
    pub file_name: String,
    pub bytes: Vec<u8>,
    /// Markers left literal because no value was generated.
    pub unfilled: Vec<String>,
}

impl ProcessOutcome {
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

/// Runs one upload end to end inside a fresh job directory, which is removed afterwards
/// whether or not the request succeeded.
pub fn process_template(
    store: &JobStore,
    request: &ProcessRequest,
    generator: &dyn ValueGenerator,
    compression: Compression,
) -> Result<ProcessOutcome> {
    request.validate()?;
    let job = store.ensure(&JobStore::new_job_id())?;
    let result = run_job(&job, request, generator, compression);
    job.cleanup_quietly();
    if let Err(e) = &result {
        warn!("job {} failed: {e}", job.id());
    }
    result
}

fn run_job(
    job: &JobDir,
    request: &ProcessRequest,
    generator: &dyn ValueGenerator,
    compression: Compression,
) -> Result<ProcessOutcome> {
    let saved = job.save(&request.file_name, &request.file_bytes)?;
    let template_file = saved
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| request.file_name.clone());
    let engine =
        TemplateEngine::for_job(job, template_file.as_str()).with_compression(compression);

    let extraction = engine.extract_template_inputs(request.slide_number)?;
    let context = slide_context(
        &extraction,
        &request.general_context,
        &request.content_prompt,
    );
    let generated = generate_values(generator, &request.prompts, &context);
    if request.strict && !generated.failures.is_empty() {
        return Err(EngineError::Generation {
            marker: generated.failed_markers().join(", "),
            message: "generation failed".to_string(),
        });
    }

    let inputs: Vec<TemplateInput> = extraction
        .inputs
        .iter()
        .filter(|i| generated.values.contains_key(i.marker()))
        .cloned()
        .collect();
    let mut seen = HashSet::new();
    let unfilled: Vec<String> = extraction
        .inputs
        .iter()
        .map(TemplateInput::marker)
        .filter(|m| !generated.values.contains_key(*m) && seen.insert(*m))
        .map(str::to_string)
        .collect();

    let output_file_name = format!("filled-{template_file}");
    let output_path = engine.fill_template(
        request.slide_number,
        &inputs,
        &generated.values,
        &output_file_name,
    )?;
    let bytes = job.read(&output_file_name)?;
    info!(
        "job {}: {} filled, {} left literal ({})",
        job.id(),
        inputs.len(),
        unfilled.len(),
        output_path.display()
    );
    Ok(ProcessOutcome {
        file_name: output_file_name,
        bytes,
        unfilled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, DEFAULT_CONFIG_TOML};
    use crate::pptx::slide::tests::{deck, slide, table, textbox};
    use crate::pptx::PptxPackage;
    use std::path::Path;

    fn template_bytes() -> Vec<u8> {
        deck(&[
            slide(&[textbox(2, "Title", &["Weekly status"])]),
            slide(&[
                textbox(2, "Status", &["Status: [1]"]),
                table(3, "Milestones", &[&["UX", "[2]"]]),
            ]),
        ])
        .serialize(Compression::store())
        .expect("serialize")
    }

    fn request(prompts: &[(&str, &str)]) -> ProcessRequest {
        ProcessRequest {
            file_name: "report.pptx".to_string(),
            file_bytes: template_bytes(),
            slide_number: 2,
            general_context: "weekly".to_string(),
            content_prompt: String::new(),
            prompts: prompts
                .iter()
                .map(|(m, p)| MarkerPrompt {
                    marker: m.to_string(),
                    prompt: p.to_string(),
                })
                .collect(),
            strict: false,
        }
    }

    fn echo(marker: &str, prompt: &str, context: &str) -> Result<String> {
        assert!(context.contains("Markers in the template: [1], [2]"));
        if prompt == "fail" {
            return Err(EngineError::Generation {
                marker: marker.to_string(),
                message: "boom".to_string(),
            });
        }
        Ok(format!("{prompt} & more"))
    }

    fn constant(_marker: &str, _prompt: &str, _context: &str) -> Result<String> {
        Ok("x".to_string())
    }

    fn slide2(outcome: &ProcessOutcome) -> String {
        let pkg = PptxPackage::from_bytes(Path::new("out.pptx"), outcome.bytes.clone())
            .expect("reopen");
        pkg.part_text("ppt/slides/slide2.xml")
            .expect("slide")
            .into_owned()
    }

    #[test]
    fn fills_and_cleans_up() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = JobStore::new(tmp.path());
        let outcome = process_template(
            &store,
            &request(&[("[1]", "green"), ("[2]", "80%")]),
            &echo,
            Compression::store(),
        )
        .expect("process");
        assert_eq!(outcome.file_name, "filled-report.pptx");
        assert!(outcome.unfilled.is_empty());
        let xml = slide2(&outcome);
        assert!(xml.contains("Status: green &amp; more"));
        assert!(xml.contains("80% &amp; more"));
        assert!(!outcome.to_base64().is_empty());
        assert_eq!(std::fs::read_dir(tmp.path()).expect("read dir").count(), 0);
    }

    #[test]
    fn generation_failure_leaves_marker_literal() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = JobStore::new(tmp.path());
        let outcome = process_template(
            &store,
            &request(&[("[1]", "green"), ("[2]", "fail")]),
            &echo,
            Compression::store(),
        )
        .expect("process");
        assert_eq!(outcome.unfilled, vec!["[2]".to_string()]);
        assert!(slide2(&outcome).contains("<a:t>[2]</a:t>"));
    }

    #[test]
    fn preset_drives_the_workflow() {
        let cfg = parse_config(Path::new("deckfill.toml"), DEFAULT_CONFIG_TOML).expect("parse");
        let preset = cfg.preset("weekly_status").expect("preset");
        let req = ProcessRequest::from_preset("report.pptx", template_bytes(), preset);
        assert_eq!(req.slide_number, 2);

        let tmp = tempfile::tempdir().expect("tempdir");
        let outcome = process_template(&JobStore::new(tmp.path()), &req, &echo, Compression::store())
            .expect("process");
        assert!(outcome.unfilled.is_empty());
        let xml = slide2(&outcome);
        assert!(xml.contains("Status: Overall status in two bullet points. &amp; more"));
        assert!(xml.contains("Work completed last week, three short bullet points. &amp; more"));
    }

    #[test]
    fn unfilled_markers_are_listed_once() {
        let bytes = deck(&[slide(&[
            textbox(2, "Status", &["[1] and [01]"]),
            table(3, "Milestones", &[&["[1]"]]),
        ])])
        .serialize(Compression::store())
        .expect("serialize");
        let mut req = request(&[("[2]", "unused")]);
        req.file_bytes = bytes;
        req.slide_number = 1;

        let tmp = tempfile::tempdir().expect("tempdir");
        let store = JobStore::new(tmp.path());
        let outcome =
            process_template(&store, &req, &constant, Compression::store()).expect("process");
        assert_eq!(outcome.unfilled, vec!["[1]".to_string(), "[01]".to_string()]);
    }

    #[test]
    fn strict_requests_fail_and_still_clean_up() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = JobStore::new(tmp.path());
        let mut req = request(&[("[1]", "green"), ("[2]", "fail")]);
        req.strict = true;
        let err = process_template(&store, &req, &echo, Compression::store())
            .err()
            .expect("should fail");
        assert!(matches!(err, EngineError::Generation { ref marker, .. } if marker == "[2]"));
        assert_eq!(std::fs::read_dir(tmp.path()).expect("read dir").count(), 0);
    }

    #[test]
    fn rejects_bad_requests_before_touching_disk() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = JobStore::new(tmp.path().join("jobs"));

        let empty = request(&[]);
        assert!(matches!(
            process_template(&store, &empty, &echo, Compression::store()),
            Err(EngineError::InvalidRequest(_))
        ));

        let mut wrong_type = request(&[("[1]", "x")]);
        wrong_type.file_name = "report.key".to_string();
        assert!(matches!(
            process_template(&store, &wrong_type, &echo, Compression::store()),
            Err(EngineError::InvalidRequest(_))
        ));
        assert!(!tmp.path().join("jobs").exists());
    }

    #[test]
    fn missing_slide_is_reported() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = JobStore::new(tmp.path());
        let mut req = request(&[("[1]", "x")]);
        req.slide_number = 7;
        let err = process_template(&store, &req, &echo, Compression::store())
            .err()
            .expect("should fail");
        assert!(matches!(err, EngineError::SlideNotFound(7)));
    }
}
