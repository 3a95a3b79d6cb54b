use std::path::{Path, PathBuf};

use log::info;

use crate::error::{EngineError, Result};
use crate::ir::{ExtractionResult, MarkerValueMap, TemplateInput};
use crate::jobs::JobDir;
use crate::pptx::package::write_output;
use crate::pptx::{self, Compression, PptxPackage};

/// Collaborator-facing entry point for one template file.
///
/// Every call re-reads the template from disk and works on its own in-memory package, so an
/// engine holds no state between calls.
#[derive(Clone, Debug)]
pub struct TemplateEngine {
    template_dir: PathBuf,
    template_file: String,
    output_dir: PathBuf,
    compression: Compression,
}

impl TemplateEngine {
    pub fn new(
        template_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        template_file: impl Into<String>,
    ) -> Self {
        Self {
            template_dir: template_dir.into(),
            template_file: template_file.into(),
            output_dir: output_dir.into(),
            compression: Compression::default(),
        }
    }

    /// Template and output both live in the job's directory.
    pub fn for_job(job: &JobDir, template_file: impl Into<String>) -> Self {
        Self::new(job.path(), job.path(), template_file)
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn template_path(&self) -> PathBuf {
        self.template_dir.join(&self.template_file)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn open(&self) -> Result<PptxPackage> {
        PptxPackage::open(&self.template_path())
    }

    pub fn extract_template_inputs(&self, slide_number: usize) -> Result<ExtractionResult> {
        let pkg = self.open()?;
        pptx::extract_template_inputs(&pkg, slide_number)
    }

    /// Fills the slide and returns the serialized package without touching disk.
    pub fn fill_template_bytes(
        &self,
        slide_number: usize,
        inputs: &[TemplateInput],
        values: &MarkerValueMap,
    ) -> Result<Vec<u8>> {
        let mut pkg = self.open()?;
        pptx::fill_slide(&mut pkg, slide_number, inputs, values)?;
        pkg.serialize(self.compression)
    }

    /// Fills the slide and writes `output_file_name` under the output directory, creating it
    /// when needed. Returns the written path.
    pub fn fill_template(
        &self,
        slide_number: usize,
        inputs: &[TemplateInput],
        values: &MarkerValueMap,
        output_file_name: &str,
    ) -> Result<PathBuf> {
        let bytes = self.fill_template_bytes(slide_number, inputs, values)?;
        let output_path = self.output_dir.join(output_file_name);
        write_output(&output_path, &bytes)?;
        info!("wrote {} ({} bytes)", output_path.display(), bytes.len());
        Ok(output_path)
    }

    pub fn slide_count(&self) -> Result<usize> {
        let pkg = self.open()?;
        Ok(pptx::slide_count(&pkg))
    }
}

/// One step of a multi-slide fill: the values for one slide.
#[derive(Clone, Debug)]
pub struct FillStep {
    pub slide_number: usize,
    pub values: MarkerValueMap,
}

/// Applies `steps` in order as a read-modify-write chain.
///
/// Each step re-opens the previous step's fully serialized output, extracts that slide's
/// markers and fills them. Only the final package is written, to `output_file_name`.
pub fn fill_sequence(
    engine: &TemplateEngine,
    steps: &[FillStep],
    output_file_name: &str,
) -> Result<PathBuf> {
    let template_path = engine.template_path();
    if !template_path.is_file() {
        return Err(EngineError::NotFound(template_path));
    }
    let mut bytes = std::fs::read(&template_path).map_err(|e| EngineError::io(&template_path, e))?;
    for (i, step) in steps.iter().enumerate() {
        let mut pkg = PptxPackage::from_bytes(&template_path, bytes)?;
        let extraction = pptx::extract_template_inputs(&pkg, step.slide_number)?;
        pptx::fill_slide(&mut pkg, step.slide_number, &extraction.inputs, &step.values)?;
        bytes = pkg.serialize(engine.compression)?;
        info!(
            "step {}/{}: slide {} done",
            i + 1,
            steps.len(),
            step.slide_number
        );
    }
    let output_path = engine.output_dir.join(output_file_name);
    write_output(&output_path, &bytes)?;
    Ok(output_path)
}
