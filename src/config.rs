use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{EngineError, Result};
use crate::generate::MarkerPrompt;
use crate::jobs::JobStore;
use crate::pptx::{Compression, CompressionMode};

pub const CONFIG_FILE_NAME: &str = "deckfill.toml";
pub const CONFIG_ENV: &str = "DECKFILL_CONFIG";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub jobs: JobsSection,
    /// Named form presets; plain data handed to the workflow by the caller.
    #[serde(default)]
    pub presets: HashMap<String, Preset>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct EngineSection {
    /// "deflate" (default), "store" or "preserve".
    #[serde(default)]
    pub compression: Option<CompressionMode>,
    /// Deflate level; only used with `compression = "deflate"`.
    #[serde(default)]
    pub compression_level: Option<i64>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct JobsSection {
    /// Base directory for job working files. Relative paths resolve against the config file.
    #[serde(default)]
    pub tmp_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Preset {
    #[serde(default = "default_slide_number")]
    pub slide_number: usize,
    #[serde(default)]
    pub general_context: String,
    #[serde(default)]
    pub content_prompt: String,
    #[serde(default)]
    pub prompts: Vec<MarkerPrompt>,
}

fn default_slide_number() -> usize {
    1
}

impl AppConfig {
    pub fn compression(&self) -> Compression {
        Compression {
            mode: self.engine.compression.unwrap_or_default(),
            level: self.engine.compression_level,
        }
    }

    pub fn preset(&self, id: &str) -> Option<&Preset> {
        self.presets.get(id)
    }

    /// Job store rooted at `[jobs].tmp_dir`, or the environment default.
    pub fn job_store(&self, config_path: Option<&Path>) -> JobStore {
        match self.jobs.tmp_dir.as_ref() {
            Some(dir) if dir.is_relative() => {
                let base = config_path
                    .and_then(Path::parent)
                    .unwrap_or_else(|| Path::new("."));
                JobStore::new(base.join(dir))
            }
            Some(dir) => JobStore::new(dir.clone()),
            None => JobStore::from_env(),
        }
    }
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

/// `DECKFILL_CONFIG`, then `deckfill.toml` upwards from the working directory, then upwards
/// from the executable's directory.
pub fn find_default_config() -> Option<PathBuf> {
    if let Some(p) = std::env::var_os(CONFIG_ENV) {
        let p = PathBuf::from(p);
        if p.is_file() {
            return Some(p);
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, CONFIG_FILE_NAME, 8) {
            return Some(p);
        }
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, CONFIG_FILE_NAME, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> Result<AppConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
    parse_config(path, &text)
}

pub fn parse_config(path: &Path, text: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(text).map_err(|e| EngineError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    for (id, preset) in &cfg.presets {
        if preset.slide_number == 0 {
            return Err(EngineError::Config {
                path: path.to_path_buf(),
                message: format!("preset {id}: slide_number is 1-based"),
            });
        }
    }
    Ok(cfg)
}

pub(crate) const DEFAULT_CONFIG_TOML: &str = r#"[engine]
# "deflate" (default), "store" (fast, uncompressed) or "preserve" (keep each entry's method)
compression = "deflate"
# compression_level = 6
# output_dir = "out"

[jobs]
# Base directory for per-job working files (default: ./tmp/templates, or <tmp>/templates on
# serverless hosts).
# tmp_dir = "tmp/templates"

# Presets are reusable form values for the template workflow.
[presets.weekly_status]
slide_number = 2
general_context = "Weekly project status report. Short, factual, executive tone."
content_prompt = ""

[[presets.weekly_status.prompts]]
marker = "[1]"
prompt = "Overall status in two bullet points."

[[presets.weekly_status.prompts]]
marker = "[2]"
prompt = "Work completed last week, three short bullet points."
"#;

/// Writes a default `deckfill.toml` into `dir`. An existing file is kept unless `force`.
pub fn init_default_config(dir: &Path, force: bool) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))?;
    let cfg_path = dir.join(CONFIG_FILE_NAME);
    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML).map_err(|e| EngineError::io(&cfg_path, e))?;
    Ok(cfg_path)
}
