use std::path::{Path, PathBuf};

use log::warn;

use crate::error::{EngineError, Result};

/// Root for per-job working files (uploaded template, intermediate and filled outputs).
#[derive(Clone, Debug)]
pub struct JobStore {
    base: PathBuf,
}

/// One job's directory. The engine never deletes anything here; the caller calls
/// [`JobDir::cleanup`] when the workflow is done.
#[derive(Clone, Debug)]
pub struct JobDir {
    id: String,
    dir: PathBuf,
}

impl JobStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// `<tmp>/templates` on serverless hosts (only `/tmp` is writable there),
    /// `<cwd>/tmp/templates` otherwise.
    pub fn from_env() -> Self {
        let serverless = std::env::var_os("VERCEL").is_some()
            || std::env::var_os("AWS_LAMBDA_FUNCTION_NAME").is_some();
        let base = if serverless {
            std::env::temp_dir().join("templates")
        } else {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join("tmp")
                .join("templates")
        };
        Self::new(base)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn new_job_id() -> String {
        format!("temp-{}", uuid::Uuid::now_v7().simple())
    }

    /// Directory for `job_id`, created if missing.
    pub fn ensure(&self, job_id: &str) -> Result<JobDir> {
        let dir = self.base.join(sanitize_filename(job_id));
        std::fs::create_dir_all(&dir).map_err(|e| EngineError::io(&dir, e))?;
        Ok(JobDir {
            id: job_id.to_string(),
            dir,
        })
    }

    /// Existing directory for `job_id`, without creating it.
    pub fn job(&self, job_id: &str) -> JobDir {
        JobDir {
            id: job_id.to_string(),
            dir: self.base.join(sanitize_filename(job_id)),
        }
    }
}

impl JobDir {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn file_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(sanitize_filename(file_name))
    }

    pub fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| EngineError::io(&self.dir, e))?;
        let path = self.file_path(file_name);
        std::fs::write(&path, bytes).map_err(|e| EngineError::io(&path, e))?;
        Ok(path)
    }

    pub fn read(&self, file_name: &str) -> Result<Vec<u8>> {
        let path = self.file_path(file_name);
        if !path.is_file() {
            return Err(EngineError::NotFound(path));
        }
        std::fs::read(&path).map_err(|e| EngineError::io(&path, e))
    }

    pub fn exists(&self, file_name: &str) -> bool {
        self.file_path(file_name).is_file()
    }

    /// File names in the job directory, sorted; empty if the directory is gone.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let rd = std::fs::read_dir(&self.dir).map_err(|e| EngineError::io(&self.dir, e))?;
        let mut names = Vec::new();
        for ent in rd {
            let ent = ent.map_err(|e| EngineError::io(&self.dir, e))?;
            names.push(ent.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    pub fn cleanup(&self) -> Result<()> {
        if !self.dir.exists() {
            return Ok(());
        }
        std::fs::remove_dir_all(&self.dir).map_err(|e| EngineError::io(&self.dir, e))
    }

    /// Like [`JobDir::cleanup`], but failures are only logged.
    pub fn cleanup_quietly(&self) {
        if let Err(e) = self.cleanup() {
            warn!("cleanup job {}: {e}", self.id);
        }
    }
}

fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => out.push('_'),
            _ => out.push(ch),
        }
    }
    if out == "." || out == ".." {
        out = out.replace('.', "_");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_files_round_trip_and_cleanup() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = JobStore::new(tmp.path());
        let job = store.ensure("job-1").expect("ensure");
        assert!(job.path().is_dir());

        job.save("b.pptx", b"bb").expect("save");
        job.save("a.pptx", b"a").expect("save");
        assert!(job.exists("a.pptx"));
        assert_eq!(job.read("b.pptx").expect("read"), b"bb");
        assert_eq!(job.list().expect("list"), vec!["a.pptx", "b.pptx"]);

        job.cleanup().expect("cleanup");
        assert!(!job.path().exists());
        assert!(job.list().expect("list").is_empty());
        job.cleanup().expect("second cleanup is a no-op");
    }

    #[test]
    fn reading_a_missing_file_is_not_found() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let job = JobStore::new(tmp.path()).ensure("j").expect("ensure");
        assert!(matches!(job.read("nope.pptx"), Err(EngineError::NotFound(_))));
    }

    #[test]
    fn names_cannot_escape_the_job_directory() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = JobStore::new(tmp.path());
        let job = store.ensure("../evil").expect("ensure");
        assert!(job.path().starts_with(tmp.path()));
        assert_eq!(job.file_path("../../x.pptx"), job.path().join(".._.._x.pptx"));
        assert_eq!(store.job("..").path(), tmp.path().join("__"));
    }

    #[test]
    fn job_ids_are_unique() {
        let a = JobStore::new_job_id();
        let b = JobStore::new_job_id();
        assert!(a.starts_with("temp-"));
        assert_ne!(a, b);
    }
}
