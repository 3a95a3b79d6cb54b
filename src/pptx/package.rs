use std::borrow::Cow;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{EngineError, Result};

/// How entries are compressed when the package is written back out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionMode {
    /// Each entry keeps the method it was read with.
    Preserve,
    /// No compression at all.
    Store,
    #[default]
    Deflate,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Compression {
    pub mode: CompressionMode,
    /// Deflate level; ignored for the other modes.
    pub level: Option<i64>,
}

impl Compression {
    pub fn store() -> Self {
        Self {
            mode: CompressionMode::Store,
            level: None,
        }
    }

    fn method_for(&self, original: CompressionMethod) -> CompressionMethod {
        match self.mode {
            CompressionMode::Preserve => original,
            CompressionMode::Store => CompressionMethod::Stored,
            CompressionMode::Deflate => CompressionMethod::Deflated,
        }
    }
}

/// In-memory copy of a zip package. Entry order and metadata survive a rewrite.
pub struct PptxPackage {
    pub source: PathBuf,
    pub entries: Vec<PptxEntry>,
}

pub struct PptxEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
    pub last_modified: zip::DateTime,
    pub unix_mode: Option<u32>,
    pub is_dir: bool,
}

impl PptxPackage {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(EngineError::NotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path).map_err(|e| EngineError::io(path, e))?;
        Self::from_bytes(path, bytes)
    }

    /// `source` is only used to label errors.
    pub fn from_bytes(source: &Path, bytes: Vec<u8>) -> Result<Self> {
        let corrupt = |e| EngineError::CorruptArchive {
            path: source.to_path_buf(),
            source: e,
        };
        let archive_len = bytes.len();
        let mut zip = ZipArchive::new(Cursor::new(bytes)).map_err(corrupt)?;
        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).map_err(corrupt)?;
            // Declared sizes are untrusted; never reserve more than the archive itself holds.
            let declared = file.size();
            let reserve = usize::try_from(declared).map_or(archive_len, |n| n.min(archive_len));
            let mut data = Vec::with_capacity(reserve);
            file.read_to_end(&mut data)
                .map_err(|e| corrupt(zip::result::ZipError::Io(e)))?;
            if data.len() as u64 != declared {
                return Err(corrupt(zip::result::ZipError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!(
                        "entry {} holds {} bytes but declares {declared}",
                        file.name(),
                        data.len()
                    ),
                ))));
            }
            entries.push(PptxEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                last_modified: file.last_modified().unwrap_or_default(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
            });
        }
        debug!("opened {} ({} entries)", source.display(), entries.len());
        Ok(Self {
            source: source.to_path_buf(),
            entries,
        })
    }

    fn entry(&self, part_name: &str) -> Option<&PptxEntry> {
        self.entries
            .iter()
            .find(|e| !e.is_dir && e.name == part_name)
    }

    pub fn part_bytes(&self, part_name: &str) -> Option<&[u8]> {
        self.entry(part_name).map(|e| e.data.as_slice())
    }

    /// `None` when the part is absent; deciding whether that is an error is up to the caller.
    pub fn part_text(&self, part_name: &str) -> Option<Cow<'_, str>> {
        self.part_bytes(part_name).map(String::from_utf8_lossy)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.name.as_str())
    }

    /// Replaces the part's content, or appends a new deflated entry.
    pub fn write_part(&mut self, part_name: &str, content: impl Into<Vec<u8>>) {
        let content = content.into();
        if let Some(ent) = self
            .entries
            .iter_mut()
            .find(|e| !e.is_dir && e.name == part_name)
        {
            ent.data = content;
            return;
        }
        self.entries.push(PptxEntry {
            name: part_name.to_string(),
            data: content,
            compression: CompressionMethod::Deflated,
            last_modified: zip::DateTime::default(),
            unix_mode: None,
            is_dir: false,
        });
    }

    pub fn serialize(&self, compression: Compression) -> Result<Vec<u8>> {
        let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
        for ent in &self.entries {
            let method = compression.method_for(ent.compression);
            let mut opts = SimpleFileOptions::default()
                .compression_method(method)
                .last_modified_time(ent.last_modified);
            if method == CompressionMethod::Deflated {
                opts = opts.compression_level(compression.level);
            }
            if let Some(mode) = ent.unix_mode {
                opts = opts.unix_permissions(mode);
            }
            if ent.is_dir || ent.name.ends_with('/') {
                zout.add_directory(ent.name.as_str(), opts)
                    .map_err(EngineError::Serialize)?;
            } else {
                zout.start_file(ent.name.as_str(), opts)
                    .map_err(EngineError::Serialize)?;
                zout.write_all(&ent.data)
                    .map_err(|e| EngineError::Serialize(zip::result::ZipError::Io(e)))?;
            }
        }
        let cursor = zout.finish().map_err(EngineError::Serialize)?;
        Ok(cursor.into_inner())
    }

    /// Serializes fully in memory first, so a failure leaves nothing on disk.
    pub fn write_to(&self, output_path: &Path, compression: Compression) -> Result<()> {
        let bytes = self.serialize(compression)?;
        write_output(output_path, &bytes)
    }
}

/// Writes `bytes` to `output_path`, creating missing parent directories.
pub fn write_output(output_path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = output_path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))?;
        }
    }
    std::fs::write(output_path, bytes).map_err(|e| EngineError::io(output_path, e))
}
