/// Labeled file output
///
/// Records go to `{path}.partial` first and are renamed onto `{path}` only
/// after the whole file was labeled. A file that fails halfway leaves
/// nothing behind.
use crate::error::{GroundTruthError, Result};
use crate::label::LabelMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

const PARTIAL_SUFFIX: &str = "partial";
const LABEL_MAP_SUFFIX: &str = "labels.json";
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

pub struct StagedOutput {
    target: PathBuf,
    staging: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl StagedOutput {
    pub fn create(target: impl Into<PathBuf>) -> Result<Self> {
        let target = target.into();
        let staging = with_suffix(&target, PARTIAL_SUFFIX);
        let file = File::create(&staging).map_err(|e| {
            GroundTruthError::io(format!("creating {}", staging.display()), e)
        })?;

        Ok(Self {
            target,
            staging,
            writer: Some(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file)),
        })
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging
    }

    /// Flush and move the staged file onto the target path.
    pub fn commit(mut self) -> Result<PathBuf> {
        if let Err(e) = self.finish() {
            if let Err(remove_err) = fs::remove_file(&self.staging) {
                tracing::warn!("Could not remove {}: {}", self.staging.display(), remove_err);
            }
            return Err(e);
        }
        Ok(self.target.clone())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            let file = writer.into_inner().map_err(|e| {
                GroundTruthError::io(format!("flushing {}", self.staging.display()), e.into_error())
            })?;
            file.sync_all().map_err(|e| {
                GroundTruthError::io(format!("syncing {}", self.staging.display()), e)
            })?;
        }

        fs::rename(&self.staging, &self.target).map_err(|e| {
            GroundTruthError::io(
                format!("moving {} to {}", self.staging.display(), self.target.display()),
                e,
            )
        })
    }
}

impl Write for StagedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.writer.as_mut() {
            Some(writer) => writer.write(buf),
            None => Err(io::Error::other("staged output already committed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for StagedOutput {
    fn drop(&mut self) {
        // Still holding the writer means commit never happened
        if self.writer.take().is_some() {
            if let Err(e) = fs::remove_file(&self.staging) {
                tracing::warn!("Could not remove {}: {}", self.staging.display(), e);
            } else {
                tracing::debug!("Discarded partial output {}", self.staging.display());
            }
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Create `path` and its parents. An existing directory is fine.
pub fn ensure_dir(path: &Path) -> Result<()> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(GroundTruthError::Filesystem {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

pub fn label_map_path(labeled_file: &Path) -> PathBuf {
    with_suffix(labeled_file, LABEL_MAP_SUFFIX)
}

/// Persist a label map as a JSON object next to its labeled file.
pub fn write_label_map(labeled_file: &Path, labels: &LabelMap) -> Result<PathBuf> {
    let path = label_map_path(labeled_file);
    let file = File::create(&path)
        .map_err(|e| GroundTruthError::io(format!("creating {}", path.display()), e))?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, labels).map_err(|e| {
        GroundTruthError::io(format!("writing {}", path.display()), io::Error::other(e))
    })?;
    writer
        .flush()
        .map_err(|e| GroundTruthError::io(format!("writing {}", path.display()), e))?;

    Ok(path)
}
