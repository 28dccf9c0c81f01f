//! Working folders of one extraction run.
//!
//! All four folders live next to the source PDF and are named after the
//! sanitised document id:
//!
//! ```text
//! <doc>_tmp_images/     staging: rasterised and normalised images
//! <doc>_output/         one <image>.json per successful candidate
//! <doc>_errors/         one <image>.response.json per failed candidate
//! <doc>_final_folders/  <doc>_output after commit
//! ```
//!
//! Every path is derived from the workspace root; nothing depends on the
//! process's current directory.
//!
//! ## Records are written once
//!
//! A record's existence is the "already done" signal a resumed run relies
//! on, so a half-written file must never be observable. Records are written
//! to a dot-prefixed temp file in the same folder, synced, then linked into
//! place with a no-clobber persist. Leftover temp files from a crash are
//! ignored when counting records and removed on the next `prepare`.

use crate::error::ExtractError;
use crate::output::CommitReport;
use serde_json::Value;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const TEMP_PREFIX: &str = ".record-";

/// The four working folders of a document.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    doc_id: String,
}

impl Workspace {
    /// A workspace rooted at `root` for the document named `doc_id`.
    pub fn new(root: impl Into<PathBuf>, doc_id: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            doc_id: doc_id.into(),
        }
    }

    /// The workspace next to `pdf_path` (which should be absolute).
    pub fn for_document(pdf_path: &Path) -> Self {
        let root = pdf_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(root, crate::pipeline::input::document_id(pdf_path))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.dir("tmp_images")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir("output")
    }

    pub fn errors_dir(&self) -> PathBuf {
        self.dir("errors")
    }

    pub fn final_dir(&self) -> PathBuf {
        self.dir("final_folders")
    }

    fn dir(&self, suffix: &str) -> PathBuf {
        self.root.join(format!("{}_{}", self.doc_id, suffix))
    }

    /// `<output>/<name>.json`
    pub fn success_record_path(&self, name: &str) -> PathBuf {
        self.output_dir().join(format!("{name}.json"))
    }

    /// `<errors>/<name>.response.json`
    pub fn failure_record_path(&self, name: &str) -> PathBuf {
        self.errors_dir().join(format!("{name}.response.json"))
    }

    /// Delete and recreate the staging, output and errors folders.
    ///
    /// The final folder is left alone.
    pub fn reset(&self) -> Result<(), ExtractError> {
        for dir in [self.staging_dir(), self.output_dir(), self.errors_dir()] {
            recreate_dir(&dir)?;
        }
        debug!("Workspace reset under {}", self.root.display());
        Ok(())
    }

    /// Get the folders ready for a run.
    ///
    /// `fresh` performs a full [`reset`](Self::reset). Otherwise only staging
    /// is recreated (pages are re-rendered deterministically) while earlier
    /// output and error records are kept so their candidates are skipped.
    pub fn prepare(&self, fresh: bool) -> Result<(), ExtractError> {
        if fresh {
            return self.reset();
        }
        recreate_dir(&self.staging_dir())?;
        for dir in [self.output_dir(), self.errors_dir()] {
            fs::create_dir_all(&dir).map_err(|e| ExtractError::workspace(&dir, e))?;
            remove_partial_records(&dir)?;
        }
        Ok(())
    }

    /// Whether a success or error record already exists for `name`, in the
    /// output, errors or final folder.
    pub fn has_record(&self, name: &str) -> bool {
        self.success_record_path(name).exists()
            || self.failure_record_path(name).exists()
            || self.final_dir().join(format!("{name}.json")).exists()
    }

    /// Persist the parsed JSON for candidate `name`.
    pub fn record_success(&self, name: &str, value: &Value) -> Result<PathBuf, ExtractError> {
        write_record(&self.output_dir(), &self.success_record_path(name), value)
    }

    /// Persist the raw response of failed candidate `name`.
    pub fn record_failure(&self, name: &str, raw: &Value) -> Result<PathBuf, ExtractError> {
        write_record(&self.errors_dir(), &self.failure_record_path(name), raw)
    }

    /// Expose results under their permanent names.
    ///
    /// * output non-empty → renamed to the final folder (merged file by file
    ///   when a final folder from an earlier run exists); empty → deleted.
    /// * errors empty → deleted; otherwise kept for the operator.
    pub fn commit(&self) -> Result<CommitReport, ExtractError> {
        let output = self.output_dir();
        let final_dir = self.final_dir();
        let errors = self.errors_dir();

        if output.exists() {
            if record_count(&output)? == 0 {
                remove_dir_if_exists(&output)?;
            } else if !final_dir.exists() {
                fs::rename(&output, &final_dir).map_err(|e| ExtractError::workspace(&output, e))?;
                info!("Renamed {} → {}", output.display(), final_dir.display());
            } else {
                merge_records(&output, &final_dir)?;
                remove_dir_if_exists(&output)?;
                info!("Merged {} into {}", output.display(), final_dir.display());
            }
        }

        if errors.exists() && record_count(&errors)? == 0 {
            remove_dir_if_exists(&errors)?;
        }

        Ok(CommitReport {
            final_dir: (record_count(&final_dir)? > 0).then_some(final_dir),
            errors_dir: (record_count(&errors)? > 0).then_some(errors),
        })
    }

    /// Delete the staging folder and everything in it.
    pub fn clean_staging(&self) -> Result<(), ExtractError> {
        remove_dir_if_exists(&self.staging_dir())
    }
}

fn write_record(dir: &Path, path: &Path, value: &Value) -> Result<PathBuf, ExtractError> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| ExtractError::Internal(format!("serialise record {}: {e}", path.display())))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| ExtractError::workspace(dir, e))?;
    tmp.write_all(&bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| ExtractError::workspace(tmp.path(), e))?;

    tmp.persist_noclobber(path).map_err(|e| {
        if e.error.kind() == ErrorKind::AlreadyExists {
            ExtractError::RecordExists {
                path: path.to_path_buf(),
            }
        } else {
            ExtractError::workspace(path, e.error)
        }
    })?;

    debug!("Wrote {}", path.display());
    Ok(path.to_path_buf())
}

/// Record files in `dir`; temp files and a missing folder count as none.
fn record_count(dir: &Path) -> Result<usize, ExtractError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(ExtractError::workspace(dir, e)),
    };
    let mut count = 0;
    for entry in entries {
        let entry = entry.map_err(|e| ExtractError::workspace(dir, e))?;
        if !is_temp_name(&entry.file_name().to_string_lossy()) {
            count += 1;
        }
    }
    Ok(count)
}

fn merge_records(from: &Path, into: &Path) -> Result<(), ExtractError> {
    for entry in fs::read_dir(from).map_err(|e| ExtractError::workspace(from, e))? {
        let entry = entry.map_err(|e| ExtractError::workspace(from, e))?;
        let name = entry.file_name();
        if is_temp_name(&name.to_string_lossy()) {
            continue;
        }
        let target = into.join(&name);
        fs::rename(entry.path(), &target).map_err(|e| ExtractError::workspace(&target, e))?;
    }
    Ok(())
}

fn remove_partial_records(dir: &Path) -> Result<(), ExtractError> {
    for entry in fs::read_dir(dir).map_err(|e| ExtractError::workspace(dir, e))? {
        let entry = entry.map_err(|e| ExtractError::workspace(dir, e))?;
        if is_temp_name(&entry.file_name().to_string_lossy()) {
            debug!("Removing partial record {}", entry.path().display());
            fs::remove_file(entry.path()).map_err(|e| ExtractError::workspace(entry.path(), e))?;
        }
    }
    Ok(())
}

fn is_temp_name(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX)
}

fn recreate_dir(dir: &Path) -> Result<(), ExtractError> {
    remove_dir_if_exists(dir)?;
    fs::create_dir_all(dir).map_err(|e| ExtractError::workspace(dir, e))
}

fn remove_dir_if_exists(dir: &Path) -> Result<(), ExtractError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ExtractError::workspace(dir, e)),
    }
}
