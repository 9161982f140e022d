//! Upload content for `/add`
//!
//! A file is sent as a single multipart part. A directory is sent as one
//! part per regular file, each named with its path relative to the
//! directory's parent (`docs/a.txt`, `docs/sub/b.txt`), in sorted order,
//! so the cluster rebuilds the same tree and the last returned entry is
//! the directory root.

use std::fs;
use std::path::{Path, PathBuf};

use reqwest::multipart::{Form, Part};

use super::errors::{TransportError, TransportResult};

/// One file to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddFile {
    /// Location on disk
    pub path: PathBuf,
    /// Name sent to the cluster
    pub name: String,
    pub size: u64,
}

/// A file or directory tree ready to upload
#[derive(Debug, Clone)]
pub struct AddContent {
    root: PathBuf,
    is_directory: bool,
    files: Vec<AddFile>,
}

impl AddContent {
    /// Scan a path. Fails for missing paths and for directories that
    /// contain no regular files.
    pub fn from_path(path: &Path) -> TransportResult<Self> {
        let meta = fs::metadata(path).map_err(|e| TransportError::local_io(path, e))?;
        let root_name = file_name(path)?;

        if meta.is_file() {
            return Ok(Self {
                root: path.to_path_buf(),
                is_directory: false,
                files: vec![AddFile {
                    path: path.to_path_buf(),
                    name: root_name,
                    size: meta.len(),
                }],
            });
        }

        let mut files = Vec::new();
        collect_files(path, &root_name, &mut files)?;
        if files.is_empty() {
            return Err(TransportError::local_io(path, "directory contains no files"));
        }

        Ok(Self {
            root: path.to_path_buf(),
            is_directory: true,
            files,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name of the top-level file or directory
    pub fn root_name(&self) -> String {
        file_name(&self.root).unwrap_or_default()
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn files(&self) -> &[AddFile] {
        &self.files
    }

    /// Sum of file sizes in bytes
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Build the multipart body. Every part is named `file`.
    pub(crate) async fn to_form(&self) -> TransportResult<Form> {
        // Directory parts carry their relative path in the filename
        let mut form = Form::new().percent_encode_noop();
        for file in &self.files {
            let data = tokio::fs::read(&file.path)
                .await
                .map_err(|e| TransportError::local_io(&file.path, e))?;
            let part = Part::bytes(data).file_name(file.name.clone());
            form = form.part("file", part);
        }
        Ok(form)
    }
}

fn file_name(path: &Path) -> TransportResult<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| TransportError::local_io(path, "path has no file name"))
}

fn collect_files(dir: &Path, prefix: &str, out: &mut Vec<AddFile>) -> TransportResult<()> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| TransportError::local_io(dir, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TransportError::local_io(dir, e))?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let name = format!("{}/{}", prefix, entry.file_name().to_string_lossy());
        let meta = fs::metadata(&path).map_err(|e| TransportError::local_io(&path, e))?;
        if meta.is_dir() {
            collect_files(&path, &name, out)?;
        } else if meta.is_file() {
            out.push(AddFile {
                path,
                name,
                size: meta.len(),
            });
        }
    }
    Ok(())
}
