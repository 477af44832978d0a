use std::path::{Component, Path, PathBuf};

use super::error::{Error, Result};

/// What a report renderer hands back for the process to emit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedOutput {
    pub stdout: Option<String>,
    /// `(relative path, content)` pairs written under the output directory.
    pub files: Vec<(String, String)>,
}

fn sanitize_relative_output_path(rel: &str) -> Result<PathBuf> {
    if Path::new(rel).is_absolute() {
        return Err(Error::InvalidOutputPath(rel.to_string()));
    }

    let mut clean = PathBuf::new();
    for c in Path::new(rel).components() {
        match c {
            Component::CurDir => {}
            Component::Normal(p) => clean.push(p),
            _ => return Err(Error::InvalidOutputPath(rel.to_string())),
        }
    }

    if clean.as_os_str().is_empty() {
        return Err(Error::InvalidOutputPath(rel.to_string()));
    }

    Ok(clean)
}

/// Checks every path up front so a bad entry doesn't leave half the reports written.
pub fn validate_output_paths(files: &[(String, String)]) -> Result<()> {
    for (rel, _) in files {
        sanitize_relative_output_path(rel)?;
    }
    Ok(())
}

/// Writes report files relative to `base_dir`, creating parent directories.
///
/// Absolute paths and `..` traversal are rejected.
pub fn write_output_files(base_dir: &Path, files: &[(String, String)]) -> Result<()> {
    validate_output_paths(files)?;
    for (rel, content) in files {
        let path = base_dir.join(sanitize_relative_output_path(rel)?);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        tracing::debug!(path = %path.display(), bytes = content.len(), "wrote report file");
    }

    Ok(())
}
