//! Corpus loading from a directory of text files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::document::Document;
use crate::error::{RagError, Result};

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
}

/// List the corpus files under `root` in sorted path order.
///
/// Hidden files and directories are skipped. An empty `extensions` list
/// accepts every file.
pub fn discover_corpus_files(
    root: impl AsRef<Path>,
    extensions: &[String],
) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(RagError::ConfigError(format!(
            "corpus directory {} does not exist or is not a directory",
            root.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_entry(|e| !is_hidden(e)) {
        let entry = entry.map_err(|e| RagError::CorpusError {
            path: e.path().unwrap_or(root).display().to_string(),
            message: e.to_string(),
        })?;
        if entry.file_type().is_file()
            && (extensions.is_empty() || has_extension(entry.path(), extensions))
        {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Load every corpus file under `root` as a [`Document`].
///
/// Document ids are paths relative to `root` with `/` separators. Files that
/// are not valid UTF-8 are skipped with a warning.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] if `root` is not a directory and
/// [`RagError::CorpusError`] if a file cannot be read.
pub fn load_corpus(root: impl AsRef<Path>, extensions: &[String]) -> Result<Vec<Document>> {
    let root = root.as_ref();
    let mut documents = Vec::new();

    for path in discover_corpus_files(root, extensions)? {
        let bytes = std::fs::read(&path).map_err(|e| RagError::CorpusError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => {
                warn!(path = %path.display(), "skipping file that is not valid UTF-8");
                continue;
            }
        };

        let relative = path.strip_prefix(root).unwrap_or(&path);
        let id = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let file_name =
            path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();

        let metadata = HashMap::from([
            ("file_name".to_string(), file_name),
            ("file_path".to_string(), id.clone()),
            ("file_size".to_string(), text.len().to_string()),
        ]);

        documents.push(Document {
            id,
            text,
            metadata,
            source_uri: Some(path.display().to_string()),
        });
    }

    info!(corpus = %root.display(), document_count = documents.len(), "loaded corpus");
    Ok(documents)
}
