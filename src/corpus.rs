use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::models::Document;

/// Enumerate all markdown files under the corpus root, recursively.
///
/// Results are sorted by relative path so chunk IDs are deterministic across
/// ingestion runs. Fails when the root does not exist or when zero files
/// match — ingestion must never silently produce an empty index.
pub fn load_markdown_files(config: &CorpusConfig) -> Result<Vec<Document>> {
    let root = &config.root;
    if !root.exists() {
        bail!("Corpus root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut documents = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if !include_set.is_match(&rel_str) {
            continue;
        }

        documents.push(file_to_document(path, &rel_str)?);
    }

    if documents.is_empty() {
        bail!("No markdown files found in {}", root.display());
    }

    // Sort for deterministic chunk IDs
    documents.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    Ok(documents)
}

fn file_to_document(path: &Path, relative_path: &str) -> Result<Document> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(Document {
        filename,
        relative_path: relative_path.to_string(),
        content,
    })
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
