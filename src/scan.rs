//! Vault walker.
//!
//! Finds every Markdown document under the scan root (the vault, or its
//! `target_subfolder`) and parses it into a [`SourceDocument`].
//!
//! # Excludes
//!
//! Paths are matched relative to the vault root, with `/` separators,
//! against these defaults plus `vault.exclude_globs`:
//!
//! ```text
//! **/.obsidian/**
//! **/.trash/**
//! **/.git/**
//! ```

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::PageError;
use crate::frontmatter::{split_front_matter, FrontMatter};
use crate::models::SourceDocument;
use crate::references::extract_references;

const DEFAULT_EXCLUDES: &[&str] = &["**/.obsidian/**", "**/.trash/**", "**/.git/**"];

/// Documents found in the vault, plus the ones that could not be read.
#[derive(Debug, Default)]
pub struct VaultScan {
    pub documents: Vec<SourceDocument>,
    pub failures: Vec<PageError>,
}

/// Paths of all Markdown files under the scan root, sorted.
pub fn find_documents(config: &Config) -> Result<Vec<PathBuf>> {
    let root = &config.vault.root;
    let scan_root = config.scan_root();
    if !scan_root.is_dir() {
        bail!("Scan path does not exist: {}", scan_root.display());
    }

    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(config.vault.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut paths = Vec::new();
    for entry in WalkDir::new(&scan_root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable path: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_markdown(entry.path()) {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if exclude_set.is_match(relative_key(relative)) {
            tracing::debug!("Excluded: {}", relative.display());
            continue;
        }
        paths.push(path.to_path_buf());
    }

    paths.sort();
    Ok(paths)
}

/// Find and parse every document under the scan root.
pub fn scan_vault(config: &Config) -> Result<VaultScan> {
    tracing::info!("Scanning vault at: {}", config.scan_root().display());
    let paths = find_documents(config)?;

    let mut scan = VaultScan::default();
    for path in paths {
        match parse_document(&path, config.vault.extract_frontmatter) {
            Ok(document) => scan.documents.push(document),
            Err(e) => {
                tracing::error!("Error parsing {}: {}", path.display(), e);
                scan.failures.push(e);
            }
        }
    }

    tracing::info!("Found {} Markdown files", scan.documents.len());
    Ok(scan)
}

/// Read one document: front matter, body, title and file references.
pub fn parse_document(path: &Path, extract_front_matter: bool) -> Result<SourceDocument, PageError> {
    let text = std::fs::read_to_string(path).map_err(|source| PageError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let (front_matter, body) = if extract_front_matter {
        let (header, body) = split_front_matter(&text);
        let front_matter = match header.map(FrontMatter::parse) {
            Some(Ok(front_matter)) => front_matter,
            Some(Err(e)) => {
                tracing::warn!("Error parsing frontmatter in {}: {}", path.display(), e);
                FrontMatter::default()
            }
            None => FrontMatter::default(),
        };
        (front_matter, body.to_string())
    } else {
        (FrontMatter::default(), text.clone())
    };

    let title = front_matter.title().unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    });
    let references = extract_references(&body);

    Ok(SourceDocument {
        path: path.to_path_buf(),
        title,
        body,
        front_matter,
        references,
    })
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
