//! Asset discovery and analysis.
//!
//! Every reference of every document is resolved to a path; the set of
//! unique paths is analyzed once each (size, MIME type, SHA-256). The
//! resulting [`AssetMap`] ties the names documents use back to upload ids.

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::AssetError;
use crate::models::{AssetRecord, SourceDocument};
use crate::resolve::PathResolver;

const HASH_BLOCK_SIZE: usize = 64 * 1024;

/// Size, MIME type and content hash of the file at `path`.
pub fn analyze_asset(path: &Path) -> Result<AssetRecord, AssetError> {
    let wrap = |source| AssetError {
        path: path.to_path_buf(),
        source,
    };

    let size = std::fs::metadata(path).map_err(wrap)?.len();
    let hash = hash_file(path).map_err(wrap)?;
    let mime_type = mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(AssetRecord {
        path: path.to_path_buf(),
        name,
        size,
        mime_type,
        hash,
    })
}

/// Stream the file through SHA-256 in fixed-size blocks.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BLOCK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// A reference that did not resolve to any file.
#[derive(Debug, Clone)]
pub struct Unresolved {
    pub document: PathBuf,
    pub name: String,
}

/// Output of the analyze phase.
#[derive(Debug, Default)]
pub struct AssetDiscovery {
    pub assets: Vec<AssetRecord>,
    pub unresolved: Vec<Unresolved>,
    pub failures: Vec<AssetError>,
    /// Reference names that resolved to a file under a different name
    /// (guessed extension, other case), with the file they resolved to.
    pub aliases: Vec<(String, PathBuf)>,
}

/// Resolve all references of `documents` and analyze each unique file once.
pub fn discover_assets(documents: &[SourceDocument], resolver: &PathResolver) -> AssetDiscovery {
    let mut discovery = AssetDiscovery::default();
    let mut paths = BTreeSet::new();

    for doc in documents {
        for reference in &doc.references {
            match resolver.resolve(&reference.name, &doc.path) {
                Some(path) => {
                    let named_as_file = path
                        .file_name()
                        .is_some_and(|f| f.to_string_lossy() == reference.name);
                    let alias = (reference.name.clone(), path.clone());
                    if !named_as_file && !discovery.aliases.contains(&alias) {
                        discovery.aliases.push(alias);
                    }
                    paths.insert(path);
                }
                None => {
                    tracing::warn!(
                        "Could not resolve file: {} (referenced in {})",
                        reference.name,
                        doc.path.display()
                    );
                    discovery.unresolved.push(Unresolved {
                        document: doc.path.clone(),
                        name: reference.name.clone(),
                    });
                }
            }
        }
    }

    for path in paths {
        match analyze_asset(&path) {
            Ok(record) => discovery.assets.push(record),
            Err(e) => {
                tracing::error!("{}", e);
                discovery.failures.push(e);
            }
        }
    }

    discovery
}

/// Names documents use for assets → remote upload id.
///
/// Each uploaded asset is reachable by its bare file name and by its path
/// relative to the vault root (with `/` separators).
#[derive(Debug, Clone, Default)]
pub struct AssetMap {
    entries: BTreeMap<String, String>,
    by_path: BTreeMap<PathBuf, String>,
}

impl AssetMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: &AssetRecord, vault_root: &Path, upload_id: &str) {
        self.by_path
            .insert(record.path.clone(), upload_id.to_string());
        self.entries
            .insert(record.name.clone(), upload_id.to_string());
        if let Ok(relative) = record.path.strip_prefix(vault_root) {
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            self.entries.insert(key, upload_id.to_string());
        }
    }

    /// Make each alias name point at the upload of the file it resolved to.
    ///
    /// Aliases of files without an upload are skipped, and an alias never
    /// replaces an existing name.
    pub fn insert_aliases(&mut self, aliases: &[(String, PathBuf)]) {
        for (name, path) in aliases {
            if let Some(id) = self.by_path.get(path) {
                self.entries.entry(name.clone()).or_insert_with(|| id.clone());
            }
        }
    }

    /// Upload id for a name as written in a document.
    ///
    /// Tries the name as-is, then URL-decoded, then its final path segment.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        if let Some(id) = self.entries.get(name) {
            return Some(id);
        }
        let decoded = urlencoding::decode(name)
            .map(|d| d.into_owned())
            .unwrap_or_else(|_| name.to_string());
        if let Some(id) = self.entries.get(&decoded) {
            return Some(id);
        }
        let last = decoded.rsplit('/').next().unwrap_or(&decoded);
        self.entries.get(last).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::FrontMatter;
    use crate::models::FileReference;
    use std::fs;
    use tempfile::TempDir;

    fn doc(path: PathBuf, refs: &[&str]) -> SourceDocument {
        SourceDocument {
            path,
            title: "t".to_string(),
            body: String::new(),
            front_matter: FrontMatter::default(),
            references: refs.iter().map(|r| FileReference::new(*r, None)).collect(),
        }
    }

    #[test]
    fn hash_matches_known_digest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("abc.txt");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(
            hash_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hash_spans_multiple_blocks() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("big.bin");
        let data = vec![7u8; HASH_BLOCK_SIZE * 2 + 13];
        fs::write(&path, &data).unwrap();
        let expected = hex::encode(Sha256::digest(&data));
        assert_eq!(hash_file(&path).unwrap(), expected);
    }

    #[test]
    fn analyze_reports_size_and_mime() {
        let tmp = TempDir::new().unwrap();
        let png = tmp.path().join("pic.png");
        fs::write(&png, b"fake png data").unwrap();
        let record = analyze_asset(&png).unwrap();
        assert_eq!(record.name, "pic.png");
        assert_eq!(record.size, 13);
        assert_eq!(record.mime_type, "image/png");
        assert_eq!(record.extension(), ".png");

        let odd = tmp.path().join("blob.zzqq");
        fs::write(&odd, b"x").unwrap();
        assert_eq!(
            analyze_asset(&odd).unwrap().mime_type,
            "application/octet-stream"
        );
    }

    #[test]
    fn analyze_missing_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let err = analyze_asset(&tmp.path().join("gone.png")).unwrap_err();
        assert!(err.to_string().contains("gone.png"));
    }

    #[test]
    fn discovery_dedups_paths_and_records_unresolved() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("attachments")).unwrap();
        fs::write(root.join("attachments/a.png"), b"a").unwrap();
        fs::write(root.join("attachments/b.pdf"), b"b").unwrap();

        let docs = vec![
            doc(root.join("one.md"), &["a.png", "a.png", "missing.png"]),
            doc(root.join("two.md"), &["a.png", "b.pdf"]),
        ];
        let resolver = PathResolver::new(root, "attachments");
        let discovery = discover_assets(&docs, &resolver);

        let names: Vec<&str> = discovery.assets.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.pdf"]);
        assert_eq!(discovery.unresolved.len(), 1);
        assert_eq!(discovery.unresolved[0].name, "missing.png");
        assert!(discovery.failures.is_empty());
    }

    #[test]
    fn asset_map_keys_by_name_and_relative_path() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("attachments")).unwrap();
        let path = root.join("attachments/my photo.png");
        fs::write(&path, b"x").unwrap();
        let record = analyze_asset(&path).unwrap();

        let mut map = AssetMap::new();
        map.insert(&record, root, "up-1");

        assert_eq!(map.len(), 2);
        assert_eq!(map.lookup("my photo.png"), Some("up-1"));
        assert_eq!(map.lookup("attachments/my photo.png"), Some("up-1"));
        assert_eq!(map.lookup("my%20photo.png"), Some("up-1"));
        assert_eq!(map.lookup("elsewhere/my photo.png"), Some("up-1"));
        assert_eq!(map.lookup("other.png"), None);
    }

    #[test]
    fn guessed_extension_and_case_become_aliases() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("attachments")).unwrap();
        fs::create_dir_all(root.join("deep/scans")).unwrap();
        fs::write(root.join("attachments/diagram.jpg"), b"jpg").unwrap();
        fs::write(root.join("deep/scans/Scan.PDF"), b"pdf").unwrap();
        fs::write(root.join("attachments/plain.png"), b"png").unwrap();

        let docs = vec![doc(
            root.join("note.md"),
            &["diagram", "Scan.pdf", "plain.png", "gone.png"],
        )];
        let resolver = PathResolver::new(root, "attachments");
        let discovery = discover_assets(&docs, &resolver);

        let mut aliases: Vec<&str> = discovery.aliases.iter().map(|(n, _)| n.as_str()).collect();
        aliases.sort();
        assert_eq!(aliases, vec!["Scan.pdf", "diagram"]);

        let mut map = AssetMap::new();
        for (i, record) in discovery.assets.iter().enumerate() {
            map.insert(record, root, &format!("up-{}", i));
        }
        map.insert_aliases(&discovery.aliases);

        assert_eq!(map.lookup("diagram"), map.lookup("diagram.jpg"));
        assert!(map.lookup("diagram").is_some());
        assert_eq!(map.lookup("Scan.pdf"), map.lookup("Scan.PDF"));
        assert!(map.lookup("Scan.pdf").is_some());
        assert_eq!(map.lookup("gone.png"), None);
    }

    #[test]
    fn alias_without_upload_stays_missing() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let path = root.join("diagram.jpg");
        fs::write(&path, b"jpg").unwrap();

        let mut map = AssetMap::new();
        map.insert_aliases(&[("diagram".to_string(), path)]);
        assert_eq!(map.lookup("diagram"), None);
    }
}
