//! Reference → file path resolution.
//!
//! A referenced name is looked up under a fixed list of roots, first
//! existing regular file wins:
//!
//! 1. the referencing document's directory
//! 2. `<document dir>/<attachments folder>`
//! 3. the vault root
//! 4. `<vault root>/<attachments folder>`
//! 5. `<vault root>/assets`, `files`, `media`
//!
//! Percent-encoded names are also tried decoded, and names without an
//! extension are retried with common image and document extensions. If all
//! of that fails the vault is walked for a file with a matching name.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const CANDIDATE_FOLDERS: [&str; 3] = ["assets", "files", "media"];

const GUESSED_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "gif", "pdf", "mp4", "mov"];

#[derive(Debug, Clone)]
pub struct PathResolver {
    vault_root: PathBuf,
    attachments_folder: String,
}

impl PathResolver {
    pub fn new(vault_root: impl Into<PathBuf>, attachments_folder: impl Into<String>) -> Self {
        Self {
            vault_root: vault_root.into(),
            attachments_folder: attachments_folder.into(),
        }
    }

    pub fn vault_root(&self) -> &Path {
        &self.vault_root
    }

    /// Locate `name` as referenced from the document at `origin`.
    pub fn resolve(&self, name: &str, origin: &Path) -> Option<PathBuf> {
        let names = candidate_names(name);
        let origin_dir = origin.parent().unwrap_or(&self.vault_root);

        let mut roots = vec![
            origin_dir.to_path_buf(),
            origin_dir.join(&self.attachments_folder),
            self.vault_root.clone(),
            self.vault_root.join(&self.attachments_folder),
        ];
        roots.extend(CANDIDATE_FOLDERS.iter().map(|f| self.vault_root.join(f)));

        let mut candidates: Vec<PathBuf> = names
            .iter()
            .flat_map(|n| roots.iter().map(move |root| root.join(n)))
            .collect();

        if Path::new(name).extension().is_none() {
            let guessed: Vec<PathBuf> = candidates
                .iter()
                .flat_map(|path| {
                    GUESSED_EXTENSIONS
                        .iter()
                        .map(move |ext| with_extra_extension(path, ext))
                })
                .collect();
            candidates.extend(guessed);
        }

        if let Some(found) = candidates.into_iter().find(|p| p.is_file()) {
            return Some(found);
        }

        self.search_vault(&names)
    }

    /// Walk the whole vault for a file called one of `names`.
    ///
    /// Only the file name is compared; an extension that differs only in
    /// ASCII case still matches.
    fn search_vault(&self, names: &[String]) -> Option<PathBuf> {
        let wanted: Vec<&str> = names
            .iter()
            .filter_map(|n| Path::new(n).file_name()?.to_str())
            .collect();
        if wanted.is_empty() {
            return None;
        }

        let mut matches: Vec<PathBuf> = WalkDir::new(&self.vault_root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                let file_name = entry.file_name().to_string_lossy();
                wanted.iter().any(|w| names_match(&file_name, w))
            })
            .map(|entry| entry.into_path())
            .collect();
        matches.sort();
        matches.into_iter().next()
    }
}

/// The literal name plus its URL-decoded form when that differs.
fn candidate_names(name: &str) -> Vec<String> {
    let mut names = vec![name.to_string()];
    if name.contains('%') {
        if let Ok(decoded) = urlencoding::decode(name) {
            if decoded != name {
                names.push(decoded.into_owned());
            }
        }
    }
    names
}

/// `notes/photo` + `png` → `notes/photo.png`, keeping any dots in the stem.
fn with_extra_extension(path: &Path, ext: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

/// Same stem, extension compared case-insensitively.
fn names_match(file_name: &str, wanted: &str) -> bool {
    if file_name == wanted {
        return true;
    }
    match (file_name.rsplit_once('.'), wanted.rsplit_once('.')) {
        (Some((a_stem, a_ext)), Some((b_stem, b_ext))) => {
            a_stem == b_stem && a_ext.eq_ignore_ascii_case(b_ext)
        }
        _ => false,
    }
}
