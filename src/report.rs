//! Migration report.
//!
//! Produced by every run, dry or not. Written as pretty JSON with
//! `vmig migrate --output report.json`, and summarized on stdout.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::models::{AssetRecord, MigratedPage};

#[derive(Debug, Clone, Serialize)]
pub struct MigrationSummary {
    pub duration_seconds: f64,
    pub total_pages_processed: usize,
    pub successful_pages: usize,
    pub failed_pages: usize,
    pub total_assets: usize,
    /// Assets whose upload succeeded, counting deduplicated assets individually.
    pub successful_uploads: usize,
    pub failed_uploads: usize,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AssetStats {
    pub total_size_bytes: u64,
    pub average_size_bytes: u64,
    /// Lowercased extension (with dot) → asset count.
    pub file_types: BTreeMap<String, usize>,
}

impl AssetStats {
    pub fn from_records(records: &[AssetRecord]) -> Self {
        let total_size_bytes: u64 = records.iter().map(|r| r.size).sum();
        let average_size_bytes = if records.is_empty() {
            0
        } else {
            total_size_bytes / records.len() as u64
        };
        let mut file_types = BTreeMap::new();
        for record in records {
            *file_types.entry(record.extension()).or_insert(0) += 1;
        }
        Self {
            total_size_bytes,
            average_size_bytes,
            file_types,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub migration_summary: MigrationSummary,
    pub migrated_pages: Vec<MigratedPage>,
    /// Asset name or vault-relative path → upload id.
    pub uploaded_assets: BTreeMap<String, String>,
    pub failed_files: Vec<String>,
    pub asset_stats: AssetStats,
    pub generated_at: DateTime<Utc>,
}

impl MigrationReport {
    /// Whether any page or upload failed; the CLI exits non-zero if so.
    pub fn has_failures(&self) -> bool {
        self.migration_summary.failed_pages + self.migration_summary.failed_uploads > 0
    }

    /// Write the report as pretty JSON, creating parent directories.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Print a human-readable summary to stdout.
    pub fn print_summary(&self) {
        let s = &self.migration_summary;
        println!(
            "Vault Migration{}",
            if s.dry_run { " (dry run)" } else { "" }
        );
        println!("===============");
        println!();
        println!("  Duration:    {:.2}s", s.duration_seconds);
        println!(
            "  Pages:       {} successful, {} failed ({} processed)",
            s.successful_pages, s.failed_pages, s.total_pages_processed
        );
        println!(
            "  Assets:      {} uploaded, {} failed ({} total, {})",
            s.successful_uploads,
            s.failed_uploads,
            s.total_assets,
            format_bytes(self.asset_stats.total_size_bytes)
        );

        let partial: Vec<&MigratedPage> = self.migrated_pages.iter().filter(|p| p.partial).collect();
        if !partial.is_empty() {
            println!();
            println!("  Partially written pages:");
            for page in partial {
                println!("    {} ({})", page.title, page.page_id);
            }
        }

        if !self.failed_files.is_empty() {
            println!();
            println!("  Failed files:");
            for file in &self.failed_files {
                println!("    {}", file);
            }
        }
        println!();
    }
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn record(name: &str, size: u64) -> AssetRecord {
        AssetRecord {
            path: PathBuf::from("/vault").join(name),
            name: name.to_string(),
            size,
            mime_type: String::new(),
            hash: String::new(),
        }
    }

    fn report(failed_pages: usize, failed_uploads: usize) -> MigrationReport {
        MigrationReport {
            migration_summary: MigrationSummary {
                duration_seconds: 1.5,
                total_pages_processed: 2,
                successful_pages: 2 - failed_pages.min(2),
                failed_pages,
                total_assets: 1,
                successful_uploads: 1 - failed_uploads.min(1),
                failed_uploads,
                dry_run: false,
            },
            migrated_pages: Vec::new(),
            uploaded_assets: BTreeMap::new(),
            failed_files: Vec::new(),
            asset_stats: AssetStats::default(),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn asset_stats_by_extension() {
        let stats = AssetStats::from_records(&[
            record("a.PNG", 100),
            record("b.png", 300),
            record("c.pdf", 200),
        ]);
        assert_eq!(stats.total_size_bytes, 600);
        assert_eq!(stats.average_size_bytes, 200);
        assert_eq!(stats.file_types.get(".png"), Some(&2));
        assert_eq!(stats.file_types.get(".pdf"), Some(&1));
    }

    #[test]
    fn empty_asset_stats() {
        let stats = AssetStats::from_records(&[]);
        assert_eq!(stats.average_size_bytes, 0);
        assert!(stats.file_types.is_empty());
    }

    #[test]
    fn failures_drive_exit_status() {
        assert!(!report(0, 0).has_failures());
        assert!(report(1, 0).has_failures());
        assert!(report(0, 1).has_failures());
    }

    #[test]
    fn writes_json_with_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out/nested/report.json");
        report(0, 0).write_json(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["migration_summary"]["successful_pages"], 2);
        assert_eq!(value["migration_summary"]["dry_run"], false);
        assert!(value["generated_at"].is_string());
        assert!(value["asset_stats"]["file_types"].is_object());
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
