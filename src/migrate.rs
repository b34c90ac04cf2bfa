//! Migration orchestration.
//!
//! Runs the four phases in order and folds their results into a
//! [`MigrationReport`]:
//!
//! ```text
//! discover ──▶ analyze ──▶ upload ──▶ write
//!  (scan)      (assets)    (upload)   (blocks + properties + writer)
//! ```
//!
//! Uploads run on a bounded worker pool; every other phase is sequential,
//! and writing starts only after the last upload has finished. Failures of
//! single documents or assets are recorded in the report. Only configuration
//! problems (and a failed database pre-flight) abort the run.
//!
//! In a dry run nothing is sent: uploads get placeholder ids
//! (`dry-run-upload-<n>`) and every page gets `dry-run-page-id`, but
//! documents are still fully parsed and converted.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;

use crate::assets::{discover_assets, AssetMap};
use crate::blocks::{missing_files, parse_blocks, Block};
use crate::client::RemoteStore;
use crate::config::Config;
use crate::error::PageError;
use crate::models::{MigratedPage, SourceDocument};
use crate::progress::{MigrationProgressEvent, MigrationProgressReporter, NoProgress};
use crate::properties::{map_properties, PropertyMap};
use crate::ratelimit::RateLimiter;
use crate::report::{AssetStats, MigrationReport, MigrationSummary};
use crate::resolve::PathResolver;
use crate::scan::scan_vault;
use crate::upload::{FailedFiles, UploadEngine};
use crate::writer::{PageWrite, PageWriter};

/// Page id reported for every document in a dry run.
pub const DRY_RUN_PAGE_ID: &str = "dry-run-page-id";

pub struct Migrator {
    config: Config,
    /// `None` in a dry run.
    store: Option<Arc<dyn RemoteStore>>,
    limiter: RateLimiter,
    progress: Box<dyn MigrationProgressReporter>,
}

impl Migrator {
    /// A migrator that writes to `store`.
    pub fn new(config: Config, store: Arc<dyn RemoteStore>) -> Self {
        let limiter = RateLimiter::new(config.upload.rate_limit_delay());
        Self {
            config,
            store: Some(store),
            limiter,
            progress: Box::new(NoProgress),
        }
    }

    /// A migrator that converts everything but sends nothing.
    pub fn dry_run(config: Config) -> Self {
        let limiter = RateLimiter::new(config.upload.rate_limit_delay());
        Self {
            config,
            store: None,
            limiter,
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn MigrationProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.store.is_none()
    }

    /// Fetch the target database to prove the token and id are usable.
    ///
    /// Returns the database title, or `None` in a dry run.
    pub async fn preflight(&self) -> Result<Option<String>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let database_id = &self.config.notion.database_id;
        self.limiter.acquire().await;
        let title = store
            .retrieve_database(database_id)
            .await
            .with_context(|| format!("Cannot access database {}", database_id))?;
        tracing::info!("Connected to database: {}", title);
        Ok(Some(title))
    }

    pub async fn run(&self) -> Result<MigrationReport> {
        let started = Instant::now();
        let dry_run = self.is_dry_run();
        tracing::info!(
            "Starting vault migration{}",
            if dry_run { " (dry run)" } else { "" }
        );
        self.preflight().await?;

        let failed = FailedFiles::default();
        let mut failed_pages = 0;

        tracing::info!("Phase 1: Discovering files...");
        self.progress.report(MigrationProgressEvent::Discovering);
        let scan = scan_vault(&self.config)?;
        for failure in &scan.failures {
            failed_pages += 1;
            if let PageError::Read { path, .. } = failure {
                failed.push(path.clone());
            }
        }
        let documents = scan.documents;
        if documents.is_empty() {
            tracing::warn!("No Markdown files found in vault");
        }

        tracing::info!("Phase 2: Analyzing assets...");
        let resolver = PathResolver::new(&self.config.vault.root, &self.config.vault.attachments_folder);
        let discovery = discover_assets(&documents, &resolver);
        for failure in &discovery.failures {
            failed.push(failure.path.clone());
        }
        let assets = discovery.assets;
        tracing::info!("Found {} unique assets to upload", assets.len());
        self.progress.report(MigrationProgressEvent::Analyzing {
            assets: assets.len() as u64,
        });

        let vault_root = resolver.vault_root();
        let aliases = discovery.aliases;
        let mut asset_map = AssetMap::new();
        let mut successful_uploads = 0;
        match &self.store {
            None => {
                for (i, record) in assets.iter().enumerate() {
                    asset_map.insert(record, vault_root, &format!("dry-run-upload-{}", i));
                    successful_uploads += 1;
                }
            }
            Some(store) => {
                tracing::info!("Phase 3: Uploading assets...");
                let engine = UploadEngine::new(
                    store.clone(),
                    self.limiter.clone(),
                    self.config.upload.clone(),
                )
                .with_failed_files(failed.clone());
                let outcomes = engine
                    .upload_all(
                        assets.clone(),
                        self.config.upload.max_workers,
                        self.progress.as_ref(),
                    )
                    .await;
                for (record, outcome) in &outcomes {
                    if let Some(id) = outcome.upload_id() {
                        asset_map.insert(record, vault_root, id);
                        successful_uploads += 1;
                    }
                }
            }
        }
        asset_map.insert_aliases(&aliases);

        tracing::info!("Phase 4: Creating database entries...");
        let writer = self.store.as_ref().map(|store| {
            PageWriter::new(
                store.clone(),
                self.limiter.clone(),
                self.config.notion.database_id.clone(),
            )
        });

        let total = documents.len();
        let mut migrated_pages = Vec::with_capacity(total);
        for (i, document) in documents.iter().enumerate() {
            let blocks = parse_blocks(&document.body, &asset_map);
            let properties = map_properties(
                &document.front_matter,
                &document.title,
                &self.config.notion.title_property,
            );

            match self
                .write_page(writer.as_ref(), document, &properties, &blocks)
                .await
            {
                Ok(write) => {
                    tracing::info!(
                        "Successfully migrated: {} -> {}",
                        document.path.display(),
                        write.page_id
                    );
                    migrated_pages.push(MigratedPage {
                        source_file: document.path.display().to_string(),
                        page_id: write.page_id,
                        title: document.title.clone(),
                        frontmatter: document.front_matter.to_json(),
                        block_count: write.block_count,
                        missing_files: missing_files(&blocks),
                        partial: write.partial,
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to migrate {}: {}", document.path.display(), e);
                    failed_pages += 1;
                    failed.push(document.path.clone());
                }
            }

            self.progress.report(MigrationProgressEvent::Writing {
                n: (i + 1) as u64,
                total: total as u64,
            });
            if !dry_run && i + 1 < total {
                tokio::time::sleep(self.limiter.delay()).await;
            }
        }

        let successful_pages = migrated_pages.len();
        let summary = MigrationSummary {
            duration_seconds: (started.elapsed().as_secs_f64() * 100.0).round() / 100.0,
            total_pages_processed: successful_pages + failed_pages,
            successful_pages,
            failed_pages,
            total_assets: assets.len(),
            successful_uploads,
            failed_uploads: assets.len() - successful_uploads,
            dry_run,
        };

        tracing::info!("Migration completed in {:.2} seconds", summary.duration_seconds);
        tracing::info!(
            "Pages: {} successful, {} failed",
            summary.successful_pages,
            summary.failed_pages
        );
        tracing::info!(
            "Assets: {} uploaded, {} failed",
            summary.successful_uploads,
            summary.failed_uploads
        );

        Ok(MigrationReport {
            migration_summary: summary,
            migrated_pages,
            uploaded_assets: asset_map
                .iter()
                .map(|(name, id)| (name.to_string(), id.to_string()))
                .collect(),
            failed_files: failed
                .snapshot()
                .iter()
                .map(|p| p.display().to_string())
                .collect(),
            asset_stats: AssetStats::from_records(&assets),
            generated_at: Utc::now(),
        })
    }

    async fn write_page(
        &self,
        writer: Option<&PageWriter>,
        document: &SourceDocument,
        properties: &PropertyMap,
        blocks: &[Block],
    ) -> Result<PageWrite, PageError> {
        match writer {
            Some(writer) => writer.write(&document.title, properties, blocks).await,
            None => {
                tracing::info!(
                    "[DRY RUN] Would create database entry: {} with {} blocks",
                    document.title,
                    blocks.len()
                );
                Ok(PageWrite {
                    page_id: DRY_RUN_PAGE_ID.to_string(),
                    block_count: blocks.len(),
                    partial: false,
                    blocks_dropped: 0,
                })
            }
        }
    }
}
