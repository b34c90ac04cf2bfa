//! Asset upload engine.
//!
//! Uploads are content-addressed: the [`UploadCache`] maps a file's SHA-256
//! to the upload id it received, and holds one in-flight cell per hash so
//! that two workers uploading identical bytes under different names result
//! in a single transfer.
//!
//! # Transfer Strategy
//!
//! | Size | Calls |
//! |------|-------|
//! | ≤ 20 MiB | create, send |
//! | > 20 MiB | create (`multi_part`, `number_of_parts`), send × parts, complete |
//!
//! Every call waits on the shared [`RateLimiter`] first.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncReadExt;
use tokio::sync::{OnceCell, Semaphore};
use tokio::task::JoinSet;

use crate::client::{CreateUpload, RemoteStore, UploadPart};
use crate::config::UploadConfig;
use crate::error::{TransportError, UploadError};
use crate::models::{AssetRecord, UploadOutcome};
use crate::progress::{MigrationProgressEvent, MigrationProgressReporter};
use crate::ratelimit::RateLimiter;

/// Size of one multi-part chunk, and the largest single-request upload.
pub const PART_SIZE: u64 = 20 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStrategy {
    Single,
    MultiPart { parts: u64 },
}

pub fn strategy_for(size: u64) -> TransferStrategy {
    if size <= PART_SIZE {
        TransferStrategy::Single
    } else {
        TransferStrategy::MultiPart {
            parts: size.div_ceil(PART_SIZE),
        }
    }
}

/// Make a file name acceptable to the upload endpoint.
pub fn sanitize_filename(name: &str) -> String {
    let decoded = urlencoding::decode(name)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| name.to_string());

    let mut out = String::with_capacity(decoded.len());
    for c in decoded.chars() {
        match c {
            '=' | '$' | '?' => out.push('_'),
            '&' => out.push_str("_and_"),
            '%' => out.push_str("_percent_"),
            '#' => out.push_str("_hash_"),
            '+' => out.push_str("_plus_"),
            '<' | '>' | ':' | '"' | '|' | '*' => out.push('_'),
            other => out.push(other),
        }
    }

    let mut collapsed = String::with_capacity(out.len());
    for c in out.chars() {
        if c == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(c);
    }
    collapsed.trim_matches('_').to_string()
}

/// Content hash → upload id, shared by all upload workers.
#[derive(Clone, Default)]
pub struct UploadCache {
    cells: Arc<Mutex<HashMap<String, Arc<OnceCell<String>>>>>,
}

impl UploadCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, hash: &str) -> Arc<OnceCell<String>> {
        let mut cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.entry(hash.to_string()).or_default().clone()
    }

    /// Upload id already recorded for `hash`.
    pub fn get(&self, hash: &str) -> Option<String> {
        let cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.get(hash).and_then(|cell| cell.get().cloned())
    }

    /// Number of hashes with a completed upload.
    pub fn len(&self) -> usize {
        let cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.values().filter(|cell| cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Paths that failed during the run, appended to by every worker.
#[derive(Clone, Default)]
pub struct FailedFiles {
    paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl FailedFiles {
    pub fn push(&self, path: PathBuf) {
        self.paths
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(path);
    }

    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.paths.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[derive(Clone)]
pub struct UploadEngine {
    store: Arc<dyn RemoteStore>,
    limiter: RateLimiter,
    cache: UploadCache,
    failed: FailedFiles,
    config: UploadConfig,
}

impl UploadEngine {
    pub fn new(store: Arc<dyn RemoteStore>, limiter: RateLimiter, config: UploadConfig) -> Self {
        Self {
            store,
            limiter,
            cache: UploadCache::new(),
            failed: FailedFiles::default(),
            config,
        }
    }

    /// Share `failed` with the rest of the run.
    pub fn with_failed_files(mut self, failed: FailedFiles) -> Self {
        self.failed = failed;
        self
    }

    pub fn cache(&self) -> &UploadCache {
        &self.cache
    }

    pub fn failed_files(&self) -> &FailedFiles {
        &self.failed
    }

    /// Upload one asset, or reuse the upload of identical content.
    pub async fn upload(&self, record: &AssetRecord) -> UploadOutcome {
        let result = self.try_upload(record).await;
        if let Err(e) = &result {
            tracing::error!("Upload failed: {}", e);
            self.failed.push(record.path.clone());
        }
        UploadOutcome {
            path: record.path.clone(),
            result,
        }
    }

    async fn try_upload(&self, record: &AssetRecord) -> Result<String, UploadError> {
        self.validate(record)?;

        let cell = self.cache.cell(&record.hash);
        if let Some(id) = cell.get() {
            tracing::debug!("File already uploaded: {}", record.name);
            return Ok(id.clone());
        }

        let id = cell
            .get_or_try_init(|| async {
                self.transfer(record)
                    .await
                    .map_err(|source| UploadError::Transport {
                        name: record.name.clone(),
                        source,
                    })
            })
            .await?;
        Ok(id.clone())
    }

    fn validate(&self, record: &AssetRecord) -> Result<(), UploadError> {
        if record.size > self.config.max_file_size {
            return Err(UploadError::TooLarge {
                size_mb: record.size as f64 / (1024.0 * 1024.0),
                max_mb: self.config.max_file_size as f64 / (1024.0 * 1024.0),
            });
        }
        let ext = record.extension();
        if !self.config.allows_extension(&ext) {
            return Err(UploadError::UnsupportedExtension(ext));
        }
        if !record.path.is_file() {
            return Err(UploadError::NotFound(record.path.clone()));
        }
        Ok(())
    }

    async fn transfer(&self, record: &AssetRecord) -> Result<String, TransportError> {
        let filename = sanitize_filename(&record.name);
        if filename != record.name {
            tracing::debug!("Sanitized filename: {} -> {}", record.name, filename);
        }
        tracing::info!("Uploading file: {} ({} bytes)", record.name, record.size);

        let id = match strategy_for(record.size) {
            TransferStrategy::Single => self.transfer_single(record, filename).await?,
            TransferStrategy::MultiPart { parts } => {
                tracing::info!(
                    "Using multipart upload for large file: {} ({} parts)",
                    record.name,
                    parts
                );
                self.transfer_multi_part(record, filename, parts).await?
            }
        };

        tracing::info!("Successfully uploaded: {} -> {}", record.name, id);
        Ok(id)
    }

    async fn transfer_single(
        &self,
        record: &AssetRecord,
        filename: String,
    ) -> Result<String, TransportError> {
        self.limiter.acquire().await;
        let id = self
            .store
            .create_upload(&CreateUpload {
                filename: filename.clone(),
                file_size: record.size,
                number_of_parts: None,
            })
            .await?;

        let bytes = tokio::fs::read(&record.path).await?;
        self.limiter.acquire().await;
        self.store
            .send_upload(
                &id,
                UploadPart {
                    filename,
                    mime_type: record.mime_type.clone(),
                    bytes,
                    part_number: None,
                },
            )
            .await?;
        Ok(id)
    }

    async fn transfer_multi_part(
        &self,
        record: &AssetRecord,
        filename: String,
        parts: u64,
    ) -> Result<String, TransportError> {
        self.limiter.acquire().await;
        let id = self
            .store
            .create_upload(&CreateUpload {
                filename: filename.clone(),
                file_size: record.size,
                number_of_parts: Some(parts),
            })
            .await?;

        let mut file = tokio::fs::File::open(&record.path).await?;
        for part_number in 1..=parts {
            let mut bytes = Vec::with_capacity(PART_SIZE as usize);
            (&mut file).take(PART_SIZE).read_to_end(&mut bytes).await?;
            if bytes.is_empty() {
                break;
            }
            tracing::debug!("Uploading part {}/{} for {}", part_number, parts, record.name);
            self.limiter.acquire().await;
            self.store
                .send_upload(
                    &id,
                    UploadPart {
                        filename: filename.clone(),
                        mime_type: record.mime_type.clone(),
                        bytes,
                        part_number: Some(part_number),
                    },
                )
                .await?;
        }

        self.limiter.acquire().await;
        self.store.complete_upload(&id).await?;
        Ok(id)
    }

    /// Upload every record on a pool of `workers` concurrent tasks.
    ///
    /// Results come back in completion order.
    pub async fn upload_all(
        &self,
        records: Vec<AssetRecord>,
        workers: usize,
        progress: &dyn MigrationProgressReporter,
    ) -> Vec<(AssetRecord, UploadOutcome)> {
        let total = records.len() as u64;
        let semaphore = Arc::new(Semaphore::new(workers.max(1)));
        let mut tasks = JoinSet::new();

        tracing::info!("Starting batch upload of {} files", total);
        for record in records {
            let engine = self.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = engine.upload(&record).await;
                (record, outcome)
            });
        }

        let mut results = Vec::with_capacity(total as usize);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(pair) => results.push(pair),
                Err(e) => tracing::error!("Upload task failed: {}", e),
            }
            progress.report(MigrationProgressEvent::Uploading {
                n: results.len() as u64,
                total,
            });
        }

        let ok = results.iter().filter(|(_, o)| o.is_success()).count();
        tracing::info!("Batch upload completed: {}/{} successful", ok, total);
        results
    }
}
