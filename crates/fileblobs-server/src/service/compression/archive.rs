//! Zip assembly over a [`BlobSource`].
//!
//! Two modes share one plan type:
//!
//! - [`ZipBundler::stream`] emits archive bytes as each entry completes, so
//!   the response starts before every blob is fetched. Once bytes are on the
//!   wire a failure can only truncate the stream.
//! - [`ZipBundler::buffer`] fetches everything first and fails with an empty
//!   result when nothing could be fetched.
//!
//! In both modes a blob that cannot be fetched is skipped and counted, and
//! only the first entry with a given path is written.

use std::collections::HashSet;
use std::io::{self, Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use fileblobs_storage::key::{folder_relative_path, selection_relative_path};
use fileblobs_storage::{BlobSource, StorageError, StorageResult};
use futures::Stream;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Tracing target for archive assembly.
const TRACING_TARGET: &str = "fileblobs_server::service::compression";

/// One blob and the path it takes inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    pub key: String,
    pub path: String,
}

/// The ordered entries of one archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundlePlan {
    scope: String,
    entries: Vec<BundleEntry>,
}

impl BundlePlan {
    /// Entries keyed by their path relative to the downloaded folder.
    pub fn folder<I>(prefix: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let entries = keys
            .into_iter()
            .filter_map(|key| {
                let path = folder_relative_path(&key, prefix)?.to_owned();
                Some(BundleEntry { key, path })
            })
            .collect();

        Self {
            scope: format!("folder '{prefix}'"),
            entries,
        }
    }

    /// Entries for user-selected keys, relative to the listing prefix.
    pub fn selection<I>(prefix: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let entries = keys
            .into_iter()
            .filter_map(|key| {
                let path = selection_relative_path(&key, prefix)?.to_owned();
                Some(BundleEntry { key, path })
            })
            .collect();

        Self {
            scope: "selection".to_owned(),
            entries,
        }
    }

    /// Entries stored under their full key.
    pub fn full_keys<I>(scope: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let entries = keys
            .into_iter()
            .filter(|key| !key.is_empty())
            .map(|key| BundleEntry {
                path: key.clone(),
                key,
            })
            .collect();

        Self {
            scope: scope.into(),
            entries,
        }
    }

    /// Describes what the plan bundles, for errors and logs.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn entries(&self) -> &[BundleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
struct ReportCounters {
    written: AtomicUsize,
    skipped: AtomicUsize,
    duplicates: AtomicUsize,
}

/// Counters describing an archive, shared with a running stream.
#[derive(Debug, Clone, Default)]
pub struct BundleReport(Arc<ReportCounters>);

impl BundleReport {
    /// Entries written to the archive.
    pub fn written(&self) -> usize {
        self.0.written.load(Ordering::Relaxed)
    }

    /// Entries whose blob could not be fetched.
    pub fn skipped(&self) -> usize {
        self.0.skipped.load(Ordering::Relaxed)
    }

    /// Entries dropped because their path was already written.
    pub fn duplicates(&self) -> usize {
        self.0.duplicates.load(Ordering::Relaxed)
    }

    fn add_written(&self) {
        self.0.written.fetch_add(1, Ordering::Relaxed);
    }

    fn add_skipped(&self) {
        self.0.skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn add_duplicate(&self) {
        self.0.duplicates.fetch_add(1, Ordering::Relaxed);
    }
}

/// Buffer the streaming writer appends to; drained after every entry.
#[derive(Debug, Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    fn take(&self) -> Bytes {
        let mut buffer = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        Bytes::from(std::mem::take(&mut *buffer))
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Builds zip archives from blobs.
#[derive(Debug, Clone)]
pub struct ZipBundler {
    options: SimpleFileOptions,
}

impl ZipBundler {
    /// Creates a bundler writing deflated entries.
    pub fn new() -> Self {
        Self {
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
        }
    }

    /// Streams the archive for `plan`, yielding bytes after each entry.
    ///
    /// An empty plan yields a valid empty archive.
    pub fn stream<S>(
        &self,
        plan: BundlePlan,
        source: Arc<S>,
        report: BundleReport,
    ) -> impl Stream<Item = StorageResult<Bytes>> + Send + 'static
    where
        S: BlobSource + ?Sized + 'static,
    {
        let options = self.options;

        async_stream::try_stream! {
            let sink = SharedSink::default();
            let mut writer = ZipWriter::new_stream(sink.clone());
            let mut seen = HashSet::new();

            for entry in plan.entries {
                if !seen.insert(entry.path.clone()) {
                    report.add_duplicate();
                    continue;
                }

                let data = match source.fetch(&entry.key).await {
                    Ok(data) => data,
                    Err(err) => {
                        tracing::warn!(
                            target: TRACING_TARGET,
                            key = %entry.key,
                            error = %err,
                            "Skipping blob that could not be fetched"
                        );
                        report.add_skipped();
                        continue;
                    }
                };

                writer.start_file(entry.path.as_str(), options).map_err(StorageError::archive)?;
                writer.write_all(&data).map_err(StorageError::archive)?;
                report.add_written();

                let chunk = sink.take();
                if !chunk.is_empty() {
                    yield chunk;
                }
            }

            writer.finish().map_err(StorageError::archive)?;

            tracing::debug!(
                target: TRACING_TARGET,
                scope = %plan.scope,
                written = report.written(),
                skipped = report.skipped(),
                duplicates = report.duplicates(),
                "Streamed archive"
            );

            let tail = sink.take();
            if !tail.is_empty() {
                yield tail;
            }
        }
    }

    /// Builds the whole archive for `plan` in memory.
    ///
    /// Fails with an empty result when no entry could be fetched.
    pub async fn buffer<S>(&self, plan: BundlePlan, source: &S) -> StorageResult<(Bytes, BundleReport)>
    where
        S: BlobSource + ?Sized,
    {
        let report = BundleReport::default();
        let mut seen = HashSet::new();
        let mut fetched = Vec::with_capacity(plan.len());

        for entry in plan.entries {
            if !seen.insert(entry.path.clone()) {
                report.add_duplicate();
                continue;
            }

            match source.fetch(&entry.key).await {
                Ok(data) => fetched.push((entry.path, data)),
                Err(err) => {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        key = %entry.key,
                        error = %err,
                        "Skipping blob that could not be fetched"
                    );
                    report.add_skipped();
                }
            }
        }

        if fetched.is_empty() {
            return Err(StorageError::empty_result(plan.scope));
        }

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (path, data) in fetched {
            writer.start_file(path.as_str(), self.options).map_err(StorageError::archive)?;
            writer.write_all(&data).map_err(StorageError::archive)?;
            report.add_written();
        }

        let archive = writer.finish().map_err(StorageError::archive)?.into_inner();

        tracing::debug!(
            target: TRACING_TARGET,
            scope = %plan.scope,
            written = report.written(),
            skipped = report.skipped(),
            size = archive.len(),
            "Buffered archive"
        );

        Ok((Bytes::from(archive), report))
    }
}

impl Default for ZipBundler {
    fn default() -> Self {
        Self::new()
    }
}
