//! Re-render a document every time it is saved
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save by writing a temp file and renaming it over the original are
//! still picked up. Passes run strictly one after another on the task that
//! owns the [`Pipeline`], which is what keeps the cache single-writer.

use anyhow::{Context, Result};
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::ffi::OsStr;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::logging::{operations, services, status};
use crate::pipeline::Pipeline;

/// Watches one document and renders it into one output path
#[derive(Debug, Clone)]
pub struct WatchLoop {
    document: PathBuf,
    output: PathBuf,
    debounce: Duration,
}

impl WatchLoop {
    pub fn new(document: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            document: document.into(),
            output: output.into(),
            debounce: Duration::from_millis(200),
        }
    }

    /// How long the document must stay quiet after a change before a pass runs
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Run one pass, logging the outcome. Returns whether it succeeded.
    pub fn render_once(&self, pipeline: &mut Pipeline) -> bool {
        match pipeline.render_file(&self.document, &self.output) {
            Ok(report) => {
                info!(
                    service = services::WATCH,
                    operation = operations::RENDER,
                    status = status::SUCCESS,
                    blocks = report.blocks,
                    cache_hits = report.cache_hits,
                    executions = report.executions,
                    "Rendered {}",
                    self.document.display()
                );
                true
            }
            Err(e) => {
                error!(
                    service = services::WATCH,
                    operation = operations::RENDER,
                    status = status::ERROR,
                    "Render of {} failed: {}",
                    self.document.display(),
                    e
                );
                false
            }
        }
    }

    /// Watch until Ctrl-C
    pub async fn run(&self, pipeline: &mut Pipeline) -> Result<()> {
        self.run_until(pipeline, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Watch until `shutdown` resolves.
    ///
    /// Every qualifying event pushes the next pass back by the debounce
    /// interval, so a burst of writes renders once, after the last of them.
    /// A failed pass is logged and the loop keeps waiting for the next save.
    pub async fn run_until<F>(&self, pipeline: &mut Pipeline, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let document_name = self
            .document
            .file_name()
            .map(OsStr::to_os_string)
            .with_context(|| format!("Not a file path: {}", self.document.display()))?;

        let (tx, mut rx) = mpsc::channel(32);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                // A full channel already has a pass queued
                Ok(event) => {
                    let _ = tx.try_send(event);
                }
                Err(e) => warn!(service = services::WATCH, "File watcher error: {}", e),
            }
        })
        .context("Failed to create file watcher")?;

        let watch_dir = match self.document.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        watcher
            .watch(watch_dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", watch_dir.display()))?;

        info!(
            service = services::WATCH,
            "Watching {} for changes (Ctrl-C to stop)",
            self.document.display()
        );

        tokio::pin!(shutdown);
        let mut pending: Option<Instant> = None;

        loop {
            let due = pending.unwrap_or_else(Instant::now);

            tokio::select! {
                _ = &mut shutdown => {
                    info!(service = services::WATCH, "Stopping watch");
                    break;
                }
                event = rx.recv() => {
                    let Some(event) = event else {
                        break;
                    };

                    if is_render_trigger(&event, &document_name) {
                        debug!(service = services::WATCH, kind = ?event.kind, "Change event, waiting for writes to settle");
                        pending = Some(Instant::now() + self.debounce);
                    }
                }
                _ = tokio::time::sleep_until(due), if pending.is_some() => {
                    pending = None;
                    info!(service = services::WATCH, "{} changed, re-rendering", self.document.display());
                    self.render_once(pipeline);
                }
            }
        }

        Ok(())
    }
}

/// Whether `event` means the document named `document_name` was saved
pub fn is_render_trigger(event: &Event, document_name: &OsStr) -> bool {
    let qualifies = match event.kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both)) => true,
        // Close events are only reported on Linux
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => cfg!(not(target_os = "linux")),
        _ => false,
    };

    qualifies
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(document_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::engine::QuickJsEvaluator;
    use crate::render::RendererRegistry;
    use crate::storage::MemoryArtifactStore;
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use std::ffi::OsString;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(
            Box::new(QuickJsEvaluator::new()),
            Box::new(MemoryCache::new()),
            RendererRegistry::with_defaults(),
            Arc::new(MemoryArtifactStore::default()),
        )
    }

    #[test]
    fn test_close_write_triggers() {
        let name = OsString::from("notes.md");
        let close = EventKind::Access(AccessKind::Close(AccessMode::Write));

        assert!(is_render_trigger(&event(close, "/docs/notes.md"), &name));
        assert!(!is_render_trigger(&event(close, "/docs/other.md"), &name));
    }

    #[test]
    fn test_replace_on_save_triggers() {
        let name = OsString::from("notes.md");

        let create = EventKind::Create(CreateKind::File);
        assert!(is_render_trigger(&event(create, "/docs/notes.md"), &name));

        let rename = EventKind::Modify(ModifyKind::Name(RenameMode::To));
        assert!(is_render_trigger(&event(rename, "/docs/notes.md"), &name));
    }

    #[test]
    fn test_unrelated_kinds_ignored() {
        let name = OsString::from("notes.md");

        let remove = EventKind::Remove(RemoveKind::File);
        assert!(!is_render_trigger(&event(remove, "/docs/notes.md"), &name));

        let open = EventKind::Access(AccessKind::Open(AccessMode::Any));
        assert!(!is_render_trigger(&event(open, "/docs/notes.md"), &name));
    }

    #[test]
    fn test_data_change_depends_on_platform() {
        let name = OsString::from("notes.md");
        let modify = EventKind::Modify(ModifyKind::Data(DataChange::Content));

        assert_eq!(
            is_render_trigger(&event(modify, "/docs/notes.md"), &name),
            cfg!(not(target_os = "linux"))
        );
    }

    #[test]
    fn test_render_once_reports_failure() {
        let dir = TempDir::new().unwrap();
        let document = dir.path().join("notes.md");
        let output = dir.path().join("out.md");
        let watch = WatchLoop::new(&document, &output);
        let mut pipeline = pipeline();

        std::fs::write(&document, "```js: throw new Error('no')\n```").unwrap();
        assert!(!watch.render_once(&mut pipeline));
        assert!(!output.exists());

        std::fs::write(&document, "```js: _ = 1 + 1\n```").unwrap();
        assert!(watch.render_once(&mut pipeline));
        assert!(std::fs::read_to_string(&output).unwrap().contains("`2`"));
    }

    #[tokio::test]
    async fn test_last_save_in_a_burst_is_rendered() {
        let dir = TempDir::new().unwrap();
        let document = dir.path().join("notes.md");
        let output = dir.path().join("out.md");
        std::fs::write(&document, "plain text").unwrap();

        let watch = WatchLoop::new(&document, &output).with_debounce(Duration::from_millis(100));
        let mut pipeline = pipeline();

        let edits = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            std::fs::write(&document, "```js: _ = 'v1'\n```").unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            std::fs::write(&document, "```js: _ = 'v2'\n```").unwrap();
            tokio::time::sleep(Duration::from_millis(1500)).await;
        };
        watch.run_until(&mut pipeline, edits).await.unwrap();

        let rendered = std::fs::read_to_string(&output).unwrap();
        assert!(rendered.contains("`v2`"), "stale output: {rendered}");
    }

    #[tokio::test]
    async fn test_run_until_stops_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let document = dir.path().join("notes.md");
        std::fs::write(&document, "plain text").unwrap();

        let watch = WatchLoop::new(&document, dir.path().join("out.md"));
        let mut pipeline = pipeline();

        watch
            .run_until(&mut pipeline, async {
                tokio::time::sleep(Duration::from_millis(50)).await;
            })
            .await
            .unwrap();
    }
}
