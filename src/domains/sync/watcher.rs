//! Directory synchronizer.
//!
//! Keeps the catalog in step with a resources directory and a tools
//! directory: a full scan at start-up, then one background task applying
//! filesystem events strictly in order.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::error::SyncError;
use super::events::{self, FsChange};
use crate::domains::catalog::Catalog;

/// Pending filesystem events held before the watcher thread is made to wait.
const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Lifecycle of the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Stopped,
    Starting,
    Running,
}

/// Point-in-time view of the synchronizer and the catalog it feeds.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStats {
    pub running: bool,
    pub resources_dir: PathBuf,
    pub tools_dir: PathBuf,
    pub resources: usize,
    pub tools: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Resource,
    Tool,
}

/// The two watched roots, used to decide which collection a path belongs to.
#[derive(Debug, Clone)]
struct WatchedDirs {
    resources: PathBuf,
    tools: PathBuf,
}

impl WatchedDirs {
    fn kind_of(&self, path: &Path) -> Option<EntryKind> {
        if path == self.resources || path == self.tools {
            return None;
        }
        let in_resources = path.starts_with(&self.resources);
        let in_tools = path.starts_with(&self.tools);
        match (in_resources, in_tools) {
            (true, false) => Some(EntryKind::Resource),
            (false, true) => Some(EntryKind::Tool),
            // Nested roots: the deeper one wins.
            (true, true) => {
                if self.tools.components().count() > self.resources.components().count() {
                    Some(EntryKind::Tool)
                } else {
                    Some(EntryKind::Resource)
                }
            }
            (false, false) => None,
        }
    }
}

struct RunningLoop {
    watcher: RecommendedWatcher,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Watches the resources and tools directories and mirrors them into a
/// [`Catalog`].
pub struct DirectorySync {
    catalog: Arc<Catalog>,
    resources_dir: PathBuf,
    tools_dir: PathBuf,
    state: Mutex<SyncState>,
    active: tokio::sync::Mutex<Option<RunningLoop>>,
}

impl DirectorySync {
    pub fn new(
        catalog: Arc<Catalog>,
        resources_dir: impl Into<PathBuf>,
        tools_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            catalog,
            resources_dir: resources_dir.into(),
            tools_dir: tools_dir.into(),
            state: Mutex::new(SyncState::Stopped),
            active: tokio::sync::Mutex::new(None),
        }
    }

    pub fn state(&self) -> SyncState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: SyncState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn is_running(&self) -> bool {
        self.state() == SyncState::Running
    }

    pub fn stats(&self) -> SyncStats {
        let counts = self.catalog.counts();
        SyncStats {
            running: self.is_running(),
            resources_dir: self.resources_dir.clone(),
            tools_dir: self.tools_dir.clone(),
            resources: counts.resources,
            tools: counts.tools,
        }
    }

    /// Create the directories, start watching, scan what is already there,
    /// then spawn the event loop.
    ///
    /// Every existing file is registered before this returns. If any step
    /// fails no background task is left behind.
    pub async fn start(&self) -> Result<(), SyncError> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(SyncError::AlreadyRunning);
        }

        self.set_state(SyncState::Starting);
        match self.launch().await {
            Ok(running) => {
                *active = Some(running);
                self.set_state(SyncState::Running);
                info!(
                    "Directory synchronizer started for resources: {}, tools: {}",
                    self.resources_dir.display(),
                    self.tools_dir.display()
                );
                Ok(())
            }
            Err(e) => {
                self.set_state(SyncState::Stopped);
                Err(e)
            }
        }
    }

    /// Stop the event loop and release the watch.
    ///
    /// Returns only once the loop has exited. Calling it while stopped does
    /// nothing.
    pub async fn stop(&self) {
        let mut active = self.active.lock().await;
        let Some(RunningLoop {
            watcher,
            stop,
            task,
        }) = active.take()
        else {
            return;
        };

        let _ = stop.send(());
        if let Err(e) = task.await {
            warn!("Synchronizer event loop ended abnormally: {}", e);
        }
        drop(watcher);

        self.set_state(SyncState::Stopped);
        info!("Directory synchronizer stopped");
    }

    /// Directory creation, the watch setup and the scan (which may `dlopen`
    /// plugins) run on the blocking pool.
    async fn launch(&self) -> Result<RunningLoop, SyncError> {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let catalog = Arc::clone(&self.catalog);
        let resources_dir = self.resources_dir.clone();
        let tools_dir = self.tools_dir.clone();

        let (watcher, dirs) = tokio::task::spawn_blocking(move || {
            watch_and_scan(&catalog, &resources_dir, &tools_dir, tx)
        })
        .await??;

        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(event_loop(Arc::clone(&self.catalog), dirs, rx, stop_rx));

        Ok(RunningLoop {
            watcher,
            stop,
            task,
        })
    }
}

type EventSender = mpsc::Sender<notify::Result<Event>>;

fn watch_and_scan(
    catalog: &Catalog,
    resources_dir: &Path,
    tools_dir: &Path,
    tx: EventSender,
) -> Result<(RecommendedWatcher, WatchedDirs), SyncError> {
    let dirs = WatchedDirs {
        resources: prepare_dir(resources_dir)?,
        tools: prepare_dir(tools_dir)?,
    };

    // The callback runs on the watcher's own thread, so blocking here only
    // applies back-pressure to notify while the event loop catches up.
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let _ = tx.blocking_send(res);
    })
    .map_err(|source| SyncError::Watch {
        path: dirs.resources.clone(),
        source,
    })?;

    for dir in [&dirs.resources, &dirs.tools] {
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| SyncError::Watch {
                path: dir.clone(),
                source,
            })?;
    }

    scan_directory(catalog, &dirs.resources, EntryKind::Resource)?;
    scan_directory(catalog, &dirs.tools, EntryKind::Tool)?;

    Ok((watcher, dirs))
}

/// Create `dir` if needed and return its canonical form, which is also the
/// form `notify` reports event paths in.
fn prepare_dir(dir: &Path) -> Result<PathBuf, SyncError> {
    std::fs::create_dir_all(dir).map_err(|source| SyncError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    dir.canonicalize().map_err(|source| SyncError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

#[instrument(skip(catalog))]
fn scan_directory(catalog: &Catalog, dir: &Path, kind: EntryKind) -> Result<(), SyncError> {
    let scan_err = |source| SyncError::Scan {
        path: dir.to_path_buf(),
        source,
    };

    for entry in std::fs::read_dir(dir).map_err(scan_err)? {
        let entry = entry.map_err(scan_err)?;
        if entry.file_type().map_err(scan_err)?.is_dir() {
            continue;
        }
        register(catalog, kind, &entry.path());
    }
    Ok(())
}

async fn event_loop(
    catalog: Arc<Catalog>,
    dirs: WatchedDirs,
    mut queue: mpsc::Receiver<notify::Result<Event>>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            event = queue.recv() => match event {
                Some(Ok(event)) => {
                    // Tool loads block; events are still applied one at a time.
                    let catalog = Arc::clone(&catalog);
                    let dirs = dirs.clone();
                    let batch = tokio::task::spawn_blocking(move || {
                        for (change, path) in events::changes(&event) {
                            apply(&catalog, &dirs, change, &path);
                        }
                    });
                    if let Err(e) = batch.await {
                        warn!("Failed to apply filesystem event: {}", e);
                    }
                }
                Some(Err(e)) => warn!("Watcher error: {}", e),
                None => break,
            },
        }
    }
    debug!("Synchronizer event loop exited");
}

/// Apply one change to the catalog. Failures are logged, never propagated.
fn apply(catalog: &Catalog, dirs: &WatchedDirs, change: FsChange, path: &Path) {
    if is_hidden(path) {
        return;
    }
    let Some(kind) = dirs.kind_of(path) else {
        return;
    };

    match change {
        FsChange::Created | FsChange::Written => {
            if path.is_dir() {
                return;
            }
            register(catalog, kind, path);
        }
        FsChange::Removed | FsChange::Renamed => {
            let Some(name) = entry_name(path) else {
                return;
            };
            match kind {
                EntryKind::Resource => catalog.unregister_resource(&name),
                EntryKind::Tool => catalog.unregister_tool(&name),
            };
        }
    }
}

fn register(catalog: &Catalog, kind: EntryKind, path: &Path) {
    if is_hidden(path) {
        return;
    }
    let Some(name) = entry_name(path) else {
        return;
    };

    match kind {
        EntryKind::Resource => {
            catalog.register_resource(name, path);
        }
        EntryKind::Tool => {
            let description = format!("MCP tool: {name}");
            if let Err(e) = catalog.register_tool(&name, path, description) {
                warn!("Failed to register tool {}: {}", name, e);
            }
        }
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

/// The catalog name of a file: its base name without the extension.
fn entry_name(path: &Path) -> Option<String> {
    path.file_stem().map(|stem| stem.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn eventually(check: impl Fn() -> bool) -> bool {
        for _ in 0..100 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        check()
    }

    fn sync_in(root: &TempDir) -> (Arc<Catalog>, DirectorySync) {
        let catalog = Arc::new(Catalog::new());
        let sync = DirectorySync::new(
            Arc::clone(&catalog),
            root.path().join("resources"),
            root.path().join("tools"),
        );
        (catalog, sync)
    }

    #[test]
    fn test_entry_name_and_hidden() {
        assert_eq!(entry_name(Path::new("/r/notes.md")).as_deref(), Some("notes"));
        assert_eq!(entry_name(Path::new("/r/a.tar.gz")).as_deref(), Some("a.tar"));
        assert_eq!(entry_name(Path::new("/r/README")).as_deref(), Some("README"));
        assert!(is_hidden(Path::new("/r/.notes.md.swp")));
        assert!(!is_hidden(Path::new("/r/notes.md")));
    }

    #[test]
    fn test_kind_of() {
        let dirs = WatchedDirs {
            resources: PathBuf::from("/srv/resources"),
            tools: PathBuf::from("/srv/tools"),
        };
        assert_eq!(dirs.kind_of(Path::new("/srv/resources/a.md")), Some(EntryKind::Resource));
        assert_eq!(dirs.kind_of(Path::new("/srv/tools/a.py")), Some(EntryKind::Tool));
        assert_eq!(dirs.kind_of(Path::new("/srv/other/a.md")), None);
        assert_eq!(dirs.kind_of(Path::new("/srv/resources-old/a.md")), None);
        assert_eq!(dirs.kind_of(Path::new("/srv/resources")), None);
        assert_eq!(dirs.kind_of(Path::new("/srv/tools")), None);
    }

    #[test]
    fn test_apply_ignores_watched_roots() {
        let catalog = Catalog::new();
        let dirs = WatchedDirs {
            resources: PathBuf::from("/srv/resources"),
            tools: PathBuf::from("/srv/tools"),
        };
        catalog.register_resource("resources", "/srv/resources/resources.md");

        apply(&catalog, &dirs, FsChange::Removed, Path::new("/srv/resources"));
        apply(&catalog, &dirs, FsChange::Created, Path::new("/srv/tools"));

        assert!(catalog.get_resource("resources").is_some());
        assert_eq!(catalog.tool_count(), 0);
    }

    #[test]
    fn test_apply_ignores_hidden_and_foreign_paths() {
        let catalog = Catalog::new();
        let dirs = WatchedDirs {
            resources: PathBuf::from("/srv/resources"),
            tools: PathBuf::from("/srv/tools"),
        };

        apply(&catalog, &dirs, FsChange::Created, Path::new("/srv/resources/.draft.md"));
        apply(&catalog, &dirs, FsChange::Created, Path::new("/elsewhere/notes.md"));
        assert_eq!(catalog.resource_count(), 0);

        apply(&catalog, &dirs, FsChange::Written, Path::new("/srv/resources/notes.md"));
        assert!(catalog.get_resource("notes").is_some());

        apply(&catalog, &dirs, FsChange::Renamed, Path::new("/srv/resources/notes.md"));
        assert!(catalog.get_resource("notes").is_none());
    }

    #[tokio::test]
    async fn test_start_scans_existing_files() {
        let root = TempDir::new().unwrap();
        let resources = root.path().join("resources");
        let tools = root.path().join("tools");
        fs::create_dir_all(resources.join("nested")).unwrap();
        fs::create_dir_all(&tools).unwrap();

        fs::write(resources.join("data.json"), "{}").unwrap();
        fs::write(resources.join("notes.md"), "# hi").unwrap();
        fs::write(resources.join(".hidden.txt"), "secret").unwrap();
        fs::write(tools.join("analyze.py"), "print('{}')").unwrap();
        fs::write(tools.join(".scratch.py"), "").unwrap();
        fs::write(tools.join("broken.so"), "not a library").unwrap();
        fs::write(tools.join("notes.txt"), "unsupported").unwrap();

        let (catalog, sync) = sync_in(&root);
        sync.start().await.unwrap();

        let mut resource_names = catalog.resource_names();
        resource_names.sort();
        assert_eq!(resource_names, vec!["data", "notes"]);
        assert_eq!(catalog.tool_names(), vec!["analyze"]);

        sync.stop().await;
    }

    #[tokio::test]
    async fn test_live_resource_lifecycle() {
        let root = TempDir::new().unwrap();
        let (catalog, sync) = sync_in(&root);

        sync.start().await.unwrap();
        assert!(sync.is_running());
        assert_eq!(catalog.resource_count(), 0);
        assert_eq!(catalog.tool_count(), 0);

        let notes = root.path().join("resources").join("notes.md");
        fs::write(&notes, "# Notes").unwrap();
        assert!(eventually(|| catalog.get_resource("notes").is_some()).await);
        assert_eq!(catalog.get_resource("notes").unwrap().mime_type, "text/markdown");

        fs::remove_file(&notes).unwrap();
        assert!(eventually(|| catalog.get_resource("notes").is_none()).await);

        sync.stop().await;
    }

    #[tokio::test]
    async fn test_live_tool_rename() {
        let root = TempDir::new().unwrap();
        let (catalog, sync) = sync_in(&root);
        sync.start().await.unwrap();

        let tools = root.path().join("tools");
        fs::write(tools.join("old.py"), "print('{}')").unwrap();
        assert!(eventually(|| catalog.get_tool("old").is_some()).await);

        fs::rename(tools.join("old.py"), tools.join("new.py")).unwrap();
        assert!(eventually(|| catalog.get_tool("old").is_none()).await);
        assert!(eventually(|| catalog.get_tool("new").is_some()).await);

        sync.stop().await;
    }

    #[tokio::test]
    async fn test_event_burst_is_fully_applied() {
        let root = TempDir::new().unwrap();
        let (catalog, sync) = sync_in(&root);
        sync.start().await.unwrap();

        let resources = root.path().join("resources");
        let total = EVENT_QUEUE_CAPACITY + 500;
        for i in 0..total {
            fs::write(resources.join(format!("doc{i}.txt")), "x").unwrap();
        }

        assert!(eventually(|| catalog.resource_count() == total).await);
        sync.stop().await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_lifecycle_on_single_threaded_runtime() {
        let root = TempDir::new().unwrap();
        let tools = root.path().join("tools");
        fs::create_dir_all(&tools).unwrap();
        fs::write(tools.join("broken.so"), "not a library").unwrap();

        let (catalog, sync) = sync_in(&root);
        sync.start().await.unwrap();
        assert_eq!(catalog.tool_count(), 0);

        fs::write(tools.join("report.py"), "print('{}')").unwrap();
        assert!(eventually(|| catalog.get_tool("report").is_some()).await);

        sync.stop().await;
        assert!(!sync.is_running());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_restartable() {
        let root = TempDir::new().unwrap();
        let (_catalog, sync) = sync_in(&root);

        sync.stop().await;
        assert_eq!(sync.state(), SyncState::Stopped);

        sync.start().await.unwrap();
        assert!(matches!(sync.start().await, Err(SyncError::AlreadyRunning)));

        sync.stop().await;
        sync.stop().await;
        assert!(!sync.is_running());

        sync.start().await.unwrap();
        assert!(sync.stats().running);
        sync.stop().await;
        assert!(!sync.stats().running);
    }

    #[tokio::test]
    async fn test_start_fails_when_directory_cannot_be_created() {
        let root = TempDir::new().unwrap();
        let blocker = root.path().join("resources");
        fs::write(&blocker, "a file where a directory should be").unwrap();

        let (_catalog, sync) = sync_in(&root);
        let err = sync.start().await.unwrap_err();
        assert!(matches!(err, SyncError::CreateDir { .. }));
        assert_eq!(sync.state(), SyncState::Stopped);
    }
}
