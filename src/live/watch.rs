//! Watch mode is implemented as a three-part system:
//!
//! 1. **File watcher**: the `notify` crate monitors the static roots of every
//!    layer's watch globs recursively. There is no debouncing, each matching
//!    event starts a compile of its layer on the worker pool.
//! 2. **WebSocket server**: [`LiveReload`] keeps the connections of open
//!    browser tabs on dedicated threads.
//! 3. **HTTP server** (feature `server`): serves the project root together
//!    with the client script connecting a page to the socket.
//!
//! Once a compile finished, successfully or not, every tab gets a full reload.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use glob::Pattern;
use notify::{Event, EventKind, RecursiveMode, Watcher};

use crate::config::{Layer, Registry};
use crate::error::WatchError;
use crate::live::{LiveReload, Notifier};
use crate::source::{self, MATCH};
use crate::style::StyleTask;

struct Watched {
    patterns: Vec<Pattern>,
    selectors: Vec<String>,
    task: StyleTask,
}

/// Maps file events onto the style layers they belong to.
pub struct WatchLoop {
    root: Utf8PathBuf,
    layers: Vec<Watched>,
    notifier: Arc<dyn Notifier>,
}

impl WatchLoop {
    pub fn new(registry: &Registry, notifier: Arc<dyn Notifier>) -> Result<Self, WatchError> {
        let mut layers = Vec::with_capacity(Layer::ALL.len());

        for layer in Layer::ALL {
            let selectors = registry.layer(layer).watch.clone();
            layers.push(Watched {
                patterns: source::patterns(&selectors)?,
                selectors,
                task: StyleTask::new(registry, layer, notifier.clone()),
            });
        }

        Ok(Self {
            root: registry.root.clone(),
            layers,
            notifier,
        })
    }

    /// Layers watching `path`, given relative to the project root.
    pub fn layers_for(&self, path: &Utf8Path) -> Vec<Layer> {
        self.layers
            .iter()
            .filter(|watched| {
                watched
                    .patterns
                    .iter()
                    .any(|p| p.matches_path_with(path.as_std_path(), MATCH))
            })
            .map(|watched| watched.task.layer())
            .collect()
    }

    /// Layers touched by a filesystem event, ignoring access and metadata
    /// noise as well as paths outside the project root.
    pub fn layers_for_event(&self, event: &Event) -> BTreeSet<Layer> {
        if !matches!(
            event.kind,
            EventKind::Create(..) | EventKind::Modify(..) | EventKind::Remove(..)
        ) {
            return BTreeSet::new();
        }

        event
            .paths
            .iter()
            .filter_map(|path| Utf8Path::from_path(path))
            .filter_map(|path| path.strip_prefix(&self.root).ok())
            .flat_map(|path| self.layers_for(path))
            .collect()
    }

    /// Compiles one layer, then asks every browser for a full reload.
    pub fn rebuild(&self, layer: Layer) {
        let Some(watched) = self.layers.iter().find(|w| w.task.layer() == layer) else {
            return;
        };

        tracing::info!(%layer, "change detected, recompiling");
        if let Err(e) = watched.task.build() {
            tracing::error!(%layer, "rebuild failed: {e}");
        }

        self.notifier.notify_reload();
    }

    /// Directories to subscribe to: the static prefix of every watch glob,
    /// the parent directory for literal files. Nested roots are collapsed and
    /// missing ones skipped.
    pub fn watch_roots(&self) -> Vec<Utf8PathBuf> {
        let mut roots = HashSet::new();

        for selector in self.layers.iter().flat_map(|w| &w.selectors) {
            let (fixed, suffix) = source::split_glob(selector);
            let fixed = match suffix.as_str() {
                "" => fixed.parent().map(Utf8Path::to_path_buf).unwrap_or_default(),
                _ => fixed,
            };

            let path = self.root.join(fixed);
            if !path.is_dir() {
                tracing::warn!(%path, "watch root does not exist, skipping");
                continue;
            }

            roots.insert(path);
        }

        source::collapse_paths(roots)
    }
}

/// Runs watch mode for `registry` until the process is interrupted.
pub fn watch(registry: Registry) -> anyhow::Result<()> {
    let root = registry.root.canonicalize_utf8()?;
    let registry = Registry { root, ..registry };

    let reload = Arc::new(LiveReload::bind(registry.root.clone())?);

    #[cfg(feature = "server")]
    let _thread_http = super::http::start(registry.root.clone(), reload.port());

    let looper = Arc::new(WatchLoop::new(&registry, reload)?);

    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx)?;

    for path in looper.watch_roots() {
        tracing::info!("watching {}", path);
        watcher.watch(path.as_std_path(), RecursiveMode::Recursive)?;
    }

    loop {
        match rx.recv() {
            Ok(Ok(event)) => {
                tracing::debug!("{:?} event received", event.kind);

                for layer in looper.layers_for_event(&event) {
                    let looper = looper.clone();
                    rayon::spawn(move || looper.rebuild(layer));
                }
            }
            Ok(Err(e)) => tracing::error!("watch error: {e}"),
            Err(_) => return Ok(()),
        }
    }
}
