//! Style compilation.
//!
//! Every layer runs the same chain over in-memory buffers:
//!
//! 1. resolve the layer's selectors, skipping partials,
//! 2. compile `.scss` with `grass`, expanding glob imports on the way
//!    (plain `.css` skips this step),
//! 3. prefix and minify with `lightningcss`, producing a source map of the
//!    compiled CSS,
//! 4. write `<stem>.min.css` and `<stem>.min.css.map` to the layer directory.
//!
//! Writing only starts once every file of the layer compiled, so a syntax
//! error leaves the previous output of the layer untouched.

mod finish;
mod sass_glob;

use std::fs;
use std::sync::Arc;
use std::time::Instant;

use camino::Utf8PathBuf;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::config::{Layer, Registry};
use crate::error::{StyleError, TaskError};
use crate::io::{as_overhead, with_min_suffix, write_file};
use crate::live::Notifier;
use crate::source::{self, Source};
use crate::task::Task;

pub use finish::browsers;

/// A generated file held in memory until the whole layer compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Artifact {
    pub path: Utf8PathBuf,
    pub data: String,
}

/// Compiles one style layer into its output directory.
pub struct StyleTask {
    name: String,
    layer: Layer,
    root: Utf8PathBuf,
    sources: Vec<String>,
    dest: Utf8PathBuf,
    notifier: Arc<dyn Notifier>,
}

impl StyleTask {
    pub fn new(registry: &Registry, layer: Layer, notifier: Arc<dyn Notifier>) -> Self {
        let entry = registry.layer(layer);

        Self {
            name: format!("build-{layer}-styles"),
            layer,
            root: registry.root.clone(),
            sources: entry.sources.clone(),
            dest: registry.path(&entry.dest),
            notifier,
        }
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// Compiles every entry of the layer without touching the output
    /// directory. Compile errors are logged one by one.
    pub(crate) fn compile(&self) -> Result<Vec<Artifact>, TaskError> {
        let sources: Vec<_> = source::resolve(&self.root, &self.sources)
            .map_err(StyleError::from)?
            .into_iter()
            .filter(|s| !s.path.file_name().is_some_and(|name| name.starts_with('_')))
            .collect();

        let results: Vec<_> = sources
            .into_par_iter()
            .map(|source| self.compile_one(&source))
            .collect();

        let mut artifacts = Vec::new();
        let mut failed = 0;

        for result in results {
            match result {
                Ok(pair) => artifacts.extend(pair),
                Err(e @ StyleError::Compile { .. }) => {
                    tracing::error!(layer = %self.layer, "{e}");
                    failed += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if failed > 0 {
            return Err(TaskError::Aborted(failed));
        }

        Ok(artifacts)
    }

    fn compile_one(&self, source: &Source) -> Result<[Artifact; 2], StyleError> {
        let css = match source.path.extension() {
            Some("css") => fs::read_to_string(&source.path)
                .map_err(|e| StyleError::Read(source.path.clone(), e))?,
            _ => {
                let options = grass::Options::default()
                    .fs(&sass_glob::GlobFs)
                    .style(grass::OutputStyle::Expanded);

                grass::from_path(&source.path, &options).map_err(|e| StyleError::Compile {
                    path: source.path.clone(),
                    message: e.to_string(),
                })?
            }
        };

        let relative = with_min_suffix(source.relative(), "css");
        let path = self.dest.join(&relative);
        let map_path = Utf8PathBuf::from(format!("{path}.map"));
        let map_name = map_path.file_name().unwrap_or_default();

        // grass emits no source map, so the map describes the compiled CSS
        // and names it after the source with a `.css` extension.
        let compiled = source.relative().with_extension("css");

        let finished = finish::finish(&css, compiled.as_str(), map_name).map_err(
            |message| StyleError::Compile {
                path: source.path.clone(),
                message,
            },
        )?;

        Ok([
            Artifact {
                path,
                data: finished.css,
            },
            Artifact {
                path: map_path,
                data: finished.map,
            },
        ])
    }

    /// Compiles the layer, writes the result and notifies browsers of every
    /// rewritten stylesheet. Returns the written stylesheets.
    pub fn build(&self) -> Result<Vec<Utf8PathBuf>, TaskError> {
        let s = Instant::now();
        let artifacts = self.compile()?;

        for artifact in &artifacts {
            write_file(&artifact.path, &artifact.data)
                .map_err(|e| StyleError::Io(artifact.path.clone(), e))?;
        }

        let written: Vec<_> = artifacts
            .into_iter()
            .map(|artifact| artifact.path)
            .filter(|path| path.extension() == Some("css"))
            .collect();

        for path in &written {
            self.notifier.notify_asset(path);
        }

        tracing::info!(
            "Compiled {} {} stylesheet(s) {}",
            self.layer,
            written.len(),
            as_overhead(s)
        );

        Ok(written)
    }
}

impl Task for StyleTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self) -> Result<(), TaskError> {
        self.build().map(|_| ())
    }
}
