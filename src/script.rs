use std::fs;
use std::sync::Arc;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions};
use oxc::minifier::{Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

use crate::config::{Registry, ScriptEntry};
use crate::error::{ScriptError, TaskError};
use crate::io::{as_overhead, with_min_suffix, write_file};
use crate::live::Notifier;
use crate::source::{self, Source};
use crate::task::Task;

/// Minifies a set of scripts into the script directory.
///
/// Vendor drop-ins keep their file name, first-party scripts get the `.min`
/// suffix so the two can be told apart in the output directory.
pub struct ScriptTask {
    name: &'static str,
    root: Utf8PathBuf,
    sources: Vec<String>,
    dest: Utf8PathBuf,
    rename: bool,
    notifier: Arc<dyn Notifier>,
}

impl ScriptTask {
    fn new(
        name: &'static str,
        registry: &Registry,
        entry: &ScriptEntry,
        rename: bool,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            name,
            root: registry.root.clone(),
            sources: entry.sources.clone(),
            dest: registry.path(&entry.dest),
            rename,
            notifier,
        }
    }

    /// Third-party scripts, written under their original names.
    pub fn vendor(registry: &Registry, notifier: Arc<dyn Notifier>) -> Self {
        Self::new(
            "build-vendor-scripts",
            registry,
            &registry.vendor_js,
            false,
            notifier,
        )
    }

    /// First-party scripts, written as `<stem>.min.js`.
    pub fn theme(registry: &Registry, notifier: Arc<dyn Notifier>) -> Self {
        Self::new(
            "build-theme-scripts",
            registry,
            &registry.theme_js,
            true,
            notifier,
        )
    }

    /// Where `source` ends up.
    pub fn output_path(&self, source: &Source) -> Utf8PathBuf {
        let relative = source.relative();
        let relative = match self.rename {
            true => with_min_suffix(relative, relative.extension().unwrap_or("js")),
            false => relative.to_path_buf(),
        };

        self.dest.join(relative)
    }

    /// Minifies every script, then writes them all. Returns the written files.
    pub fn build(&self) -> Result<Vec<Utf8PathBuf>, ScriptError> {
        let s = Instant::now();
        let sources = source::resolve(&self.root, &self.sources)?;

        let mut outputs = Vec::with_capacity(sources.len());
        for source in &sources {
            let text = fs::read_to_string(&source.path)
                .map_err(|e| ScriptError::Read(source.path.clone(), e))?;

            let minified = minify(&source.path, &text)?;
            outputs.push((self.output_path(source), minified));
        }

        for (path, data) in &outputs {
            write_file(path, data).map_err(|e| ScriptError::Io(path.clone(), e))?;
        }

        let written: Vec<_> = outputs.into_iter().map(|(path, _)| path).collect();
        for path in &written {
            self.notifier.notify_asset(path);
        }

        tracing::info!(
            "Minified {} script(s) for {} {}",
            written.len(),
            self.name,
            as_overhead(s)
        );

        Ok(written)
    }
}

/// Parses `text` as a classic script, then compresses, mangles and prints
/// it without whitespace. Input that does not parse fails instead of being
/// passed through.
fn minify(path: &Utf8Path, text: &str) -> Result<String, ScriptError> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, text, SourceType::cjs()).parse();

    if parsed.panicked || !parsed.errors.is_empty() {
        let message = parsed
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ScriptError::Parse {
            path: path.to_path_buf(),
            message,
        });
    }

    let mut program = parsed.program;
    let minified = Minifier::new(MinifierOptions::default()).build(&allocator, &mut program);

    let code = Codegen::new()
        .with_options(CodegenOptions::minify())
        .with_scoping(minified.scoping)
        .build(&program)
        .code;

    Ok(code)
}

impl Task for ScriptTask {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self) -> Result<(), TaskError> {
        self.build()?;
        Ok(())
    }
}
