use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Couldn't read config file '{0}'.\n{1}")]
    Read(Utf8PathBuf, std::io::Error),

    #[error("Couldn't parse config file '{0}'.\n{1}")]
    Parse(Utf8PathBuf, toml::de::Error),

    #[error("Current directory is not valid UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Couldn't compile glob pattern '{0}'.\n{1}")]
    Pattern(String, glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),
}

/// Errors raised while deleting generated directories.
#[derive(Debug, Error)]
#[error("Couldn't remove '{path}'.\n{source}")]
pub struct CleanError {
    pub path: Utf8PathBuf,
    pub source: std::io::Error,
}

/// Errors that can occur when compiling stylesheets.
#[derive(Debug, Error)]
pub enum StyleError {
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Malformed source, reported by the Sass compiler or the CSS finisher.
    #[error("Couldn't compile '{path}'.\n{message}")]
    Compile { path: Utf8PathBuf, message: String },

    #[error("Couldn't read '{0}'.\n{1}")]
    Read(Utf8PathBuf, std::io::Error),

    #[error("Couldn't write '{0}'.\n{1}")]
    Io(Utf8PathBuf, std::io::Error),
}

/// Errors that can occur when minifying scripts.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Couldn't read '{0}'.\n{1}")]
    Read(Utf8PathBuf, std::io::Error),

    /// The script is not valid JavaScript, nothing was minified.
    #[error("Couldn't parse '{path}'.\n{message}")]
    Parse { path: Utf8PathBuf, message: String },

    #[error("Couldn't write '{0}'.\n{1}")]
    Io(Utf8PathBuf, std::io::Error),
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Clean(#[from] CleanError),

    #[error(transparent)]
    Style(#[from] StyleError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("{0} compile error(s), nothing was written")]
    Aborted(usize),

    #[error("Task panicked: {0}")]
    Panic(String),
}

#[cfg(feature = "live")]
#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Notify(#[from] notify::Error),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Couldn't bind the live reload socket.\n{0}")]
    Bind(std::io::Error),
}
