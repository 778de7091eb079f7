//! The unit of work scheduled by the [engine](crate::engine).

use std::time::Instant;

use camino::Utf8PathBuf;

use crate::Registry;
use crate::error::TaskError;

/// A named, idempotent, side-effecting operation.
///
/// Tasks keep no state between invocations; the only result is success or
/// failure. Anything a task writes is its own business.
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self) -> Result<(), TaskError>;
}

/// Deletes previously generated output directories.
#[derive(Debug, Clone)]
pub struct Clean {
    name: &'static str,
    dirs: Vec<Utf8PathBuf>,
}

impl Clean {
    pub fn new(name: &'static str, dirs: Vec<Utf8PathBuf>) -> Self {
        Self { name, dirs }
    }

    /// Removes the three style layer directories.
    pub fn styles(registry: &Registry) -> Self {
        Self::new("clean-styles", registry.style_dirs())
    }

    /// Removes the script directory.
    pub fn scripts(registry: &Registry) -> Self {
        Self::new("clean-scripts", registry.script_dirs())
    }
}

impl Task for Clean {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self) -> Result<(), TaskError> {
        let s = Instant::now();
        crate::io::remove_dirs(&self.dirs)?;
        tracing::info!("Cleaned {} {}", self.name, crate::io::as_overhead(s));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_families() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        let registry = Registry::defaults(root.clone());

        crate::io::write_file(&root.join("css/theme/theme.min.css"), "x").unwrap();
        crate::io::write_file(&root.join("js/main.min.js"), "x").unwrap();

        Clean::styles(&registry).run().unwrap();
        assert!(!root.join("css/theme").exists());
        assert!(root.join("js/main.min.js").exists());

        Clean::scripts(&registry).run().unwrap();
        assert!(!root.join("js").exists());

        // second run finds nothing to delete
        Clean::styles(&registry).run().unwrap();
        Clean::scripts(&registry).run().unwrap();
    }
}
