use std::fmt::Display;
use std::fs;
use std::io::ErrorKind;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use console::Style;

use crate::error::CleanError;

const ANSI_BLUE: Style = Style::new().blue();

pub fn as_overhead(s: Instant) -> impl Display {
    let e = Instant::now();
    let f = format!("(+{}ms)", e.duration_since(s).as_millis());
    ANSI_BLUE.apply_to(f)
}

/// Recursively delete every directory in `dirs`.
///
/// Directories that do not exist are skipped. The directories are not
/// recreated, writers create them on demand.
pub fn remove_dirs(dirs: &[Utf8PathBuf]) -> Result<(), CleanError> {
    for dir in dirs {
        match fs::remove_dir_all(dir) {
            Ok(()) => tracing::debug!(%dir, "removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(CleanError {
                    path: dir.clone(),
                    source,
                });
            }
        }
    }

    Ok(())
}

/// Write `data` to `path`, creating missing parent directories.
pub fn write_file(path: &Utf8Path, data: impl AsRef<[u8]>) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    fs::write(path, data)
}

/// Inserts the `.min` marker before the extension: `main.js` -> `main.min.js`.
pub fn with_min_suffix(path: &Utf8Path, extension: &str) -> Utf8PathBuf {
    let stem = path.file_stem().unwrap_or_default();
    path.with_file_name(format!("{stem}.min.{extension}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_suffix() {
        assert_eq!(with_min_suffix(Utf8Path::new("main.js"), "js"), "main.min.js");
        assert_eq!(
            with_min_suffix(Utf8Path::new("card/card.base.scss"), "css"),
            "card/card.base.min.css"
        );
    }

    #[test]
    fn test_remove_dirs_exact() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        write_file(&root.join("css/base/a.min.css"), "a").unwrap();
        write_file(&root.join("css/layout/nested/b.min.css"), "b").unwrap();
        write_file(&root.join("css/keep.css"), "keep").unwrap();
        write_file(&root.join("js/main.min.js"), "js").unwrap();

        remove_dirs(&[
            root.join("css/base"),
            root.join("css/layout"),
            root.join("css/theme"),
        ])
        .unwrap();

        assert!(!root.join("css/base").exists());
        assert!(!root.join("css/layout").exists());
        assert!(root.join("css/keep.css").is_file());
        assert!(root.join("js/main.min.js").is_file());
    }

    #[test]
    fn test_remove_missing_dir_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        remove_dirs(&[root.join("never/created")]).unwrap();
        assert!(root.exists());
    }
}
