//! Selector resolution.
//!
//! A selector is either a literal file or a shell-style glob, relative to the
//! project root. Every match remembers its *glob base*, the static directory
//! in front of the first wildcard, so that outputs can keep the directory
//! structure found below it.

use std::collections::HashSet;

use camino::{Utf8Path, Utf8PathBuf};
use glob::{MatchOptions, Pattern};

use crate::error::SourceError;

/// `*` stops at `/`, `**` spans directories.
pub(crate) const MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A matched input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Absolute path of the file.
    pub path: Utf8PathBuf,
    /// Absolute glob base the file was found under.
    pub base: Utf8PathBuf,
}

impl Source {
    /// Path of the file below its glob base, e.g. `card/card.base.scss`.
    pub fn relative(&self) -> &Utf8Path {
        match self.path.strip_prefix(&self.base) {
            Ok(rel) => rel,
            Err(_) => Utf8Path::new(self.path.file_name().unwrap_or_default()),
        }
    }
}

pub(crate) fn is_pattern(selector: &str) -> bool {
    selector.contains(['*', '?', '['])
}

fn normalize(selector: &str) -> &str {
    selector.trim_start_matches("./")
}

/// Splits a glob into its static root and the dynamic suffix starting at the
/// first component with a wildcard.
pub(crate) fn split_glob(glob: &str) -> (Utf8PathBuf, Utf8PathBuf) {
    let path = Utf8Path::new(normalize(glob));

    let components: Vec<_> = path.components().collect();
    let split_idx = components
        .iter()
        .position(|c| is_pattern(c.as_str()))
        .unwrap_or(components.len());

    let root: Utf8PathBuf = components.iter().take(split_idx).collect();
    let suffix: Utf8PathBuf = components.iter().skip(split_idx).collect();

    (root, suffix)
}

/// Resolves selectors against `root`.
///
/// The result keeps selector order, lexical order within one glob, and drops
/// files already matched by an earlier selector. Missing literal files and
/// globs without matches are not errors.
pub fn resolve(root: &Utf8Path, selectors: &[String]) -> Result<Vec<Source>, SourceError> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();

    for selector in selectors {
        let selector = normalize(selector);

        if !is_pattern(selector) {
            let path = root.join(selector);
            if !path.is_file() {
                tracing::debug!(%path, "optional input is missing, skipping");
                continue;
            }

            if seen.insert(path.clone()) {
                let base = path.parent().unwrap_or(root).to_path_buf();
                sources.push(Source { path, base });
            }
            continue;
        }

        let (fixed, suffix) = split_glob(selector);
        let base = match fixed.as_str() {
            "" => root.to_path_buf(),
            fixed => root.join(fixed),
        };

        let pattern = format!(
            "{}/{}",
            Pattern::escape(base.as_str().trim_end_matches('/')),
            suffix
        );

        let mut matched = Vec::new();
        for path in glob::glob_with(&pattern, MATCH)
            .map_err(|e| SourceError::Pattern(selector.to_string(), e))?
        {
            let path = Utf8PathBuf::try_from(path?)?;
            if path.is_file() {
                matched.push(path);
            }
        }
        matched.sort();

        if matched.is_empty() {
            tracing::debug!(selector, "glob matched nothing");
        }

        for path in matched {
            if seen.insert(path.clone()) {
                sources.push(Source {
                    path,
                    base: base.clone(),
                });
            }
        }
    }

    Ok(sources)
}

/// Compiles selectors into patterns matching root-relative paths.
pub(crate) fn patterns(selectors: &[String]) -> Result<Vec<Pattern>, SourceError> {
    selectors
        .iter()
        .map(|s| {
            let s = normalize(s);
            Pattern::new(s).map_err(|e| SourceError::Pattern(s.to_string(), e))
        })
        .collect()
}

/// Reduces a set of paths to the minimal set of recursive watch roots.
///
/// If we watch `/a` and `/a/b`, we only need to watch `/a`. Paths are sorted
/// and any path below an already accepted one is dropped.
pub(crate) fn collapse_paths(paths: HashSet<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
    let mut paths: Vec<_> = paths.into_iter().collect();
    paths.sort();

    let mut filtered: Vec<Utf8PathBuf> = Vec::new();
    for path in paths {
        if let Some(last) = filtered.last()
            && path.starts_with(last)
        {
            continue;
        }
        filtered.push(path);
    }

    filtered
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn root() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        (dir, root)
    }

    fn touch(root: &Utf8Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn s(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_split_glob() {
        let (fixed, suffix) = split_glob("./templates/components/**/*.base.scss");
        assert_eq!(fixed, "templates/components");
        assert_eq!(suffix, "**/*.base.scss");

        let (fixed, suffix) = split_glob("sass/base/style.scss");
        assert_eq!(fixed, "sass/base/style.scss");
        assert_eq!(suffix, "");

        let (fixed, suffix) = split_glob("*.js");
        assert_eq!(fixed, "");
        assert_eq!(suffix, "*.js");
    }

    #[test]
    fn test_resolve_order_and_bases() {
        let (_dir, root) = root();
        touch(&root, "sass/layout/b.scss");
        touch(&root, "sass/layout/a.scss");
        touch(&root, "sass/layout/grid/grid.layout.scss");
        touch(&root, "vendor/slick.css");

        let sources = resolve(
            &root,
            &s(&[
                "./sass/layout/*.scss",
                "sass/layout/**/*.layout.scss",
                "vendor/slick.css",
            ]),
        )
        .unwrap();

        let relative: Vec<_> = sources.iter().map(|s| s.relative().as_str()).collect();
        assert_eq!(
            relative,
            vec!["a.scss", "b.scss", "grid/grid.layout.scss", "slick.css"]
        );
        assert_eq!(sources[2].base, root.join("sass/layout"));
    }

    #[test]
    fn test_single_star_does_not_cross_directories() {
        let (_dir, root) = root();
        touch(&root, "sass/theme/top.scss");
        touch(&root, "sass/theme/nested/deep.scss");

        let sources = resolve(&root, &s(&["sass/theme/*.scss"])).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].path, root.join("sass/theme/top.scss"));
    }

    #[test]
    fn test_missing_inputs_are_tolerated() {
        let (_dir, root) = root();

        let sources = resolve(
            &root,
            &s(&["node_modules/bootstrap/dist/css/bootstrap.css", "nothing/**/*.scss"]),
        )
        .unwrap();
        assert!(sources.is_empty());
    }

    #[test]
    fn test_duplicates_keep_first_match() {
        let (_dir, root) = root();
        touch(&root, "global_js/main.js");

        let sources = resolve(&root, &s(&["global_js/main.js", "global_js/*.js"])).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].base, root.join("global_js"));
    }

    #[test]
    fn test_collapse_paths() {
        let mut paths = HashSet::new();
        paths.insert(Utf8PathBuf::from("/a"));
        paths.insert(Utf8PathBuf::from("/a/b"));
        paths.insert(Utf8PathBuf::from("/a/b/c"));
        paths.insert(Utf8PathBuf::from("/b"));
        paths.insert(Utf8PathBuf::from("/c/d"));

        assert_eq!(
            collapse_paths(paths),
            vec![
                Utf8PathBuf::from("/a"),
                Utf8PathBuf::from("/b"),
                Utf8PathBuf::from("/c/d")
            ]
        );
    }

    #[test]
    fn test_collapse_paths_similar_names() {
        let mut paths = HashSet::new();
        paths.insert(Utf8PathBuf::from("/foo"));
        paths.insert(Utf8PathBuf::from("/foo-bar"));

        assert_eq!(
            collapse_paths(paths),
            vec![Utf8PathBuf::from("/foo"), Utf8PathBuf::from("/foo-bar")]
        );
    }
}
