//! Glob imports for Sass.
//!
//! `@import "components/**/*.scss";` is not valid Sass. Before the compiler
//! sees a file, every import (or `@use`/`@forward`) whose target contains a
//! wildcard is replaced by one directive per matching file, in lexical order,
//! relative to the importing file. The rewrite happens inside [`GlobFs`], the
//! filesystem handed to `grass`, so partials pulled in by other partials are
//! expanded too.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;

use camino::Utf8Path;
use regex::{Captures, Regex};

use crate::error::SourceError;
use crate::source::{self, is_pattern};

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^([ \t]*)@(import|use|forward)[ \t]+([^;\n]+);"#)
        .expect("Error compiling import directive regex")
});

static QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(["'])([^"'\n]*)["']"#).expect("Error compiling quoted string regex")
});

/// One quoted target of a directive, with whatever follows it (`as x`,
/// `with (...)`) for `@use` and `@forward`.
struct Target<'t> {
    quote: &'t str,
    path: &'t str,
    rest: &'t str,
}

/// Splits the arguments of a directive into targets. `@import` takes a
/// comma-separated list of strings, the other rules a single string with
/// modifiers. Anything else, such as `@import url(...)`, yields `None`.
fn targets<'t>(rule: &str, args: &'t str) -> Option<Vec<Target<'t>>> {
    if rule != "import" {
        let caps = QUOTED.captures(args)?;
        let all = caps.get(0)?;
        if !args[..all.start()].trim().is_empty() {
            return None;
        }

        return Some(vec![Target {
            quote: caps.get(1)?.as_str(),
            path: caps.get(2)?.as_str(),
            rest: args[all.end()..].trim_end(),
        }]);
    }

    let mut targets = Vec::new();
    let mut end = 0;

    for caps in QUOTED.captures_iter(args) {
        let all = caps.get(0)?;
        let separator = match targets.is_empty() {
            true => "",
            false => ",",
        };
        if args[end..all.start()].trim() != separator {
            return None;
        }

        targets.push(Target {
            quote: caps.get(1)?.as_str(),
            path: caps.get(2)?.as_str(),
            rest: "",
        });
        end = all.end();
    }

    match !targets.is_empty() && args[end..].trim().is_empty() {
        true => Some(targets),
        false => None,
    }
}

/// Expands glob imports in `text`, the contents of `file`.
///
/// Every target of a directive is emitted as its own directive, patterns
/// replaced by their matches. A pattern without matches expands to nothing.
/// The importing file never matches itself.
pub(crate) fn expand(file: &Utf8Path, text: &str) -> Result<String, SourceError> {
    let dir = file.parent().unwrap_or(Utf8Path::new(""));
    let mut error = None;

    let expanded = DIRECTIVE.replace_all(text, |caps: &Captures| {
        let (indent, rule) = (&caps[1], &caps[2]);

        let Some(targets) = targets(rule, &caps[3]) else {
            return caps[0].to_string();
        };
        if !targets.iter().any(|t| is_pattern(t.path)) {
            return caps[0].to_string();
        }

        let mut lines = Vec::new();
        for Target { quote, path, rest } in targets {
            if !is_pattern(path) {
                lines.push(format!("{indent}@{rule} {quote}{path}{quote}{rest};"));
                continue;
            }

            let matches = match source::resolve(dir, &[path.to_string()]) {
                Ok(matches) => matches,
                Err(e) => {
                    error.get_or_insert(e);
                    continue;
                }
            };

            for m in matches.iter().filter(|m| m.path != file) {
                let relative = m.path.strip_prefix(dir).unwrap_or(&m.path);
                let relative = relative
                    .components()
                    .map(|c| c.as_str())
                    .collect::<Vec<_>>()
                    .join("/");

                lines.push(format!("{indent}@{rule} {quote}{relative}{quote}{rest};"));
            }
        }

        lines.join("\n")
    });

    match error {
        Some(e) => Err(e),
        None => Ok(expanded.into_owned()),
    }
}

/// Filesystem for `grass` that expands glob imports on read.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct GlobFs;

impl grass::Fs for GlobFs {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let data = fs::read(path)?;

        let Some(file) = Utf8Path::from_path(path) else {
            return Ok(data);
        };

        if file.extension() != Some("scss") {
            return Ok(data);
        }

        let text = String::from_utf8(data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        expand(file, &text)
            .map(String::into_bytes)
            .map_err(io::Error::other)
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    fn root() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        (dir, root)
    }

    fn write(root: &Utf8Path, rel: &str, text: &str) -> Utf8PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_expand_lexical_order() {
        let (_dir, root) = root();
        write(&root, "components/button/_button.scss", "");
        write(&root, "components/alert/_alert.scss", "");
        write(&root, "components/card/_card.scss", "");
        let main = write(&root, "main.scss", "");

        let text = "@import \"components/**/*.scss\";\n.main { color: red; }\n";
        let expanded = expand(&main, text).unwrap();

        assert_eq!(
            expanded,
            "@import \"components/alert/_alert.scss\";\n\
             @import \"components/button/_button.scss\";\n\
             @import \"components/card/_card.scss\";\n\
             .main { color: red; }\n"
        );
    }

    #[test]
    fn test_expand_skips_self_and_plain_imports() {
        let (_dir, root) = root();
        write(&root, "_vars.scss", "");
        write(&root, "_mixins.scss", "");
        let main = write(&root, "main.scss", "");

        let text = "@use 'sass:math';\n@import \"*.scss\";\n";
        let expanded = expand(&main, text).unwrap();

        assert_eq!(
            expanded,
            "@use 'sass:math';\n@import \"_mixins.scss\";\n@import \"_vars.scss\";\n"
        );
    }

    #[test]
    fn test_expand_import_list() {
        let (_dir, root) = root();
        write(&root, "a/_one.scss", "");
        write(&root, "a/_two.scss", "");
        write(&root, "b/_three.scss", "");
        let main = write(&root, "main.scss", "");

        let text = "@import \"a/*.scss\", 'plain', \"b/*.scss\";\n";
        let expanded = expand(&main, text).unwrap();

        assert_eq!(
            expanded,
            "@import \"a/_one.scss\";\n\
             @import \"a/_two.scss\";\n\
             @import 'plain';\n\
             @import \"b/_three.scss\";\n"
        );
    }

    #[test]
    fn test_expand_keeps_use_modifiers() {
        let (_dir, root) = root();
        write(&root, "theme/_colors.scss", "");
        let main = write(&root, "main.scss", "");

        let expanded = expand(&main, "@use \"theme/*.scss\" as *;\n").unwrap();
        assert_eq!(expanded, "@use \"theme/_colors.scss\" as *;\n");

        let untouched = "@import url(\"x/*.css\");\n";
        assert_eq!(expand(&main, untouched).unwrap(), untouched);
    }

    #[test]
    fn test_expand_no_matches() {
        let (_dir, root) = root();
        let main = write(&root, "main.scss", "");

        let expanded = expand(&main, "  @import \"missing/**/*.scss\";\nb { c: d }").unwrap();
        assert_eq!(expanded, "\nb { c: d }");
    }

    #[test]
    fn test_fs_expands_nested_partials() {
        let (_dir, root) = root();
        write(&root, "parts/_a.scss", ".a { x: 1; }");
        let partial = write(&root, "_index.scss", "@import \"parts/*.scss\";\n");

        let data = grass::Fs::read(&GlobFs, partial.as_std_path()).unwrap();
        assert_eq!(String::from_utf8(data).unwrap(), "@import \"parts/_a.scss\";\n");
    }
}
