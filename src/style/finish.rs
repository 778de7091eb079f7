use std::borrow::Cow;
use std::sync::{Arc, LazyLock, RwLock};

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use regex::Regex;

/// `*zoom: 1` and `_height: 1px`: properties only Explorer 7 and older read.
static LEGACY_HACK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([{;][ \t\r\n]*)[*_][A-Za-z-]+[ \t]*:[^;{}]*")
        .expect("Error compiling legacy hack regex")
});

const fn version(major: u32, minor: u32) -> u32 {
    (major << 16) | (minor << 8)
}

/// Oldest browser of every family the generated CSS must work in.
///
/// Chrome >= 35, Firefox >= 38, Edge >= 12, Explorer >= 10, iOS >= 8,
/// Safari >= 8, Android >= 2.3, Opera >= 12.
pub fn browsers() -> Browsers {
    Browsers {
        android: Some(version(2, 3)),
        chrome: Some(version(35, 0)),
        edge: Some(version(12, 0)),
        firefox: Some(version(38, 0)),
        ie: Some(version(10, 0)),
        ios_saf: Some(version(8, 0)),
        opera: Some(version(12, 0)),
        safari: Some(version(8, 0)),
        ..Browsers::default()
    }
}

fn targets() -> Targets {
    Targets::from(browsers())
}

/// A prefixed and minified stylesheet with its source map.
#[derive(Debug)]
pub(crate) struct Finished {
    pub css: String,
    pub map: String,
}

/// Drops star and underscore property hacks, which no supported browser
/// reads and which would otherwise take their whole rule down with them.
fn strip_legacy_hacks(css: &str) -> Cow<'_, str> {
    LEGACY_HACK.replace_all(css, "$1")
}

/// Vendor-prefixes and minifies compiled CSS.
///
/// `source` names the input in the source map, `map_name` is the file name
/// the map will be written to, referenced from the trailing
/// `sourceMappingURL` comment. The map points into `css` itself, which is
/// embedded as the source content.
///
/// Declarations the parser cannot read are dropped and logged as warnings,
/// so a quirk in third-party CSS does not fail the layer.
pub(crate) fn finish(css: &str, source: &str, map_name: &str) -> Result<Finished, String> {
    let input = strip_legacy_hacks(css);
    if let Cow::Owned(_) = input {
        tracing::debug!(file = source, "dropped legacy property hacks");
    }

    let warnings = Arc::new(RwLock::new(Vec::new()));
    let mut sheet = StyleSheet::parse(
        &input,
        ParserOptions {
            filename: source.to_string(),
            error_recovery: true,
            warnings: Some(warnings.clone()),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| e.to_string())?;

    if let Ok(warnings) = warnings.read() {
        for warning in warnings.iter() {
            tracing::warn!(file = source, "{warning}");
        }
    }

    sheet
        .minify(MinifyOptions {
            targets: targets(),
            ..MinifyOptions::default()
        })
        .map_err(|e| e.to_string())?;

    let mut map = SourceMap::new("/");
    map.add_source(source);
    map.set_source_content(0, &input)
        .map_err(|e| format!("{e:?}"))?;

    let result = sheet
        .to_css(PrinterOptions {
            minify: true,
            source_map: Some(&mut map),
            targets: targets(),
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;

    let map = map.to_json(None).map_err(|e| format!("{e:?}"))?;
    let css = format!("{}\n/*# sourceMappingURL={map_name} */\n", result.code);

    Ok(Finished { css, map })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_for_old_browsers() {
        let finished = finish(
            ".box {\n  display: flex;\n  user-select: none;\n}\n",
            "box.css",
            "box.min.css.map",
        )
        .unwrap();

        assert!(finished.css.contains("-webkit-"));
        assert!(finished.css.contains("-ms-"));
        assert!(finished.css.ends_with("/*# sourceMappingURL=box.min.css.map */\n"));
        assert!(finished.map.contains("box.css"));
    }

    #[test]
    fn test_legacy_hacks_are_dropped_not_fatal() {
        let finished = finish(
            ".odometer { display: inline-block; *display: inline; *zoom: 1; _height: 1px; }\n\
             * { margin: 0 }\n",
            "odometer.css",
            "odometer.min.css.map",
        )
        .unwrap();

        let css = finished.css.lines().next().unwrap();
        assert!(css.contains(".odometer{display:inline-block}"), "{css}");
        assert!(css.contains("*{margin:0}"), "{css}");
        assert!(!css.contains("zoom"));
    }

    #[test]
    fn test_unreadable_declaration_is_skipped() {
        let finished = finish("a { color: red; } b { ] } c { top: 0 }", "x.css", "x.min.css.map");
        let css = finished.unwrap().css;
        assert!(css.contains("a{color:red}"), "{css}");
    }

    #[test]
    fn test_map_sources_match_content() {
        let css = ".card {\n  color: red;\n}\n";
        let finished = finish(css, "card.css", "card.min.css.map").unwrap();

        let map: serde_json::Value = serde_json::from_str(&finished.map).unwrap();
        assert_eq!(map["sources"], serde_json::json!(["card.css"]));
        assert_eq!(map["sourcesContent"], serde_json::json!([css]));
    }

    #[test]
    fn test_minifies() {
        let finished = finish(
            "a {\n  color: #ff0000;\n}\n\n\nb {\n  margin: 0px;\n}\n",
            "a.css",
            "a.min.css.map",
        )
        .unwrap();

        let mut lines = finished.css.lines();
        assert_eq!(lines.next(), Some("a{color:red}b{margin:0}"));
        assert_eq!(lines.next(), Some("/*# sourceMappingURL=a.min.css.map */"));
        assert_eq!(lines.next(), None);
    }
}
