//! The path registry: which source globs feed which output directory.
//!
//! The built-in defaults describe the theme layout this tool was made for. A
//! project can replace any entry by dropping an `assetline.toml` next to its
//! sources:
//!
//! ```toml
//! [styles.layout]
//! sources = ["sass/layout/*.scss"]
//! watch = ["sass/layout/*.scss"]
//! dest = "css/layout"
//!
//! [scripts.theme]
//! sources = ["global_js/*.js"]
//! dest = "js"
//! ```

use std::fmt::Display;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::error::ConfigError;

/// Name of the optional registry override, looked up in the project root.
pub const CONFIG_FILE: &str = "assetline.toml";

/// One of the three independently built style partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    Base,
    Layout,
    Theme,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Base, Layer::Layout, Layer::Theme];

    pub fn name(self) -> &'static str {
        match self {
            Layer::Base => "base",
            Layer::Layout => "layout",
            Layer::Theme => "theme",
        }
    }
}

impl Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Sources and destination of a style layer.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StyleEntry {
    /// Selectors compiled by the layer, in order.
    pub sources: Vec<String>,
    /// Selectors observed in watch mode. Vendor files are left out on purpose
    /// in the defaults, they only change on `npm install`.
    #[serde(default)]
    pub watch: Vec<String>,
    /// Output directory, relative to the project root.
    pub dest: Utf8PathBuf,
}

/// Sources and destination of a script bundle.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScriptEntry {
    pub sources: Vec<String>,
    pub dest: Utf8PathBuf,
}

/// Immutable mapping from logical asset names to sources and outputs.
#[derive(Debug, Clone)]
pub struct Registry {
    /// Project root every selector and destination is relative to.
    pub root: Utf8PathBuf,
    pub base: StyleEntry,
    pub layout: StyleEntry,
    pub theme: StyleEntry,
    /// Third-party scripts, copied without renaming.
    pub vendor_js: ScriptEntry,
    /// First-party scripts, renamed with the `.min` suffix.
    pub theme_js: ScriptEntry,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RegistryFile {
    styles: StylesFile,
    scripts: ScriptsFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct StylesFile {
    base: Option<StyleEntry>,
    layout: Option<StyleEntry>,
    theme: Option<StyleEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ScriptsFile {
    vendor: Option<ScriptEntry>,
    theme: Option<ScriptEntry>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

impl Registry {
    /// The built-in theme layout, rooted at `root`.
    pub fn defaults(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            base: StyleEntry {
                sources: strings(&[
                    "node_modules/bootstrap/dist/css/bootstrap.css",
                    "sass/base/style.scss",
                    "templates/components/**/*.base.scss",
                ]),
                watch: strings(&[
                    "sass/base/style.scss",
                    "templates/components/**/*.base.scss",
                ]),
                dest: "css/base".into(),
            },
            layout: StyleEntry {
                sources: strings(&[
                    "sass/layout/*.scss",
                    "sass/layout/**/*.layout.scss",
                    "node_modules/slick-carousel/slick/slick.css",
                ]),
                watch: strings(&["sass/layout/*.scss", "sass/layout/**/*.layout.scss"]),
                dest: "css/layout".into(),
            },
            theme: StyleEntry {
                sources: strings(&[
                    "sass/theme/*.scss",
                    "sass/theme/**/*.theme.scss",
                    "node_modules/slick-carousel/slick/slick-theme.css",
                    "node_modules/odometer/themes/odometer-theme-car.css",
                ]),
                watch: strings(&["sass/theme/*.scss", "sass/theme/**/*.theme.scss"]),
                dest: "css/theme".into(),
            },
            vendor_js: ScriptEntry {
                sources: strings(&[
                    "node_modules/bootstrap/dist/js/bootstrap.min.js",
                    "node_modules/jquery/dist/jquery.min.js",
                    "node_modules/jquery-validation/dist/jquery.validate.min.js",
                    "node_modules/odometer/odometer.min.js",
                    "node_modules/popper.js/dist/umd/popper.min.js",
                    "node_modules/slick-carousel/slick/slick.min.js",
                ]),
                dest: "js".into(),
            },
            theme_js: ScriptEntry {
                sources: strings(&[
                    "global_js/main.js",
                    "global_js/blazy-addon.js",
                    "global_js/forms.js",
                    "templates/components/**/*.js",
                ]),
                dest: "js".into(),
            },
        }
    }

    /// Loads the registry for `root`, applying `assetline.toml` when present.
    pub fn load(root: impl Into<Utf8PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        let path = root.join(CONFIG_FILE);

        if !path.is_file() {
            tracing::debug!(%path, "no config file, using the built-in registry");
            return Ok(Self::defaults(root));
        }

        let text = fs::read_to_string(&path).map_err(|e| ConfigError::Read(path.clone(), e))?;
        let registry = Self::from_toml(root, &text).map_err(|e| ConfigError::Parse(path.clone(), e))?;
        tracing::info!(%path, "loaded registry");

        Ok(registry)
    }

    /// Parses a registry override; sections left out keep their defaults.
    pub fn from_toml(root: impl Into<Utf8PathBuf>, text: &str) -> Result<Self, toml::de::Error> {
        let file: RegistryFile = toml::from_str(text)?;
        let defaults = Self::defaults(root);

        Ok(Self {
            root: defaults.root,
            base: file.styles.base.unwrap_or(defaults.base),
            layout: file.styles.layout.unwrap_or(defaults.layout),
            theme: file.styles.theme.unwrap_or(defaults.theme),
            vendor_js: file.scripts.vendor.unwrap_or(defaults.vendor_js),
            theme_js: file.scripts.theme.unwrap_or(defaults.theme_js),
        })
    }

    pub fn layer(&self, layer: Layer) -> &StyleEntry {
        match layer {
            Layer::Base => &self.base,
            Layer::Layout => &self.layout,
            Layer::Theme => &self.theme,
        }
    }

    /// Resolves a registry-relative path against the project root.
    pub fn path(&self, relative: impl AsRef<Utf8Path>) -> Utf8PathBuf {
        self.root.join(relative)
    }

    /// Every generated style directory, absolute.
    pub fn style_dirs(&self) -> Vec<Utf8PathBuf> {
        Layer::ALL
            .iter()
            .map(|&layer| self.path(&self.layer(layer).dest))
            .collect()
    }

    /// Every generated script directory, absolute and de-duplicated.
    pub fn script_dirs(&self) -> Vec<Utf8PathBuf> {
        let mut dirs = vec![self.path(&self.vendor_js.dest)];
        let theme = self.path(&self.theme_js.dest);
        if !dirs.contains(&theme) {
            dirs.push(theme);
        }
        dirs
    }
}
