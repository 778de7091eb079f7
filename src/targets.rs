//! Named build targets, the commands exposed by the binary.

use std::sync::Arc;

use clap::ValueEnum;

use crate::config::{Layer, Registry};
use crate::engine::Flow;
use crate::live::Notifier;
use crate::script::ScriptTask;
use crate::style::StyleTask;
use crate::task::Clean;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    CleanStyles,
    CleanScripts,
    BuildBaseStyles,
    BuildLayoutStyles,
    BuildThemeStyles,
    BuildVendorScripts,
    BuildThemeScripts,
    /// Recompile style layers on change and live reload the browser.
    #[value(alias = "sass-watch")]
    Watch,
    /// Clean, then build every layer and script bundle.
    #[value(alias = "sass")]
    Build,
    /// Same as `build`.
    Default,
}

/// Builds the task compositions of every target from one registry.
pub struct Targets {
    registry: Registry,
    notifier: Arc<dyn Notifier>,
}

impl Targets {
    pub fn new(registry: Registry, notifier: Arc<dyn Notifier>) -> Self {
        Self { registry, notifier }
    }

    fn style(&self, layer: Layer) -> Flow {
        Flow::task(StyleTask::new(&self.registry, layer, self.notifier.clone()))
    }

    /// `Sequence(Parallel(cleaners), Parallel(all compilers))`.
    pub fn full_build(&self) -> Flow {
        Flow::sequence([
            Flow::parallel([
                Flow::task(Clean::styles(&self.registry)),
                Flow::task(Clean::scripts(&self.registry)),
            ]),
            Flow::parallel([
                self.style(Layer::Base),
                self.style(Layer::Layout),
                self.style(Layer::Theme),
                Flow::task(ScriptTask::vendor(&self.registry, self.notifier.clone())),
                Flow::task(ScriptTask::theme(&self.registry, self.notifier.clone())),
            ]),
        ])
    }

    /// The composition behind `target`, `None` for the long-running watch
    /// mode which is not a finite flow.
    pub fn flow(&self, target: Target) -> Option<Flow> {
        let flow = match target {
            Target::CleanStyles => Flow::task(Clean::styles(&self.registry)),
            Target::CleanScripts => Flow::task(Clean::scripts(&self.registry)),
            Target::BuildBaseStyles => self.style(Layer::Base),
            Target::BuildLayoutStyles => self.style(Layer::Layout),
            Target::BuildThemeStyles => self.style(Layer::Theme),
            Target::BuildVendorScripts => {
                Flow::task(ScriptTask::vendor(&self.registry, self.notifier.clone()))
            }
            Target::BuildThemeScripts => {
                Flow::task(ScriptTask::theme(&self.registry, self.notifier.clone()))
            }
            Target::Build | Target::Default => self.full_build(),
            Target::Watch => return None,
        };

        Some(flow)
    }
}
