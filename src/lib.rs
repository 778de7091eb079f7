#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod config;
pub mod engine;
mod error;
mod io;
pub mod live;
#[cfg(feature = "logging")]
pub mod logging;
mod script;
mod source;
mod style;
mod targets;
mod task;

pub use crate::config::{CONFIG_FILE, Layer, Registry, ScriptEntry, StyleEntry};
pub use crate::engine::{Flow, Plan, Report, StepReport};
pub use crate::error::*;
pub use crate::live::{Notifier, Signal, Silent};
pub use crate::script::ScriptTask;
pub use crate::source::{Source, resolve};
pub use crate::style::{StyleTask, browsers};
pub use crate::targets::{Target, Targets};
pub use crate::task::{Clean, Task};
