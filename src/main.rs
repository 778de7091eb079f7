use std::process::ExitCode;
use std::sync::Arc;

use assetline::{Registry, Silent, Target, Targets};
use camino::Utf8PathBuf;
use clap::Parser;
use console::style;

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
struct Args {
    /// Target to run.
    #[clap(value_enum, index = 1, default_value = "default")]
    target: Target,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    #[cfg(feature = "logging")]
    assetline::logging::init_logging()?;

    let root = Utf8PathBuf::try_from(std::env::current_dir()?)?;
    let registry = match Registry::load(root) {
        Ok(registry) => registry,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("{}", style(e).red());
            return Ok(ExitCode::from(2));
        }
    };

    if args.target == Target::Watch {
        return watch(registry);
    }

    let targets = Targets::new(registry, Arc::new(Silent));
    let Some(flow) = targets.flow(args.target) else {
        return Ok(ExitCode::SUCCESS);
    };

    let report = flow.plan().run();

    for step in report.failures() {
        if let Some(e) = &step.error {
            eprintln!("{} {}\n{}", style("failed").red().bold(), step.name, e);
        }
    }

    match report.is_success() {
        true => Ok(ExitCode::SUCCESS),
        false => Ok(ExitCode::FAILURE),
    }
}

#[cfg(feature = "live")]
fn watch(registry: Registry) -> anyhow::Result<ExitCode> {
    assetline::live::watch(registry)?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(not(feature = "live"))]
fn watch(_: Registry) -> anyhow::Result<ExitCode> {
    anyhow::bail!("watch mode requires the `live` feature")
}
