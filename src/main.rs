use anyhow::Context;
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tigerbox::{init_logging, open_controller, Config, LONG_VERSION};
use tigerbox_settings::default_config_path;

/// Connect to a Tiger controller and dump its axis settings as JSON
#[derive(Parser, Debug)]
#[command(name = "tigerbox")]
#[command(version = tigerbox::LONG_VERSION)]
#[command(about = "Dump ASI Tiger axis settings")]
struct Cli {
    /// Configuration file (.toml or .json); defaults to the user config
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Serial port, overriding the configuration
    #[arg(long)]
    port: Option<String>,

    /// Use the simulated controller
    #[arg(long)]
    sim: bool,

    /// Write the dump here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    init_logging()?;
    let cli = Cli::parse();
    tracing::info!("tigerbox {}", LONG_VERSION);

    let path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let mut config = Config::load_or_default(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    if let Some(port) = cli.port {
        config.connection.port = port;
    }
    if cli.sim {
        config.simulation.enabled = true;
    }

    let mut controller = open_controller(&config)?;
    let axes: Vec<String> = controller
        .build_config()
        .axes()
        .iter()
        .map(|a| a.to_string())
        .collect();

    let mut settings = BTreeMap::new();
    for axis in &axes {
        let info = controller.get_info(axis)?;
        settings.insert(format!("{axis} Axis"), info);
    }

    let dump = serde_json::to_string_pretty(&settings)?;
    match cli.output {
        Some(output) => std::fs::write(&output, dump)
            .with_context(|| format!("writing {}", output.display()))?,
        None => println!("{dump}"),
    }
    Ok(())
}
