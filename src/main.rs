use anyhow::Context;
use pnpkit::{init_logging, Config, DriverTrait, Location, Mover, OpenBuildsDriver, ToolIndex};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    tracing::info!("pnpkit {} (built {})", pnpkit::VERSION, pnpkit::BUILD_DATE);

    let mut config_path = None;
    let mut home = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--home" => home = true,
            "-h" | "--help" => {
                println!("usage: pnpkit [config-path] [--home]");
                return Ok(());
            }
            _ => config_path = Some(PathBuf::from(arg)),
        }
    }

    let config_path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    config.validate()?;

    match pnpkit::list_ports() {
        Ok(ports) => {
            for port in ports {
                tracing::info!("Found {} ({})", port.port_name, port.description);
            }
        }
        Err(e) => tracing::warn!("Could not list serial ports: {}", e),
    }

    let driver = OpenBuildsDriver::from_config(&config);
    driver
        .connect()
        .await
        .with_context(|| format!("connecting to {}", config.connection.port))?;

    let outcome = async {
        if home {
            driver.home().await?;
        }
        for tool in [ToolIndex::First, ToolIndex::Second] {
            let mover = Mover::tool(tool.to_string(), tool, Location::default());
            tracing::info!("{} at {}", mover.name, driver.location(&mover));
        }
        Ok::<(), pnpkit::Error>(())
    }
    .await;

    driver.disconnect().await?;
    outcome?;
    Ok(())
}
