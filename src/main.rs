use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use simbridge::{App, Settings};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "simbridge")]
#[command(about = "Connect a simulation to a rosbridge server and keep the link alive")]
#[command(version)]
struct Args {
    /// Path to a TOML settings file
    #[arg(short, long, env = "SIMBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Bridge host (overrides bridge.host)
    #[arg(long)]
    host: Option<String>,

    /// Bridge port (overrides bridge.port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Link protocol, `tcp` or `ws` (overrides bridge.protocol)
    #[arg(long)]
    protocol: Option<String>,

    /// Run without connecting to the bridge
    #[arg(long)]
    offline: bool,

    /// Publish simulated time on /clock
    #[arg(long)]
    simulate_time: bool,

    /// Disable periodic health checks
    #[arg(long)]
    no_health_check: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if let Some(host) = &self.host {
            settings.bridge.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.bridge.port = port;
        }
        if let Some(protocol) = &self.protocol {
            settings.bridge.protocol = protocol.clone();
        }
        if self.offline {
            settings.bridge.connect_to_ros = false;
        }
        if self.simulate_time {
            settings.clock.simulate_time = true;
        }
        if self.no_health_check {
            settings.health.check_health = false;
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let mut settings = Settings::load(args.config.as_deref())?;
    args.apply(&mut settings);
    settings.validate()?;

    let app = App::start(&settings).await?;
    info!("Running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    app.shutdown().await;
    Ok(())
}
