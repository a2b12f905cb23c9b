use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use mysensors_core::{codec, AckPolicy, Network};
use serial_transport::SerialLink;
use std::path::PathBuf;
use tracing::info;

mod config;
mod gateway;
mod http;
mod mqtt;

use config::{GatewayConfig, DEFAULT_STATE_FILE};

#[derive(Parser, Debug)]
#[command(
    name = "mysensors-gateway",
    version,
    about = "MySensors serial gateway with MQTT and Prometheus bridges",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the gateway against a serial port (or a replayed capture)
    Run(RunArgs),
    /// List serial ports
    Ports,
    /// Decode one serial frame and print it as JSON
    Decode {
        /// Frame such as `5;2;1;0;0;23.5`
        line: String,
    },
    /// Print the status of a saved state file
    Status {
        #[arg(long, default_value = DEFAULT_STATE_FILE)]
        state_file: PathBuf,
    },
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// YAML config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// HTTP listen address, e.g. `:9001`
    #[arg(long)]
    listen: Option<String>,
    /// Serial port device
    #[arg(long)]
    port: Option<String>,
    #[arg(long)]
    baud: Option<u32>,
    #[arg(long)]
    state_file: Option<PathBuf>,
    /// Read frames from a capture file instead of a serial port
    #[arg(long)]
    replay: Option<PathBuf>,
    #[arg(long)]
    mqtt_host: Option<String>,
    #[arg(long)]
    mqtt_port: Option<u16>,
    /// Disable the MQTT bridge
    #[arg(long, action = ArgAction::SetTrue)]
    no_mqtt: bool,
    #[arg(long, value_enum)]
    ack: Option<AckArg>,
    /// Seconds between status prints; 0 disables them
    #[arg(long)]
    status_interval: Option<u64>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum AckArg {
    Disabled,
    Echo,
}

impl From<AckArg> for AckPolicy {
    fn from(a: AckArg) -> Self {
        match a {
            AckArg::Disabled => AckPolicy::Disabled,
            AckArg::Echo => AckPolicy::Echo,
        }
    }
}

impl RunArgs {
    fn into_config(self) -> Result<GatewayConfig> {
        let mut cfg = match &self.config {
            Some(path) => GatewayConfig::load(path)?,
            None => GatewayConfig::default(),
        };
        if let Some(listen) = self.listen {
            cfg.http.listen = listen;
        }
        if let Some(port) = self.port {
            cfg.serial.port = port;
        }
        if let Some(baud) = self.baud {
            cfg.serial.baud = baud;
        }
        if let Some(state_file) = self.state_file {
            cfg.state_file = state_file;
        }
        if self.replay.is_some() {
            cfg.serial.replay = self.replay;
        }
        if let Some(host) = self.mqtt_host {
            cfg.mqtt.host = host;
        }
        if let Some(port) = self.mqtt_port {
            cfg.mqtt.port = port;
        }
        if self.no_mqtt {
            cfg.mqtt.enabled = false;
        }
        if let Some(ack) = self.ack {
            cfg.protocol.ack = ack.into();
        }
        if let Some(secs) = self.status_interval {
            cfg.status_interval_secs = secs;
        }
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => {
            let cfg = args.into_config()?;
            info!(
                port = %cfg.serial.port,
                listen = %cfg.http.listen,
                state_file = %cfg.state_file.display(),
                "mysensors-gateway starting"
            );
            gateway::run(cfg).await
        }
        Commands::Ports => {
            for port in SerialLink::list()? {
                println!("{}\t{}", port.name, port.driver);
            }
            Ok(())
        }
        Commands::Decode { line } => {
            let msg = codec::decode(&line).with_context(|| format!("decoding {line:?}"))?;
            let out = serde_json::json!({
                "node_id": msg.node_id,
                "sensor_id": msg.sensor_id,
                "command": msg.kind.as_str(),
                "ack": msg.ack,
                "type": msg.sub_type,
                "type_name": msg.sub_type_name(),
                "payload": msg.payload,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
        Commands::Status { state_file } => {
            let network = Network::default();
            network
                .load_snapshot(&state_file)
                .with_context(|| format!("loading {}", state_file.display()))?;
            print!("{}", network.status_string());
            Ok(())
        }
    }
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gw.yaml");
        std::fs::write(&path, "serial:\n  port: /dev/ttyACM0\n  baud: 38400\n").unwrap();
        let args = RunArgs {
            config: Some(path),
            baud: Some(9600),
            no_mqtt: true,
            ack: Some(AckArg::Echo),
            ..RunArgs::default()
        };
        let cfg = args.into_config().unwrap();
        assert_eq!(cfg.serial.port, "/dev/ttyACM0");
        assert_eq!(cfg.serial.baud, 9600);
        assert!(!cfg.mqtt.enabled);
        assert_eq!(cfg.protocol.ack, AckPolicy::Echo);
        assert_eq!(cfg.http.listen, ":9001");
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "mysensors-gateway",
            "run",
            "--port",
            "/dev/ttyUSB1",
            "--no-mqtt",
            "--ack",
            "echo",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.port.as_deref(), Some("/dev/ttyUSB1"));
                assert!(args.no_mqtt);
                assert_eq!(args.ack, Some(AckArg::Echo));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
