//! Name Registry Command Line Interface
//!
//! Drives the registry core against a local sled store.

mod commands;
mod settings;

use anyhow::Result;
use clap::Parser;
use commands::Commands;
use settings::{AppConfig, LogFormat};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, Subscriber};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "namereg")]
#[command(about = "Name registry command line interface", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory holding the registry database
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Log filter (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format: pretty or json
    #[arg(long, value_parser = LogFormat::from_str)]
    log_format: Option<LogFormat>,

    /// Registry instance id (64 hex characters)
    #[arg(long, value_parser = parse_registry_id)]
    registry_id: Option<[u8; 32]>,

    #[command(subcommand)]
    command: Commands,
}

fn parse_registry_id(value: &str) -> Result<[u8; 32]> {
    settings::parse_hex32(value)
}

fn apply_overrides(cli: &Cli, config: &mut AppConfig) {
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if let Some(id) = cli.registry_id {
        config.registry_id = id;
    }
}

fn fmt_layer<S, W>(format: LogFormat, writer: W) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_writer(writer).boxed(),
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer(config.log_format, std::io::stderr))
        .try_init()?;

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref(), cli.data_dir.as_deref())?;
    apply_overrides(&cli, &mut config);
    config.validate()?;
    init_logging(&config)?;

    debug!(
        "Loaded configuration from {}",
        config
            .config_path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "defaults and environment".to_string())
    );

    let stdout = std::io::stdout();
    commands::run(cli.command, &config, &mut stdout.lock())
}

#[cfg(test)]
mod tests {
    use super::*;
    use namereg_registry::Identity;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn flags_override_loaded_config() {
        let registry_id = "01".repeat(32);
        let cli = Cli::try_parse_from([
            "namereg",
            "--data-dir",
            "/tmp/registry",
            "--log-format",
            "json",
            "--registry-id",
            registry_id.as_str(),
            "get",
            "mysite1",
        ])
        .unwrap();

        let mut config = AppConfig::default();
        apply_overrides(&cli, &mut config);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/registry"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.registry_id, [1u8; 32]);
        assert_eq!(config.log_level, "info");
        assert_eq!(
            cli.command,
            Commands::Get {
                name: "mysite1".into()
            }
        );
    }

    #[test]
    fn subcommands_parse_identities() {
        let cli = Cli::try_parse_from([
            "namereg", "register", "mysite1", "--caller", "alice", "--payer", "sponsor",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Commands::Register {
                name: "mysite1".into(),
                caller: Identity::from_label("alice"),
                payer: Some(Identity::from_label("sponsor")),
            }
        );

        let cli = Cli::try_parse_from(["namereg", "transfer", "mysite1", "bob", "--caller", "alice"])
            .unwrap();
        assert_eq!(
            cli.command,
            Commands::Transfer {
                name: "mysite1".into(),
                new_owner: Identity::from_label("bob"),
                caller: Identity::from_label("alice"),
            }
        );
    }

    #[test]
    fn json_format_writes_one_object_per_event() {
        let buffer = SharedBuffer::default();
        let sink = buffer.clone();
        let subscriber =
            tracing_subscriber::registry().with(fmt_layer(LogFormat::Json, move || sink.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "registry", name = "mysite1", "Registered");
        });

        let output = buffer.contents();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 1);
        let event: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(event["level"], "INFO");
        assert_eq!(event["target"], "registry");
        assert_eq!(event["fields"]["message"], "Registered");
        assert_eq!(event["fields"]["name"], "mysite1");
    }

    #[test]
    fn pretty_format_is_not_json() {
        let buffer = SharedBuffer::default();
        let sink = buffer.clone();
        let subscriber =
            tracing_subscriber::registry().with(fmt_layer(LogFormat::Pretty, move || sink.clone()));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "registry", "Registered");
        });

        let output = buffer.contents();
        assert!(output.contains("Registered"));
        assert!(serde_json::from_str::<serde_json::Value>(output.trim()).is_err());
    }

    #[test]
    fn unknown_log_format_flag_is_rejected() {
        let result = Cli::try_parse_from(["namereg", "--log-format", "xml", "list"]);
        assert!(result.is_err());
    }

    #[test]
    fn malformed_registry_id_is_rejected() {
        let result = Cli::try_parse_from(["namereg", "--registry-id", "zz", "list"]);
        assert!(result.is_err());
    }
}
