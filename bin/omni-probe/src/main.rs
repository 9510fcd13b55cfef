use clap::Parser;
use colored::Colorize;
use log::info;

use omni_cipher::ControllerKey;
use omni_core::KEY_SIZE;
use omni_link::LinkConfig;
use omni_linux::{TcpConfig, DEFAULT_PORT};

/// Open a secure Omni-Link II session to a controller and close it again.
#[derive(Parser)]
struct Cli {
    #[arg(long)] host: String,
    #[arg(long, default_value_t = DEFAULT_PORT)] port: u16,
    /// Controller encryption key, 32 hex digits.
    #[arg(long)] key: String,
    /// Per-step handshake timeout, at least 1 ms.
    #[arg(long, default_value_t = 5000, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_ms: u64,
}

fn parse_key(text: &str) -> anyhow::Result<ControllerKey> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
    let bytes = hex::decode(&cleaned)?;
    let key: [u8; KEY_SIZE] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("key must be {} bytes, got {}", KEY_SIZE, b.len()))?;
    Ok(ControllerKey(key))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let key = parse_key(&cli.key)?;

    let link_config = LinkConfig { io_timeout_us: Some(cli.timeout_ms.saturating_mul(1_000)) };
    let tcp_config = TcpConfig {
        connect_timeout: std::time::Duration::from_millis(cli.timeout_ms),
        ..TcpConfig::default()
    };

    info!("Connecting to {}:{}...", cli.host, cli.port);
    let mut session = match omni_linux::connect(&cli.host, cli.port, key, link_config, &tcp_config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{} {}", "HANDSHAKE FAILED:".red().bold(), e);
            return Err(e);
        }
    };

    let id = session.session_id().map(hex::encode).unwrap_or_default();
    println!("{} session id {}", "SECURE SESSION ESTABLISHED".green().bold(), id);

    session.terminate()?;
    info!("Session terminated.");
    Ok(())
}
