//! Chatwire - point-to-point encrypted chat over TCP.
//!
//! A thin terminal collaborator around the transport library: it provisions
//! key pairs, connects to a peer, forwards stdin lines as text messages, and
//! prints inbound messages as they arrive.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use chatwire::crypto::load_public_key;
use chatwire::{
    resolve_peer_addr, ChatClient, ClientConfig, EventHandlers, KeyPair, ResponseType, SealedCipher,
};

/// Delay between connect attempts.
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Chatwire - point-to-point encrypted chat over TCP
///
/// Both peers hold an X25519 key pair and the other side's public key;
/// every message is sealed whole before it touches the socket.
#[derive(Parser)]
#[command(name = "chatwire")]
#[command(version)]
#[command(about = "Point-to-point encrypted chat transport")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new key pair
    Keygen {
        /// Output path for keys (creates .pub and .key files)
        #[arg(short, long, default_value = "chatwire")]
        output: PathBuf,
    },

    /// Connect to a peer and chat from the terminal
    ///
    /// Lines read from stdin are sent as text messages; inbound text
    /// messages are printed as they arrive. Ctrl+C or end of input ends
    /// the session.
    Connect {
        /// Peer host ("localhost" or a literal IP address)
        #[arg(long, default_value = "localhost")]
        host: String,

        /// Peer port
        #[arg(long, default_value_t = 5000)]
        port: u16,

        /// Base path of your key pair (reads {key}.pub and {key}.key)
        #[arg(short, long)]
        key: PathBuf,

        /// Path to the peer's public key
        #[arg(long = "peer-key")]
        peer_key: PathBuf,

        /// Optional TOML file with transport parameters
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen { output } => keygen(&output),
        Commands::Connect {
            host,
            port,
            key,
            peer_key,
            config,
        } => connect(&host, port, &key, &peer_key, config.as_deref()).await,
    }
}

/// Generates a key pair and saves it to files.
fn keygen(output: &Path) -> Result<()> {
    let keypair = KeyPair::generate();
    keypair
        .save_to_files(output)
        .context("Failed to save key pair")?;

    println!("Key pair generated:");
    println!("  Public key:  {}", output.with_extension("pub").display());
    println!("  Private key: {}", output.with_extension("key").display());
    println!();
    println!("Public key (hex): {}", hex::encode(keypair.public_key().as_bytes()));
    println!();
    println!("Share the .pub file with your peer and keep the .key file secret.");

    Ok(())
}

/// Loads transport parameters from a TOML file, or defaults.
fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
        }
        None => Ok(ClientConfig::default()),
    }
}

/// Connects to a peer and runs the terminal chat session.
async fn connect(
    host: &str,
    port: u16,
    key_path: &Path,
    peer_key_path: &Path,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;

    let keypair = KeyPair::load_from_files(key_path)
        .with_context(|| format!("Failed to load key pair from {}", key_path.display()))?;
    let peer_public = load_public_key(peer_key_path).with_context(|| {
        format!("Failed to load peer public key from {}", peer_key_path.display())
    })?;

    let addr = resolve_peer_addr(host, port)
        .with_context(|| format!("Invalid peer host: {}", host))?;

    let cipher = SealedCipher::new(keypair.into_secret_key(), peer_public)
        .with_max_block_len(config.max_response_bytes);

    let handlers = EventHandlers::new()
        .on_message_received(|message| match message.response_type {
            ResponseType::StringMessage => println!("peer: {}", message.as_text()),
            // Only text is rendered in the terminal
            ResponseType::Image | ResponseType::Audio => {}
        })
        .on_connect_failure(|error| eprintln!("could not connect: {}", error))
        .on_receive_failure(|error| eprintln!("connection trouble: {}", error))
        .on_send_failure(|error| eprintln!("could not send: {}", error));

    let client = ChatClient::new(config, Arc::new(cipher), handlers);

    println!("Connecting to {}...", addr);
    while !client.connect_addr(addr).await {
        tokio::time::sleep(CONNECT_RETRY_DELAY).await;
    }
    println!("Connected. Type a message and press Enter to send. Ctrl+C to quit.");

    client.start_listening();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.is_empty() {
                        continue;
                    }
                    if !client.send_text(&line).await {
                        eprintln!("message too large, not sent");
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    eprintln!("stdin error: {}", error);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    println!("Disconnecting...");
    client.stop_listening_and_wait().await;
    client.disconnect().await;

    Ok(())
}
