//! Retry Relay Command Line Tool
//!
//! This binary is the command-line interface for Retry Relay.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use log::{error, info, warn};

use retry_relay::common::{init_logger, read_file, ProxyError, Result};
use retry_relay::config::{log_config, ProxyConfig, LOG_LEVEL_STR, REQUIRED_POSITIONALS};
use retry_relay::{Proxy, RsaDecryptor, APP_NAME, VERSION};

/// Retry Relay: length-prefixed TCP relay with sequence-numbered retries
#[derive(Parser, Debug)]
#[clap(author, version = VERSION, about, long_about = None)]
struct Args {
    /// sourcePort destIP destPort [yes|no] [retryCount] [timeoutSeconds] [privateKeyFilePath]
    #[clap(value_name = "ARGS", allow_hyphen_values = true)]
    positional: Vec<String>,

    /// Log level (error, warn, info, debug, trace)
    #[clap(long, env = "RETRY_RELAY_LOG_LEVEL", default_value = LOG_LEVEL_STR)]
    log_level: String,

    /// Base configuration file (JSON); positional arguments override it
    #[clap(long)]
    config: Option<PathBuf>,

    /// Keep using a live destination connection instead of reconnecting per send
    #[clap(long)]
    reuse_destination: bool,
}

/// Build the configuration from the file and the positional arguments
fn load_config(args: &Args) -> Result<ProxyConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from file: {}", path.display());
            ProxyConfig::from_file(path)?.with_positional(&args.positional)?
        }
        None => ProxyConfig::from_positional(&args.positional)?,
    };

    if args.reuse_destination {
        config.reuse_destination = true;
    }
    config.log_level = args.log_level.clone();

    config.validate()?;
    Ok(config)
}

/// Load the reply decryption key, if one is configured
fn load_decryptor(config: &ProxyConfig) -> Option<RsaDecryptor> {
    let path = config.private_key_path.as_ref()?;

    let pem = match read_file(path) {
        Ok(pem) => pem,
        Err(e) => {
            warn!("{}", ProxyError::KeyLoad(e.to_string()));
            warn!("Replies will be forwarded without decryption");
            return None;
        }
    };

    match RsaDecryptor::from_pem(&pem) {
        Some(decryptor) => {
            info!("Loaded private key from {}", path.display());
            Some(decryptor)
        }
        None => {
            warn!(
                "{}",
                ProxyError::KeyLoad(format!("{} is not a usable 2048-bit RSA key", path.display()))
            );
            warn!("Replies will be forwarded without decryption");
            None
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger
    init_logger(&args.log_level);

    if args.config.is_none() && args.positional.len() < REQUIRED_POSITIONALS {
        Args::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "expected at least sourcePort destIP destPort",
            )
            .exit();
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) if e.is_fatal() => Args::command().error(ErrorKind::ValueValidation, e).exit(),
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Starting {} v{}", APP_NAME, VERSION);
    log_config(&config);

    let decryptor = load_decryptor(&config);
    let proxy = Proxy::new(Arc::new(config), decryptor);

    info!("Proxy service ready, press Ctrl+C to stop");

    match proxy.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
