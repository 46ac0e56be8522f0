//! Entry point for `drtp`.
//!
//! Parses CLI arguments and dispatches into either **server** or **client** mode.
//! All actual protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, signal handling, argument parsing).

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use drtp::config::DEFAULT_WINDOW;
use drtp::simulator::{Faults, TestCase};
use drtp::state::Role;
use drtp::{client, server, ClientConfig, DrtpError, Method, ServerConfig};

/// Reliable file transfer over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Receive one file per client, writing each to OUTPUT.
    Server {
        /// Address to bind.
        #[arg(short, long, default_value = "127.0.0.1")]
        ip: IpAddr,
        /// Port to bind.
        #[arg(short, long, default_value_t = 8088, value_parser = clap::value_parser!(u16).range(1024..))]
        port: u16,
        /// Reliability method: stop_and_wait, gbn or gbn-sr.
        #[arg(short = 'r', long, visible_alias = "reliable-method", default_value = "stop_and_wait")]
        method: Method,
        /// Where to write the received file.
        #[arg(short, long, default_value = "received_file")]
        output: PathBuf,
        /// Fault scenario to inject.
        #[arg(short, long, value_enum, default_value_t = TestCase::Normal)]
        test_case: TestCase,
    },
    /// Send a file to a server.
    Client {
        /// Server address.
        #[arg(short, long, default_value = "127.0.0.1")]
        ip: IpAddr,
        /// Server port.
        #[arg(short, long, default_value_t = 8088, value_parser = clap::value_parser!(u16).range(1024..))]
        port: u16,
        /// Reliability method: stop_and_wait, gbn or gbn-sr.
        #[arg(short = 'r', long, visible_alias = "reliable-method", default_value = "stop_and_wait")]
        method: Method,
        /// Packets in flight for gbn / gbn-sr.
        #[arg(short, long, default_value_t = DEFAULT_WINDOW, value_parser = clap::value_parser!(u16).range(1..))]
        window: u16,
        /// File to send.
        #[arg(short, long, default_value = "file_to_transfer.jpg")]
        file: PathBuf,
        /// Fault scenario to inject.
        #[arg(short, long, value_enum, default_value_t = TestCase::Normal)]
        test_case: TestCase,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    match run(cli.mode).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            match e.downcast_ref::<DrtpError>() {
                Some(DrtpError::MethodMismatch { .. }) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(mode: Mode) -> anyhow::Result<()> {
    match mode {
        Mode::Server {
            ip,
            port,
            method,
            output,
            test_case,
        } => {
            let mut config = ServerConfig::new(SocketAddr::new(ip, port), method, output);
            config.faults = Faults::for_test_case(test_case, Role::Receiver);
            log::info!("Starting server on {}", config.bind);

            tokio::select! {
                result = server::run(&config) => {
                    result.with_context(|| format!("serving on {}", config.bind))?;
                }
                _ = tokio::signal::ctrl_c() => log::info!("interrupted; shutting down"),
            }
        }
        Mode::Client {
            ip,
            port,
            method,
            window,
            file,
            test_case,
        } => {
            let mut config = ClientConfig::new(SocketAddr::new(ip, port), method, file);
            config.window = window;
            config.faults = Faults::for_test_case(test_case, Role::Sender);
            log::info!("Starting client, connecting to {}", config.server);

            let stats = client::run(&config)
                .await
                .with_context(|| format!("sending {}", config.file.display()))?;
            println!("{stats}");
        }
    }
    Ok(())
}
