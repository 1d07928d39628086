//! CLI entry point for the sending half of a transfer session: binds a UDP
//! socket, waits for the receiver's handshake, and streams a local file.
use std::fs::File;
use std::net::{SocketAddr, UdpSocket};

use clap::Parser;
use log::error;

use rudt::config::Config;
use rudt::err::Error;
use rudt::transport::congestion::{AimdController, Controller, FixedWindowController};
use rudt::transport::Sender;

/// Reliable file sender over UDP.
#[derive(Debug, Parser)]
struct Args {
    /// Local IP address to bind to.
    ip: String,
    /// Local UDP port to bind to.
    port: u16,
    /// Use AIMD congestion control (Slow Start / Congestion Avoidance / Fast
    /// Recovery) instead of the fixed-window controller.
    #[arg(long)]
    aimd: bool,
    /// Fixed-window controller only: fast-retransmit on three duplicate ACKs.
    #[arg(long)]
    fast_recovery: bool,
    /// File to transmit.
    #[arg(long, default_value = "file.txt")]
    file: String,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(args) {
        error!("sender exited with error: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Error> {
    if args.aimd && args.fast_recovery {
        return Err(Error::FastRecoveryNotApplicable);
    }

    let bind_addr: SocketAddr = format!("{}:{}", args.ip, args.port)
        .parse()
        .map_err(|_| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, "bad bind address")))?;
    let socket = UdpSocket::bind(bind_addr)?;

    let config = Config::default();
    let controller = if args.aimd {
        Controller::Aimd(AimdController::new(&config))
    } else {
        Controller::Fixed(FixedWindowController::new(&config, args.fast_recovery))
    };

    let mut file = File::open(&args.file)?;
    let mut sender = Sender::new(socket, config, controller);
    sender.run(&mut file)
}
