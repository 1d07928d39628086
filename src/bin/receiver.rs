//! CLI entry point for the receiving half of a transfer session: sends the
//! initial START handshake to a configured sender and reassembles the
//! incoming byte stream to a local file.
use std::fs::File;
use std::net::{SocketAddr, UdpSocket};

use clap::Parser;
use log::error;

use rudt::config::Config;
use rudt::err::Error;
use rudt::transport::Receiver;

/// Reliable file receiver over UDP.
#[derive(Debug, Parser)]
struct Args {
    /// IP address of the sender to connect to.
    server_ip: String,
    /// UDP port of the sender.
    server_port: u16,
    /// File to write the reassembled transfer to.
    #[arg(long, default_value = "received_file.txt")]
    output: String,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(args) {
        error!("receiver exited with error: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Error> {
    let server_address: SocketAddr = format!("{}:{}", args.server_ip, args.server_port)
        .parse()
        .map_err(|_| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, "bad server address")))?;

    // Bind on an ephemeral local port; the sender learns our address from
    // the first datagram it receives (the START handshake).
    let socket = UdpSocket::bind("0.0.0.0:0")?;

    let config = Config::default();
    let mut out = File::create(&args.output)?;
    let mut receiver = Receiver::new(socket, config, server_address);
    receiver.run(&mut out)
}
