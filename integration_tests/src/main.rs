//! Collector monitor for the single-channel gateway.
//!
//! Run on the machine the gateway forwards to (or point `GATEWAY_COLLECTORS`
//! at it) and send a few LoRa frames. Every datagram is checked against the
//! uplink and status formats.

mod checks;
mod collector;
mod protocol;

use std::time::Duration;

use clap::Parser;
use colored::Colorize;

use checks::{check_datagram, print_results};
use collector::CollectorSocket;
use protocol::parse_datagram;

#[derive(Parser)]
#[command(name = "collector-monitor")]
#[command(about = "Validates datagrams sent by the single-channel gateway")]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:1700")]
    bind: String,

    /// Stop after this many datagrams (0 = until timeout)
    #[arg(short, long, default_value = "0")]
    count: usize,

    /// Seconds to wait for the next datagram
    #[arg(short, long, default_value = "65")]
    timeout: u64,

    /// Expected gateway identity, e.g. b8:27:eb:ff:ff:12:34:56
    #[arg(short, long)]
    gateway: Option<String>,

    /// Do not answer with PUSH_ACK
    #[arg(long)]
    no_ack: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut socket = CollectorSocket::bind(&args.bind, Duration::from_secs(args.timeout))?;

    println!("{}", "Single Channel Gateway Collector Monitor".bold());
    println!("Listening: {}", socket.local_addr()?);
    if let Some(gateway) = &args.gateway {
        println!("Gateway: {}", gateway);
    }
    println!();

    let mut results = Vec::new();
    let mut datagrams = 0;

    // A status report arrives every 30 s, so the default timeout always
    // sees at least one datagram from a running gateway
    while let Some((data, from)) = socket.receive()? {
        datagrams += 1;

        match parse_datagram(&data) {
            Ok(datagram) => {
                println!(
                    "  #{} {} from {} ({} bytes, token 0x{:04x})",
                    datagrams,
                    datagram.kind().unwrap_or("unknown"),
                    from,
                    data.len(),
                    datagram.token
                );
                results.extend(check_datagram(&datagram, args.gateway.as_deref()));

                if !args.no_ack {
                    socket.acknowledge(datagram.token, from)?;
                }
            }
            Err(e) => {
                println!("  #{} from {}: {}", datagrams, from, format!("{:#}", e).red());
                results.push(checks::TestResult {
                    name: format!("Datagram #{} parses", datagrams),
                    passed: false,
                    message: Some(format!("{:#}", e)),
                });
            }
        }

        if args.count > 0 && datagrams >= args.count {
            break;
        }
    }

    print_results(&results, datagrams);

    if datagrams == 0 {
        println!("{}", "No datagrams received".red());
        std::process::exit(1);
    }

    // Exit with error code if any check failed
    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}
