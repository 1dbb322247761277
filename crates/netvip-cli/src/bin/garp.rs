//! `garp` — observe gratuitous ARP announcements, optionally claiming the
//! address first.

use std::net::IpAddr;
use std::process::ExitCode;
use std::thread;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use common::{Error, Result};
use netvip::{AddressPrefix, Interface};

#[derive(Parser)]
#[command(name = "garp", version, about = "Send or receive gratuitous ARP packets")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch for gratuitous ARP announcements of an address and report each
    /// one
    #[command(visible_alias = "s")]
    Serve {
        /// Network interface to watch (e.g. eth0)
        #[arg(short, long)]
        interface: String,

        /// Virtual IP address prefix (CIDR) to watch for (e.g. 192.0.2.100/32)
        #[arg(short, long)]
        address: AddressPrefix,

        /// Label for the address (e.g. eth0:0), used with --add
        #[arg(short, long)]
        label: Option<String>,

        /// Add the address and announce it once the watcher is running
        #[arg(long)]
        add: bool,
    },
}

fn main() -> ExitCode {
    common::logging::init();
    let cli = Cli::parse();
    let Command::Serve {
        interface,
        address,
        label,
        add,
    } = cli.command;
    match serve(&interface, &address, label.as_deref(), add) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn serve(interface: &str, prefix: &AddressPrefix, label: Option<&str>, add: bool) -> Result<()> {
    let intf = Interface::by_name(interface)?;
    let IpAddr::V4(addr) = prefix.addr() else {
        return Err(Error::prefix(format!(
            "{prefix} is not IPv4; GARP only works for IPv4 addresses"
        )));
    };

    if add {
        let intf = intf.clone();
        let prefix = *prefix;
        let label = label.map(str::to_string);
        thread::spawn(move || {
            match netvip::add_address(intf.index, &prefix, label.as_deref()) {
                Ok(()) => println!("added address {prefix} to interface {}", intf.name),
                Err(err) if err.is_exist() => {
                    println!("address {prefix} is already added to interface {}", intf.name)
                }
                Err(err) => {
                    eprintln!("add address: {err}");
                    return;
                }
            }
            match netvip::send_garp(&intf, addr) {
                Ok(()) => println!("sent GARP packet for address {prefix}"),
                Err(err) => eprintln!("send GARP: {err}"),
            }
        });
    }

    let cancel = CancellationToken::new();
    netvip::watch_garp(&cancel, &intf, addr, |packet| {
        println!(
            "received GARP packet for {} from {}",
            packet.sender_protocol, packet.sender_hardware
        );
        Ok(())
    })
}
