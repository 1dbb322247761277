//! `vip` — add, delete, or query virtual IP addresses on an interface.

use std::net::IpAddr;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use common::{Error, Result};
use netvip::{AddressPrefix, Interface};

#[derive(Parser)]
#[command(name = "vip", version, about = "Add or delete virtual IP addresses")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ensure a virtual IP address is added; does nothing if it is already
    /// present
    #[command(visible_alias = "a")]
    Add {
        /// Network interface to add the address to (e.g. eth0)
        #[arg(short, long)]
        interface: String,

        /// Virtual IP address prefix (CIDR) to add (e.g. 192.0.2.100/32)
        #[arg(short, long)]
        address: AddressPrefix,

        /// Label for the address (e.g. eth0:0)
        #[arg(short, long)]
        label: Option<String>,

        /// Do not announce the address with a gratuitous ARP
        #[arg(long)]
        no_garp: bool,

        /// Print nothing; communicate through the exit status only
        #[arg(short, long)]
        quiet: bool,
    },

    /// Ensure a virtual IP address is deleted; does nothing if it is already
    /// absent
    #[command(visible_alias = "d")]
    Del {
        /// Network interface to delete the address from (e.g. eth0)
        #[arg(short, long)]
        interface: String,

        /// Virtual IP address prefix (CIDR) to delete (e.g. 192.0.2.100/32)
        #[arg(short, long)]
        address: AddressPrefix,

        /// Print nothing; communicate through the exit status only
        #[arg(short, long)]
        quiet: bool,

        /// Keep watching for gratuitous ARP packets and delete the address
        /// each time another host announces it
        #[arg(short, long)]
        watch: bool,
    },

    /// Check whether the interface carries the virtual IP address prefix
    Has {
        /// Network interface to check (e.g. eth0)
        #[arg(short, long)]
        interface: String,

        /// Virtual IP address prefix (CIDR) to check (e.g. 192.0.2.100/32)
        #[arg(short, long)]
        address: AddressPrefix,

        /// Print nothing; communicate through the exit status only
        #[arg(short, long)]
        quiet: bool,
    },
}

fn main() -> ExitCode {
    common::logging::init();
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Add {
            interface,
            address,
            label,
            no_garp,
            quiet,
        } => {
            let intf = Interface::by_name(&interface)?;
            exec_add(&intf, &address, label.as_deref(), !no_garp, quiet)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Del {
            interface,
            address,
            quiet,
            watch,
        } => {
            let intf = Interface::by_name(&interface)?;
            exec_del(&intf, &address, quiet, watch)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Has {
            interface,
            address,
            quiet,
        } => {
            let intf = Interface::by_name(&interface)?;
            exec_has(&intf, &address, quiet)
        }
    }
}

fn say(quiet: bool, message: &str) {
    if !quiet {
        println!("{message}");
    }
}

fn exec_add(
    intf: &Interface,
    prefix: &AddressPrefix,
    label: Option<&str>,
    garp: bool,
    quiet: bool,
) -> Result<()> {
    match netvip::add_address(intf.index, prefix, label) {
        Ok(()) => say(
            quiet,
            &format!("added address {prefix} to interface {}", intf.name),
        ),
        Err(err) if err.is_exist() => say(
            quiet,
            &format!(
                "address {prefix} is already added to interface {}",
                intf.name
            ),
        ),
        Err(err) => return Err(err),
    }

    if garp {
        // A gratuitous announcement is an IPv4 affair; IPv6 uses neighbor
        // discovery instead.
        if let IpAddr::V4(addr) = prefix.addr() {
            netvip::send_garp(intf, addr)?;
            say(
                quiet,
                &format!(
                    "sent GARP packet for address {prefix} at interface {}",
                    intf.name
                ),
            );
        }
    }

    Ok(())
}

fn exec_del(intf: &Interface, prefix: &AddressPrefix, quiet: bool, watch: bool) -> Result<()> {
    if watch {
        let IpAddr::V4(addr) = prefix.addr() else {
            return Err(Error::prefix(format!(
                "{prefix} is not IPv4; GARP watching only works for IPv4 addresses"
            )));
        };
        let cancel = CancellationToken::new();
        return netvip::watch_garp(&cancel, intf, addr, |packet| {
            if intf.mac == Some(packet.sender_hardware) {
                say(
                    quiet,
                    &format!(
                        "interface {} received GARP packet for VIP {prefix} sent from itself",
                        intf.name
                    ),
                );
                return Ok(());
            }
            delete_vip(intf, prefix, quiet)
        });
    }

    delete_vip(intf, prefix, quiet)
}

fn delete_vip(intf: &Interface, prefix: &AddressPrefix, quiet: bool) -> Result<()> {
    match netvip::delete_address(intf.index, prefix) {
        Ok(()) => say(
            quiet,
            &format!("deleted address {prefix} from interface {}", intf.name),
        ),
        Err(err) if err.is_addr_not_avail() => say(
            quiet,
            &format!(
                "address {prefix} is already deleted from interface {}",
                intf.name
            ),
        ),
        Err(err) => return Err(err),
    }
    Ok(())
}

fn exec_has(intf: &Interface, prefix: &AddressPrefix, quiet: bool) -> Result<ExitCode> {
    if intf.has_prefix(prefix)? {
        say(
            quiet,
            &format!("interface {} has address {prefix}", intf.name),
        );
        Ok(ExitCode::SUCCESS)
    } else {
        say(
            quiet,
            &format!("interface {} does not have address {prefix}", intf.name),
        );
        Ok(ExitCode::FAILURE)
    }
}
