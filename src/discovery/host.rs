// src/discovery/host.rs
use crate::cert::PkiError;
use std::{fs, net::Ipv4Addr, path::Path, process::Command};

const HOSTNAME_FILE: &str = "/proc/sys/kernel/hostname";
const LAN_INTERFACE_PREFIX: char = 'e';

fn command_output(program: &str, args: &[&str]) -> Result<String, PkiError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| PkiError::io(Path::new(program), e))?;

    if !output.status.success() {
        return Err(PkiError::InvalidConfig(format!(
            "{} {} failed: {}",
            program,
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn clean_hostname(raw: &str) -> Option<String> {
    let name = raw.trim();
    (!name.is_empty()).then(|| name.to_string())
}

pub fn discover_hostname() -> Result<String, PkiError> {
    if let Some(name) = fs::read_to_string(HOSTNAME_FILE)
        .ok()
        .and_then(|raw| clean_hostname(&raw))
    {
        return Ok(name);
    }

    clean_hostname(&command_output("hostname", &[])?)
        .ok_or_else(|| PkiError::InvalidConfig("could not determine hostname".to_string()))
}

/// First IPv4 address on an interface whose name starts with `e`, from
/// `ip -o -4 addr show` output.
pub fn parse_ip_addr_output(output: &str) -> Option<Ipv4Addr> {
    output.lines().find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [_, interface, "inet", address, ..] if interface.starts_with(LAN_INTERFACE_PREFIX) => {
                address.split('/').next()?.parse().ok()
            }
            _ => None,
        }
    })
}

pub fn discover_lan_ip() -> Result<Ipv4Addr, PkiError> {
    let output = command_output("ip", &["-o", "-4", "addr", "show"])?;
    parse_ip_addr_output(&output).ok_or_else(|| {
        PkiError::InvalidConfig(format!(
            "no IPv4 address found on an interface starting with '{}'",
            LAN_INTERFACE_PREFIX
        ))
    })
}
