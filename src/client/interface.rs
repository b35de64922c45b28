//! Local network interface lookup for binding outbound connections

use crate::client::error::{ClientError, Result};
use std::net::IpAddr;
use tracing::debug;

/// Resolve a network interface name (e.g. "eth0") to its first IP address.
///
/// Fails with a configuration error if no interface carries that name or if it
/// has no IPv4/IPv6 address assigned.
#[cfg(unix)]
pub fn first_address(name: &str) -> Result<IpAddr> {
    use std::ffi::CStr;
    use std::net::{Ipv4Addr, Ipv6Addr};

    let mut seen = false;
    let mut found = None;

    // Use libc getifaddrs; entries without an address still prove the name exists.
    unsafe {
        let mut ifaddrs: *mut libc::ifaddrs = std::ptr::null_mut();
        if libc::getifaddrs(&mut ifaddrs) != 0 {
            return Err(ClientError::Config(format!(
                "listing interfaces: {}",
                std::io::Error::last_os_error()
            )));
        }

        let mut current = ifaddrs;
        while !current.is_null() {
            let ifa = &*current;
            current = ifa.ifa_next;

            if CStr::from_ptr(ifa.ifa_name).to_string_lossy() != name {
                continue;
            }
            seen = true;
            if ifa.ifa_addr.is_null() {
                continue;
            }

            match i32::from((*ifa.ifa_addr).sa_family) {
                libc::AF_INET => {
                    let addr = &*(ifa.ifa_addr as *const libc::sockaddr_in);
                    found = Some(IpAddr::V4(Ipv4Addr::from(u32::from_be(
                        addr.sin_addr.s_addr,
                    ))));
                }
                libc::AF_INET6 => {
                    let addr = &*(ifa.ifa_addr as *const libc::sockaddr_in6);
                    found = Some(IpAddr::V6(Ipv6Addr::from(addr.sin6_addr.s6_addr)));
                }
                _ => continue,
            }
            break;
        }

        libc::freeifaddrs(ifaddrs);
    }

    match found {
        Some(ip) => {
            debug!(interface = name, ip = %ip, "Resolved interface address");
            Ok(ip)
        }
        None if seen => Err(ClientError::Config(format!(
            "no addresses found on interface {:?}",
            name
        ))),
        None => Err(ClientError::Config(format!(
            "selecting interface: no interface named {:?}",
            name
        ))),
    }
}

#[cfg(not(unix))]
pub fn first_address(name: &str) -> Result<IpAddr> {
    Err(ClientError::Config(format!(
        "binding to interface {:?} is not supported on this platform",
        name
    )))
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_resolves() {
        let ip = first_address("lo").unwrap();
        assert!(ip.is_loopback(), "lo resolved to {}", ip);
    }

    #[test]
    fn test_unknown_interface_is_config_error() {
        let err = first_address("does_not_exist_xyz99").unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
