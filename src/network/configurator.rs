//! Installing negotiated leases on the host.

use crate::engine::Lease;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigureError {
    #[error("Failed to open configuration socket")]
    Socket(#[source] io::Error),

    #[error("Interface name '{0}' does not fit into IFNAMSIZ")]
    NameTooLong(String),

    #[error("ioctl({request}) failed on '{interface}'")]
    Ioctl {
        request: &'static str,
        interface: String,
        #[source]
        source: io::Error,
    },

    #[cfg(not(target_os = "linux"))]
    #[error("Interface configuration is not implemented on this platform")]
    NotImplemented,
}

/// Receives every lease the engine binds. Implementations report failures
/// only to the log; the engine never learns about them.
pub trait LeaseApplier {
    fn apply_lease(&self, lease: &Lease) -> Result<(), ConfigureError>;
}

/// Only logs leases. Used for dry runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogApplier;

impl LeaseApplier for LogApplier {
    fn apply_lease(&self, lease: &Lease) -> Result<(), ConfigureError> {
        tracing::info!(
            "Lease for {}: address {} mask {} gateway {} ({})",
            lease.interface,
            lease.address,
            lease.subnet_mask,
            lease
                .gateway
                .map_or_else(|| "none".to_string(), |gw| gw.to_string()),
            lease
                .lease_time
                .map_or_else(|| "infinite".to_string(), |t| format!("{}s", t.as_secs()))
        );
        Ok(())
    }
}

/// Sets address, netmask and default route through the kernel's ioctl
/// interface.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetworkConfigurator;

impl NetworkConfigurator {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "linux")]
mod imp {
    use super::ConfigureError;
    use std::{io, mem, net::Ipv4Addr, os::fd::AsRawFd};

    fn sockaddr(address: Ipv4Addr) -> libc::sockaddr {
        let sin = libc::sockaddr_in {
            sin_family: libc::AF_INET as libc::sa_family_t,
            sin_port: 0,
            sin_addr: libc::in_addr {
                s_addr: u32::from_ne_bytes(address.octets()),
            },
            sin_zero: [0; 8],
        };
        // SAFETY: sockaddr_in and sockaddr are both 16 bytes and sockaddr has
        // no invalid bit patterns.
        unsafe { mem::transmute::<libc::sockaddr_in, libc::sockaddr>(sin) }
    }

    fn ifreq(interface: &str) -> Result<libc::ifreq, ConfigureError> {
        if interface.len() >= libc::IFNAMSIZ {
            return Err(ConfigureError::NameTooLong(interface.to_string()));
        }
        // SAFETY: ifreq is plain old data; all zeroes is a valid value.
        let mut ifr: libc::ifreq = unsafe { mem::zeroed() };
        for (dst, &src) in ifr.ifr_name.iter_mut().zip(interface.as_bytes()) {
            *dst = src as libc::c_char;
        }
        Ok(ifr)
    }

    fn ioctl<T>(
        fd: libc::c_int,
        request: libc::c_ulong,
        name: &'static str,
        interface: &str,
        arg: &mut T,
    ) -> Result<(), ConfigureError> {
        // SAFETY: `arg` is the structure the request expects and outlives the call.
        let ret = unsafe { libc::ioctl(fd, request as _, arg as *mut T) };
        if ret < 0 {
            return Err(ConfigureError::Ioctl {
                request: name,
                interface: interface.to_string(),
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }

    pub(super) fn set_params(
        interface: &str,
        address: Ipv4Addr,
        netmask: Ipv4Addr,
        gateway: Option<Ipv4Addr>,
    ) -> Result<(), ConfigureError> {
        use socket2::{Domain, Socket, Type};

        let mut ifr = ifreq(interface)?;
        let socket =
            Socket::new(Domain::IPV4, Type::DGRAM, None).map_err(ConfigureError::Socket)?;
        let fd = socket.as_raw_fd();

        ifr.ifr_ifru.ifru_addr = sockaddr(address);
        ioctl(fd, libc::SIOCSIFADDR as _, "SIOCSIFADDR", interface, &mut ifr)?;

        ifr.ifr_ifru.ifru_netmask = sockaddr(netmask);
        ioctl(fd, libc::SIOCSIFNETMASK as _, "SIOCSIFNETMASK", interface, &mut ifr)?;

        let Some(gateway) = gateway else {
            tracing::debug!("No router offered for {}, leaving routes alone", interface);
            return Ok(());
        };

        let mut dev: Vec<libc::c_char> = interface
            .bytes()
            .map(|b| b as libc::c_char)
            .chain(std::iter::once(0))
            .collect();
        // SAFETY: rtentry is plain old data; all zeroes is a valid value.
        let mut rt: libc::rtentry = unsafe { mem::zeroed() };
        rt.rt_dst = sockaddr(Ipv4Addr::UNSPECIFIED);
        rt.rt_genmask = sockaddr(Ipv4Addr::UNSPECIFIED);
        rt.rt_gateway = sockaddr(gateway);
        rt.rt_flags = libc::RTF_UP | libc::RTF_GATEWAY;
        rt.rt_dev = dev.as_mut_ptr();

        match ioctl(fd, libc::SIOCADDRT as _, "SIOCADDRT", interface, &mut rt) {
            Err(ConfigureError::Ioctl { source, .. })
                if source.raw_os_error() == Some(libc::EEXIST) =>
            {
                tracing::debug!("Default route via {} already present", gateway);
                Ok(())
            }
            other => other,
        }
    }
}

#[cfg(target_os = "linux")]
impl LeaseApplier for NetworkConfigurator {
    fn apply_lease(&self, lease: &Lease) -> Result<(), ConfigureError> {
        imp::set_params(
            &lease.interface,
            lease.address,
            lease.subnet_mask,
            lease.gateway,
        )?;
        tracing::info!(
            "Configured {} with {}/{}",
            lease.interface,
            lease.address,
            lease.subnet_mask
        );
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
impl LeaseApplier for NetworkConfigurator {
    fn apply_lease(&self, _lease: &Lease) -> Result<(), ConfigureError> {
        Err(ConfigureError::NotImplemented)
    }
}
