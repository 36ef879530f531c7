use std::collections::HashMap;
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};

use tracing::debug;

use crate::error::{Result, TransportError};

/// The logical address of one remote resource.
///
/// `service_path` names the peripheral service (`"i2c"`, `"serial"`, ...) and
/// `resource` the concrete device behind it (`"/dev/ttyUSB0"`, bus `"1"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceTarget {
    pub host: String,
    pub service_path: String,
    pub resource: String,
}

impl ResourceTarget {
    pub fn new(
        host: impl Into<String>,
        service_path: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            service_path: service_path.into(),
            resource: resource.into(),
        }
    }
}

/// A concrete socket endpoint: `ws://{host}:{port}/{service_path}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub service_path: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, service_path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            service_path: service_path.into(),
        }
    }

    /// WebSocket URL for this endpoint.
    pub fn url(&self) -> String {
        format!(
            "ws://{}:{}/{}",
            self.host,
            self.port,
            self.service_path.trim_start_matches('/')
        )
    }

    /// Resolve the host to socket addresses.
    pub fn socket_addrs(&self) -> Result<Vec<SocketAddr>> {
        let addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Address {
                host: self.host.clone(),
                port: self.port,
                source,
            })?
            .collect::<Vec<_>>();
        if addrs.is_empty() {
            return Err(TransportError::Address {
                host: self.host.clone(),
                port: self.port,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "host resolved to no addresses",
                ),
            });
        }
        Ok(addrs)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Maps a logical resource to the port its service listens on.
///
/// Distinct resources on one host may live on distinct ports, so the port is
/// derived from the whole triple rather than being a single well-known value.
/// Implementations may perform network I/O; the result is used for the whole
/// life of a session.
pub trait EndpointResolver {
    fn resolve(&self, host: &str, service_path: &str, resource: &str) -> Result<u16>;
}

impl<F> EndpointResolver for F
where
    F: Fn(&str, &str, &str) -> Result<u16>,
{
    fn resolve(&self, host: &str, service_path: &str, resource: &str) -> Result<u16> {
        self(host, service_path, resource)
    }
}

/// Every resource is served on the same port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPort(pub u16);

impl EndpointResolver for FixedPort {
    fn resolve(&self, _host: &str, _service_path: &str, _resource: &str) -> Result<u16> {
        Ok(self.0)
    }
}

/// Explicit `(service_path, resource) → port` table.
#[derive(Debug, Clone, Default)]
pub struct PortMap {
    entries: HashMap<(String, String), u16>,
    fallback: Option<u16>,
}

impl PortMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the port serving `resource` under `service_path`.
    pub fn with_entry(
        mut self,
        service_path: impl Into<String>,
        resource: impl Into<String>,
        port: u16,
    ) -> Self {
        self.entries
            .insert((service_path.into(), resource.into()), port);
        self
    }

    /// Port used for resources without an explicit entry.
    pub fn with_fallback(mut self, port: u16) -> Self {
        self.fallback = Some(port);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl EndpointResolver for PortMap {
    fn resolve(&self, host: &str, service_path: &str, resource: &str) -> Result<u16> {
        self.entries
            .get(&(service_path.to_string(), resource.to_string()))
            .copied()
            .or(self.fallback)
            .ok_or_else(|| TransportError::Resolve {
                host: host.to_string(),
                service_path: service_path.to_string(),
                resource: resource.to_string(),
                reason: "no port registered".to_string(),
            })
    }
}

/// Resolve a logical target into a concrete endpoint.
pub fn resolve_endpoint<R: EndpointResolver + ?Sized>(
    resolver: &R,
    target: &ResourceTarget,
) -> Result<Endpoint> {
    let port = resolver.resolve(&target.host, &target.service_path, &target.resource)?;
    let endpoint = Endpoint::new(target.host.clone(), port, target.service_path.clone());
    debug!(resource = %target.resource, url = %endpoint.url(), "resolved endpoint");
    Ok(endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serial_target(port: &str) -> ResourceTarget {
        ResourceTarget::new("192.168.1.166", "serial", port)
    }

    #[test]
    fn url_format() {
        let endpoint = Endpoint::new("192.168.1.166", 9876, "serial");
        assert_eq!(endpoint.url(), "ws://192.168.1.166:9876/serial");
        assert_eq!(endpoint.to_string(), endpoint.url());
    }

    #[test]
    fn url_strips_leading_slash() {
        let endpoint = Endpoint::new("pi", 80, "/i2c");
        assert_eq!(endpoint.url(), "ws://pi:80/i2c");
    }

    #[test]
    fn fixed_port_ignores_resource() {
        let a = resolve_endpoint(&FixedPort(9876), &serial_target("/dev/ttyUSB0")).unwrap();
        let b = resolve_endpoint(&FixedPort(9876), &serial_target("/dev/ttyUSB1")).unwrap();
        assert_eq!(a.port, 9876);
        assert_eq!(a, b);
    }

    #[test]
    fn port_map_separates_resources() {
        let map = PortMap::new()
            .with_entry("serial", "/dev/ttyUSB0", 9001)
            .with_entry("serial", "/dev/ttyUSB1", 9002);
        assert_eq!(map.len(), 2);

        let a = resolve_endpoint(&map, &serial_target("/dev/ttyUSB0")).unwrap();
        let b = resolve_endpoint(&map, &serial_target("/dev/ttyUSB1")).unwrap();
        assert_eq!(a.port, 9001);
        assert_eq!(b.port, 9002);
        assert_eq!(a.service_path, "serial");
    }

    #[test]
    fn port_map_unknown_resource_fails() {
        let map = PortMap::new().with_entry("serial", "/dev/ttyUSB0", 9001);
        let err = resolve_endpoint(&map, &serial_target("/dev/ttyAMA0")).unwrap_err();
        assert!(matches!(err, TransportError::Resolve { .. }));
    }

    #[test]
    fn port_map_fallback() {
        let map = PortMap::new().with_fallback(9876);
        assert!(map.is_empty());
        let endpoint = resolve_endpoint(&map, &serial_target("/dev/ttyAMA0")).unwrap();
        assert_eq!(endpoint.port, 9876);
    }

    #[test]
    fn closure_resolver() {
        let resolver = |_: &str, path: &str, _: &str| -> Result<u16> {
            Ok(if path == "spi" { 9100 } else { 9200 })
        };
        let target = ResourceTarget::new("pi", "spi", "/dev/spidev0.0");
        assert_eq!(resolve_endpoint(&resolver, &target).unwrap().port, 9100);
    }

    #[test]
    fn socket_addrs_for_loopback() {
        let endpoint = Endpoint::new("127.0.0.1", 9876, "gpio");
        let addrs = endpoint.socket_addrs().unwrap();
        assert_eq!(addrs[0].port(), 9876);
    }
}
