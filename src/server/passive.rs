//! Binding a listening socket for `PASV`, optionally scanning a configured
//! port range instead of letting the OS pick.
//!
//! Mirrors the registry-of-reserved-ports idea a `DashMap`-backed switchboard
//! would give you, but a passive listener doesn't need cross-task lookup the
//! way a live data connection does: binding the socket *is* the reservation,
//! so a plain randomized-retry loop over the configured range is enough.

use std::net::{IpAddr, SocketAddr};
use std::ops::Range;
use tokio::net::TcpListener;

/// Binds a listener for a `PASV` data connection.
///
/// If `range` is `Some`, ports are tried in random order within it so that
/// concurrent sessions don't pile up on the low end of the range; `None`
/// binds port 0 and lets the OS assign an ephemeral port.
pub async fn bind(local_ip: IpAddr, range: Option<Range<u16>>) -> std::io::Result<TcpListener> {
    match range {
        None => TcpListener::bind(SocketAddr::new(local_ip, 0)).await,
        Some(range) => bind_in_range(local_ip, range).await,
    }
}

async fn bind_in_range(local_ip: IpAddr, range: Range<u16>) -> std::io::Result<TcpListener> {
    if range.is_empty() {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty passive port range"));
    }

    let ports = shuffled(range.clone());
    let mut last_err = None;
    for port in ports {
        match TcpListener::bind(SocketAddr::new(local_ip, port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "passive port range exhausted")))
}

/// A Fisher-Yates shuffle of `range`, seeded from the OS RNG, so repeated
/// `PASV` calls don't favor the low end of a configured range.
fn shuffled(range: Range<u16>) -> Vec<u16> {
    let mut ports: Vec<u16> = range.collect();
    let mut seed_bytes = [0u8; 8];
    let _ = getrandom::fill(&mut seed_bytes);
    let mut state = u64::from_le_bytes(seed_bytes) | 1;

    let mut next_rand = move || {
        // xorshift64star: small, dependency-free, good enough to avoid
        // hammering the same low ports every call.
        state ^= state >> 12;
        state ^= state << 25;
        state ^= state >> 27;
        state.wrapping_mul(0x2545_f491_4f6c_dd1d)
    };

    for i in (1..ports.len()).rev() {
        let j = (next_rand() as usize) % (i + 1);
        ports.swap(i, j);
    }
    ports
}

/// Encodes a socket address as the `h1,h2,h3,h4,p1,p2` tuple `PASV`'s 227
/// reply uses. Only IPv4 is representable in this form.
pub fn encode_pasv_address(addr: SocketAddr) -> Option<String> {
    let SocketAddr::V4(addr) = addr else { return None };
    let octets = addr.ip().octets();
    let port = addr.port();
    Some(format!("{},{},{},{},{},{}", octets[0], octets[1], octets[2], octets[3], port >> 8, port & 0xff))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn encodes_ipv4_pasv_tuple() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 2)), 0x1234);
        assert_eq!(encode_pasv_address(addr).unwrap(), "192,168,1,2,18,52");
    }

    #[test]
    fn shuffled_contains_every_port_exactly_once() {
        let mut ports = shuffled(5000..5010);
        ports.sort_unstable();
        assert_eq!(ports, (5000..5010).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn binds_within_configured_range() {
        let listener = bind(IpAddr::V4(Ipv4Addr::LOCALHOST), Some(40000..40010)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!((40000..40010).contains(&port));
    }
}
