use crate::core::{ChainSource, PeerChain};
use crate::error::{LedgerError, Result};
use crate::network::{Request, Response};
use log::debug;
use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Sends one request to `addr` and waits at most `timeout` for connect, write and reply each
pub fn send_request(addr: &str, request: &Request, timeout: Duration) -> Result<Response> {
    let socket_addr = resolve_addr(addr)?;
    debug!("Sending request to {socket_addr}: {request:?}");

    let mut stream = TcpStream::connect_timeout(&socket_addr, timeout)
        .map_err(|e| LedgerError::Network(format!("Failed to connect to {addr}: {e}")))?;
    stream
        .set_write_timeout(Some(timeout))
        .map_err(|e| LedgerError::Network(format!("Failed to set write timeout: {e}")))?;
    stream
        .set_read_timeout(Some(timeout))
        .map_err(|e| LedgerError::Network(format!("Failed to set read timeout: {e}")))?;

    serde_json::to_writer(&stream, request)
        .map_err(|e| LedgerError::Network(format!("Failed to send request: {e}")))?;
    stream.flush()?;
    let _ = stream.shutdown(Shutdown::Write);

    serde_json::from_reader(BufReader::new(&stream))
        .map_err(|e| LedgerError::Network(format!("Failed to read response from {addr}: {e}")))
}

fn resolve_addr(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(|e| LedgerError::Network(format!("Failed to parse address {addr}: {e}")))?
        .next()
        .ok_or_else(|| LedgerError::Network(format!("No address found for {addr}")))
}

/// Fetches peer chains over the node's TCP protocol
pub struct TcpChainSource {
    addr_from: String,
}

impl TcpChainSource {
    pub fn new(addr_from: String) -> TcpChainSource {
        TcpChainSource { addr_from }
    }
}

impl ChainSource for TcpChainSource {
    fn fetch_chain(&self, peer: &str, timeout: Duration) -> Result<PeerChain> {
        let unreachable = |reason: String| LedgerError::PeerUnreachable {
            peer: peer.to_string(),
            reason,
        };

        let request = Request::GetChain {
            addr_from: self.addr_from.clone(),
        };
        match send_request(peer, &request, timeout).map_err(|e| unreachable(e.to_string()))? {
            Response::Chain(chain) => Ok(chain),
            Response::Error(e) => Err(unreachable(e.to_string())),
            other => Err(unreachable(format!("unexpected response {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_fetch_from_closed_port_is_unreachable() {
        // Bind then drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let source = TcpChainSource::new("127.0.0.1:2001".to_string());
        let err = source
            .fetch_chain(&format!("127.0.0.1:{port}"), Duration::from_millis(200))
            .unwrap_err();
        assert!(matches!(err, LedgerError::PeerUnreachable { .. }));
    }

    #[test]
    fn test_resolve_addr_rejects_garbage() {
        assert!(matches!(
            resolve_addr("not an address"),
            Err(LedgerError::Network(_))
        ));
    }
}
