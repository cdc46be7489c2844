use crate::error::{LedgerError, Result};
use std::sync::RwLock;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    addr: String,
}

impl Node {
    /// Accepts `host:port` or a URL such as `http://host:port/`; keeps only `host:port`
    pub fn parse(raw: &str) -> Result<Node> {
        let trimmed = raw.trim();
        let without_scheme = match trimmed.split_once("://") {
            Some((_, rest)) => rest,
            None => trimmed,
        };
        let addr = without_scheme
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string();
        if addr.is_empty() {
            return Err(LedgerError::Network(format!("Invalid peer address: {raw:?}")));
        }
        Ok(Node { addr })
    }

    pub fn get_addr(&self) -> String {
        self.addr.clone()
    }
}

/// Registered peers. Set semantics: re-registering an address is a no-op.
pub struct Nodes {
    inner: RwLock<Vec<Node>>,
}

impl Default for Nodes {
    fn default() -> Self {
        Self::new()
    }
}

impl Nodes {
    pub fn new() -> Nodes {
        Nodes {
            inner: RwLock::new(vec![]),
        }
    }

    /// Registers every address; returns how many were new
    pub fn register(&self, addrs: &[String]) -> Result<usize> {
        let parsed = addrs
            .iter()
            .map(|addr| Node::parse(addr))
            .collect::<Result<Vec<_>>>()?;

        let mut inner = self
            .inner
            .write()
            .map_err(|e| LedgerError::Lock(format!("peer registry: {e}")))?;
        let mut added = 0;
        for node in parsed {
            if !inner.contains(&node) {
                inner.push(node);
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn get_addrs(&self) -> Result<Vec<String>> {
        let inner = self
            .inner
            .read()
            .map_err(|e| LedgerError::Lock(format!("peer registry: {e}")))?;
        Ok(inner.iter().map(Node::get_addr).collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.get_addrs()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
