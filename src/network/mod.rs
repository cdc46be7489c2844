//! Node-to-node and client-to-node networking
//!
//! A small TCP protocol: one JSON [`Request`] per connection, one JSON [`Response`] back.
//! Peers use it to fetch each other's chains during resolution.

pub mod client;
pub mod node;
pub mod server;

pub use client::{send_request, TcpChainSource};
pub use node::{Node, Nodes};
pub use server::{Request, Response, Server};
