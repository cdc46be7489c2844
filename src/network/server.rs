use crate::core::{Block, PeerChain, Transaction};
use crate::error::{LedgerError, Result};
use crate::ledger::{
    BlockVerdict, LedgerNode, MiningWork, ResolveOutcome, TransferReceipt, WalletSummary,
};
use crate::wallet::IssuedWallet;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Deserializer;
use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const TCP_READ_TIMEOUT: u64 = 60_000;
const TCP_WRITE_TIMEOUT: u64 = 5000;

/// One request per connection, answered by exactly one [`Response`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    Mine,
    MiningWork,
    NewTransaction {
        transaction: Transaction,
        signature: String,
    },
    Transfer {
        recipient_pid: String,
        amount: u64,
        sender: String,
        signature: Option<String>,
    },
    GetChain {
        addr_from: String,
    },
    RegisterPeers {
        nodes: Vec<String>,
    },
    Resolve,
    VerifyBlock {
        proof: u64,
        hash: String,
        forger: String,
    },
    IssueWallet {
        pid: String,
    },
    Lookup {
        pid: String,
    },
    Sign {
        pid: String,
        transaction: Transaction,
    },
    Verify {
        identity: String,
        transaction: Transaction,
        signature: String,
    },
    QueryWallet {
        identity: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Mined(Block),
    Work(MiningWork),
    Staged { block_index: u64 },
    Transferred(TransferReceipt),
    Chain(PeerChain),
    Peers { nodes: Vec<String> },
    Resolved(ResolveOutcome),
    Verdict(BlockVerdict),
    Issued(IssuedWallet),
    Identity { public_key: String },
    Signature { signature: String },
    Verified { valid: bool },
    Wallet(WalletSummary),
    Error(LedgerError),
}

impl Response {
    fn from_result<T>(result: Result<T>, wrap: impl FnOnce(T) -> Response) -> Response {
        match result {
            Ok(value) => wrap(value),
            Err(e) => Response::Error(e),
        }
    }
}

/// TCP front end for a [`LedgerNode`]; every connection is handled on its own thread
pub struct Server {
    node: Arc<LedgerNode>,
}

impl Server {
    pub fn new(node: Arc<LedgerNode>) -> Self {
        Self { node }
    }

    /// Binds the configured listen address and serves until shutdown
    pub fn run(&self) -> Result<()> {
        let addr = self.node.settings().node.listen_addr.clone();
        let listener = TcpListener::bind(&addr)
            .map_err(|e| LedgerError::Network(format!("Failed to bind to {addr}: {e}")))?;
        info!("Server listening on {addr}");
        self.serve(listener)
    }

    /// Accepts connections on an already bound listener
    pub fn serve(&self, listener: TcpListener) -> Result<()> {
        for stream in listener.incoming() {
            if self.node.is_shutting_down() {
                info!("Server shutting down");
                break;
            }
            match stream {
                Ok(stream) => {
                    let peer_addr = match stream.peer_addr() {
                        Ok(addr) => addr,
                        Err(e) => {
                            error!("Failed to get peer address: {e}");
                            continue;
                        }
                    };

                    let node = Arc::clone(&self.node);
                    thread::spawn(move || {
                        if let Err(e) = Self::handle_connection(&node, stream, peer_addr) {
                            error!("Error handling connection from {peer_addr}: {e}");
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {e}");
                }
            }
        }
        Ok(())
    }

    fn handle_connection(
        node: &LedgerNode,
        stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<()> {
        stream
            .set_read_timeout(Some(Duration::from_millis(TCP_READ_TIMEOUT)))
            .map_err(|e| LedgerError::Network(format!("Failed to set read timeout: {e}")))?;
        stream
            .set_write_timeout(Some(Duration::from_millis(TCP_WRITE_TIMEOUT)))
            .map_err(|e| LedgerError::Network(format!("Failed to set write timeout: {e}")))?;

        let reader = BufReader::new(&stream);
        let request = Deserializer::from_reader(reader)
            .into_iter::<Request>()
            .next()
            .ok_or_else(|| LedgerError::Network(format!("Empty request from {peer_addr}")))?
            .map_err(|e| LedgerError::Network(format!("Failed to deserialize request: {e}")))?;

        info!("Received request from {peer_addr}: {request:?}");
        let response = Self::process_request(node, request);
        if let Response::Error(e) = &response {
            warn!("Request from {peer_addr} failed: {e}");
        }

        let mut writer = &stream;
        serde_json::to_writer(&mut writer, &response)
            .map_err(|e| LedgerError::Network(format!("Failed to send response: {e}")))?;
        writer.flush()?;
        let _ = stream.shutdown(Shutdown::Both);
        Ok(())
    }

    /// Dispatches one request to the node. Failures become [`Response::Error`], never panics.
    pub fn process_request(node: &LedgerNode, request: Request) -> Response {
        match request {
            Request::Mine => Response::from_result(node.mine(), Response::Mined),
            Request::MiningWork => Response::from_result(node.mining_work(), Response::Work),
            Request::NewTransaction {
                transaction,
                signature,
            } => Response::from_result(
                node.new_transaction(transaction, &signature),
                |block_index| Response::Staged { block_index },
            ),
            Request::Transfer {
                recipient_pid,
                amount,
                sender,
                signature,
            } => Response::from_result(
                node.transfer(&recipient_pid, amount, &sender, signature.as_deref()),
                Response::Transferred,
            ),
            Request::GetChain { addr_from } => {
                info!("Serving chain to {addr_from}");
                Response::from_result(node.get_chain(), Response::Chain)
            }
            Request::RegisterPeers { nodes } => {
                Response::from_result(node.register_peers(&nodes), |nodes| {
                    Response::Peers { nodes }
                })
            }
            Request::Resolve => Response::from_result(node.resolve(), Response::Resolved),
            Request::VerifyBlock {
                proof,
                hash,
                forger,
            } => Response::from_result(
                node.verify_external_block(proof, &hash, &forger),
                Response::Verdict,
            ),
            Request::IssueWallet { pid } => {
                Response::from_result(node.issue_wallet(&pid), Response::Issued)
            }
            Request::Lookup { pid } => Response::from_result(node.lookup(&pid), |public_key| {
                Response::Identity { public_key }
            }),
            Request::Sign { pid, transaction } => {
                Response::from_result(node.sign(&pid, &transaction), |signature| {
                    Response::Signature { signature }
                })
            }
            Request::Verify {
                identity,
                transaction,
                signature,
            } => Response::from_result(
                node.verify(&identity, &transaction, &signature),
                |valid| Response::Verified { valid },
            ),
            Request::QueryWallet { identity } => {
                Response::from_result(node.query_wallet(&identity), Response::Wallet)
            }
        }
    }
}
