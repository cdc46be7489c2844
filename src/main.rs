// Entry point: `startnode` runs a node in this process, every other command
// talks to a running node over its TCP protocol.
use clap::Parser;
use ledger_node::{
    send_request, spawn_miner, spawn_resolver, Command, LedgerError, LedgerNode, Opt, Request,
    Response, Server, Settings,
};
use log::{error, info, LevelFilter};
use std::process;
use std::sync::Arc;
use std::time::Duration;

// Generous: `mine` waits for a full nonce search
const CLIENT_TIMEOUT: Duration = Duration::from_secs(300);

fn main() {
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();
    if let Err(e) = run(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = Settings::load(opt.config.as_deref())?;
    let target = opt
        .node
        .clone()
        .unwrap_or_else(|| settings.node.listen_addr.clone());

    match opt.command {
        Command::StartNode { miner, mine } => {
            if let Some(identity) = miner {
                settings.node.miner_identity = Some(identity);
            }
            settings.mining.background |= mine;
            start_node(settings)?;
        }
        Command::IssueWallet { pid } => {
            if let Response::Issued(wallet) = call(&target, Request::IssueWallet { pid })? {
                println!("Public key:  {}", wallet.public_key);
                println!("Private key: {}", wallet.private_key);
                println!("Keep the private key safe; it is shown only once.");
            }
        }
        Command::Lookup { pid } => {
            if let Response::Identity { public_key } = call(&target, Request::Lookup { pid })? {
                println!("{public_key}");
            }
        }
        Command::Balance { identity } => {
            if let Response::Wallet(summary) = call(&target, Request::QueryWallet { identity })? {
                println!("Balance of {}: {}", summary.identity, summary.balance);
                for tx in summary.transactions {
                    println!(
                        "- {} -> {}: {}",
                        tx.get_sender(),
                        tx.get_recipient(),
                        tx.get_amount()
                    );
                }
            }
        }
        Command::Mine => {
            if let Response::Mined(block) = call(&target, Request::Mine)? {
                println!("New block {} forged by {}", block.get_index(), block.get_forger());
                println!("Proof: {}", block.get_proof());
                println!("Previous hash: {}", block.get_previous_hash());
            }
        }
        Command::Printchain => {
            let request = Request::GetChain {
                addr_from: settings.node.listen_addr.clone(),
            };
            if let Response::Chain(peer_chain) = call(&target, request)? {
                for block in peer_chain.chain {
                    println!("Block {} at {}", block.get_index(), block.get_timestamp());
                    println!("Previous hash: {}", block.get_previous_hash());
                    println!("Proof: {} ({})", block.get_proof(), block.get_hash_of_block());
                    println!("Forger: {}", block.get_forger());
                    for tx in block.get_transactions() {
                        println!(
                            "- {} -> {}: {}",
                            tx.get_sender(),
                            tx.get_recipient(),
                            tx.get_amount()
                        );
                    }
                    println!()
                }
            }
        }
        Command::Send {
            from,
            to,
            amount,
            signature,
        } => {
            let request = Request::Transfer {
                recipient_pid: to,
                amount,
                sender: from,
                signature,
            };
            if let Response::Transferred(receipt) = call(&target, request)? {
                println!("Transaction will be added to block {}", receipt.block_index);
                println!("Signature: {}", receipt.signature);
            }
        }
        Command::RegisterPeers { nodes } => {
            if let Response::Peers { nodes } = call(&target, Request::RegisterPeers { nodes })? {
                println!("Known peers:");
                for node in nodes {
                    println!("  {node}");
                }
            }
        }
        Command::Resolve => {
            if let Response::Resolved(outcome) = call(&target, Request::Resolve)? {
                if outcome.replaced {
                    println!("Our chain was replaced ({} blocks)", outcome.chain.len());
                } else {
                    println!("Our chain is authoritative ({} blocks)", outcome.chain.len());
                }
            }
        }
    }
    Ok(())
}

fn start_node(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let background = settings.mining.background;
    let resolve_interval = settings.consensus.resolve_interval_secs;

    let node = Arc::new(LedgerNode::open(settings)?);
    info!("Node identity: {}", node.identity());

    if background {
        spawn_miner(Arc::clone(&node));
    }
    if let Some(secs) = resolve_interval {
        spawn_resolver(Arc::clone(&node), Duration::from_secs(secs));
    }

    Server::new(node).run()?;
    Ok(())
}

fn call(addr: &str, request: Request) -> Result<Response, LedgerError> {
    match send_request(addr, &request, CLIENT_TIMEOUT)? {
        Response::Error(e) => Err(e),
        response => Ok(response),
    }
}
