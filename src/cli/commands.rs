use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ledger-node")]
pub struct Opt {
    #[arg(long, global = true, help = "Path to a TOML settings file")]
    pub config: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        help = "Address of the running node to talk to (defaults to the configured listen address)"
    )]
    pub node: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "startnode", about = "Start a ledger node")]
    StartNode {
        #[arg(long, help = "Identity credited with local mining rewards")]
        miner: Option<String>,
        #[arg(long, help = "Run the background miner")]
        mine: bool,
    },
    #[command(name = "issuewallet", about = "Issue a keypair for a pid")]
    IssueWallet {
        #[arg(help = "Participant id")]
        pid: String,
    },
    #[command(name = "lookup", about = "Print the identity bound to a pid")]
    Lookup {
        #[arg(help = "Participant id")]
        pid: String,
    },
    #[command(name = "balance", about = "Show balance and history of an identity")]
    Balance {
        #[arg(help = "Identity (hex public key)")]
        identity: String,
    },
    #[command(name = "mine", about = "Mine one block on the node")]
    Mine,
    #[command(name = "printchain", about = "Print all blocks in the chain")]
    Printchain,
    #[command(name = "send", about = "Transfer funds to a registered pid")]
    Send {
        #[arg(help = "Sender identity")]
        from: String,
        #[arg(help = "Recipient pid")]
        to: String,
        #[arg(help = "Amount to send")]
        amount: u64,
        #[arg(long, help = "Pre-computed hex signature; the node signs when omitted")]
        signature: Option<String>,
    },
    #[command(name = "registerpeers", about = "Register peer node addresses")]
    RegisterPeers {
        #[arg(required = true, help = "Peer addresses, host:port or URLs")]
        nodes: Vec<String>,
    },
    #[command(name = "resolve", about = "Adopt the longest valid chain among peers")]
    Resolve,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send() {
        let opt = Opt::parse_from(["ledger-node", "send", "abc", "bob", "3"]);
        match opt.command {
            Command::Send {
                from,
                to,
                amount,
                signature,
            } => {
                assert_eq!(from, "abc");
                assert_eq!(to, "bob");
                assert_eq!(amount, 3);
                assert!(signature.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_global_node_flag() {
        let opt = Opt::parse_from(["ledger-node", "--node", "127.0.0.1:3000", "resolve"]);
        assert_eq!(opt.node.as_deref(), Some("127.0.0.1:3000"));
        assert!(matches!(opt.command, Command::Resolve));
    }

    #[test]
    fn test_registerpeers_requires_nodes() {
        assert!(Opt::try_parse_from(["ledger-node", "registerpeers"]).is_err());
    }
}
