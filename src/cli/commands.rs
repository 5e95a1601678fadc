use crate::core::monetary::conversions::parse_coins;
use crate::core::Amount;
use clap::{Parser, Subcommand};
use std::str::FromStr;

/// Decimal coin amount given on the command line, held in base units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinAmountArg(pub Amount);

impl FromStr for CoinAmountArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_coins(s)
            .map(CoinAmountArg)
            .map_err(|e| format!("Invalid amount: {s}. {e}"))
    }
}

#[derive(Debug, Parser)]
#[command(name = "fastchain")]
pub struct Opt {
    #[arg(
        long,
        global = true,
        help = "Node address to talk to (defaults to FASTCHAIN_NODE_ADDRESS)"
    )]
    pub node: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "startnode", about = "Start a ledger node")]
    StartNode {
        #[arg(help = "Default miner address for mining requests")]
        miner: Option<String>,
    },
    #[command(name = "send", about = "Submit a transfer to the pending pool")]
    Send {
        #[arg(help = "Sender address")]
        from: String,
        #[arg(help = "Receiver address")]
        to: String,
        #[arg(help = "Amount to send, in coins (e.g. 2.5)")]
        amount: CoinAmountArg,
    },
    #[command(name = "fund", about = "Credit an address in a new block")]
    Fund {
        #[arg(help = "Address to credit")]
        address: String,
        #[arg(help = "Amount to credit, in coins")]
        amount: CoinAmountArg,
    },
    #[command(name = "getbalance", about = "Get the spendable balance of an address")]
    GetBalance {
        #[arg(help = "The address")]
        address: String,
    },
    #[command(name = "pending", about = "List transactions waiting to be mined")]
    Pending,
    #[command(name = "printchain", about = "Print all blocks in the chain")]
    Printchain,
    #[command(name = "validate", about = "Check the node's chain")]
    Validate,
    #[command(name = "mine", about = "Mine the pending transactions")]
    Mine {
        #[arg(help = "Address that receives the mining reward")]
        miner: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::UNITS_PER_COIN;

    #[test]
    fn test_parse_send() {
        let opt = Opt::try_parse_from(["fastchain", "send", "alice", "bob", "2.5"]).unwrap();
        match opt.command {
            Command::Send { from, to, amount } => {
                assert_eq!(from, "alice");
                assert_eq!(to, "bob");
                assert_eq!(amount, CoinAmountArg(250_000_000));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(opt.node.is_none());
    }

    #[test]
    fn test_parse_global_node_flag() {
        let opt =
            Opt::try_parse_from(["fastchain", "getbalance", "alice", "--node", "127.0.0.1:3000"])
                .unwrap();
        assert_eq!(opt.node.as_deref(), Some("127.0.0.1:3000"));
    }

    #[test]
    fn test_invalid_amount_is_refused() {
        assert!(Opt::try_parse_from(["fastchain", "fund", "alice", "0"]).is_err());
        assert!(Opt::try_parse_from(["fastchain", "fund", "alice", "-1"]).is_err());
        assert_eq!(
            "3".parse::<CoinAmountArg>().unwrap(),
            CoinAmountArg(3 * UNITS_PER_COIN)
        );
    }
}
