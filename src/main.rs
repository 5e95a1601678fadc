// Entry point for the fastchain CLI: `startnode` runs a node in-process,
// every other command is a request sent to a running node over TCP
use clap::Parser;
use fastchain::core::monetary::conversions::format_units;
use fastchain::{send_request, Command, MinerNode, Opt, Package, Server, GLOBAL_CONFIG};
use log::{error, info, LevelFilter};
use std::process;

fn main() {
    // Info by default, RUST_LOG still wins
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = GLOBAL_CONFIG.clone();
    if let Some(node) = opt.node {
        config.set_node_addr(node);
    }
    let node_addr = config.get_node_addr().to_string();

    match opt.command {
        Command::StartNode { miner } => {
            if let Some(addr) = miner {
                println!("Mining is on. Address to receive rewards: {addr}");
                config.set_mining_addr(addr);
            }
            let node = MinerNode::from_config(&config)?;
            info!(
                "Starting node on {node_addr} (difficulty {}, reward {})",
                config.get_difficulty()?,
                format_units(config.get_mining_reward())
            );
            let server = Server::new(node).with_default_miner(config.get_mining_addr());
            server
                .run(&node_addr)
                .map_err(|e| format!("Server error: {e}"))?
        }
        Command::Send { from, to, amount } => {
            let reply = send_request(
                &node_addr,
                &Package::AddTransaction {
                    sender: from,
                    receiver: to,
                    amount: amount.0,
                },
            )?;
            match reply {
                Package::Accepted { block_index } => {
                    println!("Transaction will be added to block {block_index}")
                }
                other => return Err(unexpected(other)),
            }
        }
        Command::Fund { address, amount } => {
            let reply = send_request(
                &node_addr,
                &Package::AddBalance {
                    receiver: address,
                    amount: amount.0,
                },
            )?;
            match reply {
                Package::Balances { credits } => {
                    for (address, amount) in credits {
                        println!("Credited {address}: {}", format_units(amount));
                    }
                }
                other => return Err(unexpected(other)),
            }
        }
        Command::GetBalance { address } => {
            match send_request(&node_addr, &Package::GetBalance { address })? {
                Package::Balance { address, amount } => {
                    println!("Balance of {address}: {}", format_units(amount))
                }
                other => return Err(unexpected(other)),
            }
        }
        Command::Pending => match send_request(&node_addr, &Package::GetPending)? {
            Package::Pending { transactions } => {
                if transactions.is_empty() {
                    println!("No pending transactions");
                }
                for tx in transactions {
                    println!(
                        "{} -> {}: {}",
                        tx.get_sender(),
                        tx.get_receiver(),
                        format_units(tx.get_amount())
                    );
                }
            }
            other => return Err(unexpected(other)),
        },
        Command::Printchain => match send_request(&node_addr, &Package::GetChain)? {
            Package::Chain { chain } => {
                for block in chain {
                    println!("Block {}", block.get_index());
                    println!("Pre block hash: {}", block.get_previous_hash());
                    println!("Cur block hash: {}", block.get_hash());
                    println!("Merkle root: {}", block.get_merkle_root());
                    println!("Timestamp: {}", block.get_timestamp());
                    println!("Nonce: {}", block.get_nonce());
                    for (address, amount) in block.get_balances().credits() {
                        println!("-- Credit {address}: {}", format_units(amount));
                    }
                    for tx in block.get_transactions() {
                        println!(
                            "-- Transfer {} -> {}: {}",
                            tx.get_sender(),
                            tx.get_receiver(),
                            format_units(tx.get_amount())
                        );
                    }
                    println!()
                }
            }
            other => return Err(unexpected(other)),
        },
        Command::Validate => match send_request(&node_addr, &Package::IsValid)? {
            Package::Valid { valid: true, .. } => println!("Chain is valid"),
            Package::Valid {
                first_invalid: Some(position),
                ..
            } => println!("Chain is invalid at block position {position}"),
            Package::Valid { .. } => println!("Chain is invalid"),
            other => return Err(unexpected(other)),
        },
        Command::Mine { miner } => {
            // An empty miner lets the node fall back to its own reward address
            let miner = miner
                .or_else(|| config.get_mining_addr().map(str::to_string))
                .unwrap_or_default();
            match send_request(&node_addr, &Package::Mine { miner })? {
                Package::Mined { block } => println!(
                    "Mined block {} with {} transactions: {}",
                    block.get_index(),
                    block.get_transactions().len(),
                    block.get_hash()
                ),
                other => return Err(unexpected(other)),
            }
        }
    }
    Ok(())
}

fn unexpected(reply: Package) -> Box<dyn std::error::Error> {
    match reply {
        Package::Rejected { reason } => reason.into(),
        other => format!("Unexpected reply from node: {other:?}").into(),
    }
}
