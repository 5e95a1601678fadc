use crate::core::{Amount, Block, Transaction};
use crate::error::{LedgerError, Result};
use crate::node::{MinerNode, NodeEvent};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Deserializer;
use std::collections::{BTreeMap, HashMap};
use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;
use uuid::Uuid;

const TCP_WRITE_TIMEOUT: u64 = 5000;
const TCP_READ_TIMEOUT: u64 = 60;

/// Messages exchanged between clients, miners and the node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Package {
    AddTransaction {
        sender: String,
        receiver: String,
        amount: Amount,
    },
    AddBalance {
        receiver: String,
        amount: Amount,
    },
    GetBalance {
        address: String,
    },
    GetPending,
    GetChain,
    IsValid,
    Mine {
        miner: String,
    },
    /// Register this connection for `NewBlock`/`ChainUpdate` pushes
    Subscribe,
    /// A sealed block, bincode-encoded
    NewBlock {
        block: Vec<u8>,
    },
    ChainUpdate {
        chain: Vec<Block>,
    },

    Accepted {
        block_index: usize,
    },
    Rejected {
        reason: String,
    },
    Subscribed {
        session: Uuid,
    },
    Balance {
        address: String,
        amount: Amount,
    },
    Balances {
        credits: BTreeMap<String, Amount>,
    },
    Pending {
        transactions: Vec<Transaction>,
    },
    Chain {
        chain: Vec<Block>,
    },
    Valid {
        valid: bool,
        first_invalid: Option<usize>,
    },
    Mined {
        block: Block,
    },
}

impl Package {
    fn rejected(err: &LedgerError) -> Package {
        Package::Rejected {
            reason: err.to_string(),
        }
    }

    fn new_block(block: &Block) -> Result<Package> {
        Ok(Package::NewBlock {
            block: block.serialize()?,
        })
    }
}

type Writer = Arc<Mutex<TcpStream>>;
type Sessions = Arc<RwLock<HashMap<Uuid, Writer>>>;

/// TCP front end for a `MinerNode`
pub struct Server {
    node: MinerNode,
    // Subscribed connections, keyed by session id
    sessions: Sessions,
    // Rewarded when a Mine request names no miner
    default_miner: Option<String>,
}

impl Server {
    pub fn new(node: MinerNode) -> Self {
        Server {
            node,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            default_miner: None,
        }
    }

    pub fn with_default_miner(mut self, miner: Option<&str>) -> Self {
        self.default_miner = miner.map(str::to_string);
        self
    }

    pub fn get_node(&self) -> &MinerNode {
        &self.node
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    /// Bind `addr` and serve until the listener fails
    pub fn run(&self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| LedgerError::Network(format!("Failed to bind to {addr}: {e}")))?;
        info!("Server listening on {addr}");
        self.serve(listener)
    }

    pub fn serve(&self, listener: TcpListener) -> Result<()> {
        self.start_broadcaster()?;

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let peer_addr = match stream.peer_addr() {
                        Ok(addr) => addr,
                        Err(e) => {
                            error!("Failed to get peer address: {e}");
                            continue;
                        }
                    };

                    let node = self.node.clone();
                    let sessions = Arc::clone(&self.sessions);
                    let default_miner = self.default_miner.clone();
                    thread::spawn(move || {
                        let result = Self::handle_connection(
                            node,
                            sessions,
                            default_miner.as_deref(),
                            stream,
                            peer_addr,
                        );
                        if let Err(e) = result {
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

    // Forward committed node events to every subscribed session
    fn start_broadcaster(&self) -> Result<()> {
        let events = self.node.subscribe()?;
        let sessions = Arc::clone(&self.sessions);

        thread::spawn(move || {
            for event in events {
                let pkg = match &event {
                    NodeEvent::NewBlock(block) => match Package::new_block(block) {
                        Ok(pkg) => pkg,
                        Err(e) => {
                            error!("Failed to encode block for broadcast: {e}");
                            continue;
                        }
                    },
                    NodeEvent::ChainReplaced(chain) => Package::ChainUpdate {
                        chain: chain.clone(),
                    },
                };
                Self::broadcast(&sessions, &pkg);
            }
        });
        Ok(())
    }

    fn broadcast(sessions: &Sessions, pkg: &Package) {
        let targets: Vec<(Uuid, Writer)> = match sessions.read() {
            Ok(sessions) => sessions
                .iter()
                .map(|(id, writer)| (*id, Arc::clone(writer)))
                .collect(),
            Err(e) => {
                error!("Session registry lock poisoned: {e}");
                return;
            }
        };

        let mut dead = Vec::new();
        for (id, writer) in targets {
            if let Err(e) = write_package(&writer, pkg) {
                warn!("Dropping session {id}: {e}");
                dead.push(id);
            }
        }

        if !dead.is_empty() {
            if let Ok(mut sessions) = sessions.write() {
                for id in dead {
                    sessions.remove(&id);
                }
            }
        }
    }

    fn handle_connection(
        node: MinerNode,
        sessions: Sessions,
        default_miner: Option<&str>,
        stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<()> {
        stream
            .set_read_timeout(Some(Duration::from_secs(TCP_READ_TIMEOUT)))
            .map_err(|e| LedgerError::Network(format!("Failed to set read timeout: {e}")))?;
        let writer: Writer = Arc::new(Mutex::new(stream.try_clone()?));
        let mut session: Option<Uuid> = None;

        let reader = BufReader::new(&stream);
        let pkg_reader = Deserializer::from_reader(reader).into_iter::<Package>();

        for pkg in pkg_reader {
            let pkg = match pkg {
                Ok(pkg) => pkg,
                Err(e) => {
                    warn!("Failed to deserialize package from {peer_addr}: {e}");
                    break;
                }
            };

            info!("Received request from {peer_addr}: {pkg:?}");

            let response = match pkg {
                Package::Subscribe => {
                    let id = *session.get_or_insert_with(Uuid::new_v4);
                    // Subscribers may stay quiet for a long time
                    stream.set_read_timeout(None)?;
                    sessions
                        .write()
                        .map_err(|e| LedgerError::Lock(format!("Session registry: {e}")))?
                        .insert(id, Arc::clone(&writer));
                    info!("Registered session {id} for {peer_addr}");
                    Package::Subscribed { session: id }
                }
                other => Self::process_message(&node, default_miner, other),
            };

            if let Err(e) = write_package(&writer, &response) {
                error!("Failed to reply to {peer_addr}: {e}");
                break;
            }
        }

        if let Some(id) = session {
            if let Ok(mut sessions) = sessions.write() {
                sessions.remove(&id);
            }
            info!("Session {id} closed");
        }
        let _ = stream.shutdown(Shutdown::Both);
        Ok(())
    }

    /// Apply one request to the node and build the reply
    fn process_message(node: &MinerNode, default_miner: Option<&str>, pkg: Package) -> Package {
        let result = match pkg {
            Package::AddTransaction {
                sender,
                receiver,
                amount,
            } => node
                .add_transaction(&sender, &receiver, amount)
                .map(|block_index| Package::Accepted { block_index }),
            Package::AddBalance { receiver, amount } => node
                .add_balance(&receiver, amount)
                .map(|credits| Package::Balances { credits }),
            Package::GetBalance { address } => node
                .get_balance(&address)
                .map(|amount| Package::Balance { address, amount }),
            Package::GetPending => node
                .get_pending_transactions()
                .map(|transactions| Package::Pending { transactions }),
            Package::GetChain => node.get_chain().map(|chain| Package::Chain { chain }),
            Package::IsValid => node.first_invalid_block().map(|first_invalid| Package::Valid {
                valid: first_invalid.is_none(),
                first_invalid,
            }),
            Package::Mine { miner } => {
                let miner = match default_miner {
                    Some(default) if miner.is_empty() => default,
                    _ => miner.as_str(),
                };
                node.mine(miner).map(|block| Package::Mined { block })
            }
            Package::NewBlock { block } => Self::handle_new_block(node, &block),
            Package::ChainUpdate { chain } => Self::handle_chain_update(node, chain),
            other => Err(LedgerError::Rejected(format!(
                "Unexpected package {other:?}"
            ))),
        };

        result.unwrap_or_else(|e| {
            warn!("Request rejected: {e}");
            Package::rejected(&e)
        })
    }

    fn handle_new_block(node: &MinerNode, data: &[u8]) -> Result<Package> {
        let block = Block::deserialize(data)
            .map_err(|e| LedgerError::Network(format!("Failed to deserialize block: {e}")))?;
        let index = block.get_index() as usize;
        if node.accept_block(block)? {
            Ok(Package::Accepted { block_index: index })
        } else {
            Err(LedgerError::InvalidBlock(format!(
                "Block {index} does not extend the local chain"
            )))
        }
    }

    fn handle_chain_update(node: &MinerNode, chain: Vec<Block>) -> Result<Package> {
        let length = chain.len();
        if node.resolve_conflicts(chain)? {
            Ok(Package::Accepted {
                block_index: length,
            })
        } else {
            Err(LedgerError::Rejected(format!(
                "Chain of length {length} was not adopted"
            )))
        }
    }
}

fn write_package(writer: &Writer, pkg: &Package) -> Result<()> {
    let mut stream = writer
        .lock()
        .map_err(|e| LedgerError::Lock(format!("Connection writer: {e}")))?;
    serde_json::to_writer(&*stream, pkg)
        .map_err(|e| LedgerError::Network(format!("Failed to send data: {e}")))?;
    stream.flush()?;
    Ok(())
}

/// Send one request and wait for the node's reply
pub fn send_request(addr: &str, pkg: &Package) -> Result<Package> {
    let socket_addr = addr
        .parse::<SocketAddr>()
        .map_err(|e| LedgerError::Network(format!("Invalid address {addr}: {e}")))?;

    let stream = TcpStream::connect_timeout(&socket_addr, Duration::from_millis(TCP_WRITE_TIMEOUT))
        .map_err(|e| LedgerError::Network(format!("Failed to connect to {addr}: {e}")))?;
    stream
        .set_write_timeout(Some(Duration::from_millis(TCP_WRITE_TIMEOUT)))
        .map_err(|e| LedgerError::Network(format!("Failed to set write timeout: {e}")))?;

    serde_json::to_writer(&stream, pkg)
        .map_err(|e| LedgerError::Network(format!("Failed to send data: {e}")))?;
    // Tell the node this was the only request
    stream.shutdown(Shutdown::Write)?;

    let reader = BufReader::new(&stream);
    match Deserializer::from_reader(reader).into_iter::<Package>().next() {
        Some(Ok(response)) => Ok(response),
        Some(Err(e)) => Err(LedgerError::Network(format!(
            "Failed to deserialize reply from {addr}: {e}"
        ))),
        None => Err(LedgerError::Network(format!(
            "Connection to {addr} closed without a reply"
        ))),
    }
}
