pub mod account; // seed-derived accounts and the encrypted wallet record
pub mod amount;
pub mod block;
pub mod bns; // Banano Name System resolver
pub mod cli;
pub mod client; // RPC client with endpoint failover
pub mod config;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod orchestrator;
pub mod permissions;
pub mod storage;
