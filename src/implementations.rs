pub mod connection;
pub mod dispatch;
pub mod environment;
pub mod evm;
pub mod registry;
pub mod rpc;
pub mod solana;
pub mod strategy;
