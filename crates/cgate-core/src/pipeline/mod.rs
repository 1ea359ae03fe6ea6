pub mod abi;
pub mod compile;
pub mod config;
pub mod optimize;
pub mod orchestrator;
pub mod stage;
