// Library root. Exposes the agents, renderers and channels to the binary
// in src/main.rs and to the integration tests.

pub mod agents;
pub mod chart;
pub mod comms;
pub mod config;
pub mod dataset;
pub mod error;
pub mod llm;
pub mod logger;
pub mod report;
pub mod storage;
