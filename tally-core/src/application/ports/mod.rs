pub mod gateway;

pub use gateway::ReasoningGateway;
