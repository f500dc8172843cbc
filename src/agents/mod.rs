//! The five analytical roles and the runner contract they share.

pub mod connector;
pub mod devils_advocate;
pub mod executor;
pub mod opportunist;
pub mod runner;
pub mod strategist;

pub use connector::Connector;
pub use devils_advocate::DevilsAdvocate;
pub use executor::Executor;
pub use opportunist::Opportunist;
pub use runner::{Agent, AgentContext, AgentRole, RunSummary};
pub use strategist::Strategist;
