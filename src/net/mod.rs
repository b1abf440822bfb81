//! Network side of the agent
//!
//! 1. [`link`] - Startup check of the network interface
//! 2. [`resolver`] - Broker host name lookup
//! 3. [`orchestrator`] - Lookup → connect sequence and connection state
//! 4. [`events`] - Queue carrying lookup and broker completions to the poll loop
//!
//! Background tasks (DNS lookup, MQTT event loop) never touch agent state
//! directly. They push [`events::NetEvent`]s which the poll loop drains once
//! per tick.

pub mod events;
pub mod link;
pub mod orchestrator;
pub mod resolver;

pub use events::{EventQueue, NetEvent};
pub use orchestrator::Orchestrator;
pub use resolver::{DnsResolver, NameResolver, ResolveError};
