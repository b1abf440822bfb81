//! # MQTT Integration Module
//!
//! Everything the agent needs to talk to its broker: the `[broker]` config
//! section, topic construction and the session that owns the `rumqttc` client.
//!
//! ```text
//! mqtt/
//! ├── config.rs   - Broker endpoint and client parameters
//! ├── message.rs  - Topic layout
//! └── session.rs  - BrokerSession trait and the rumqttc backed session
//! ```
//!
//! Publishing is QoS 0 without retain. The session never reconnects by itself;
//! connection status only flows back through the network event queue.

pub mod config;
pub mod message;
pub mod session;

pub use config::{ClientConfig, MqttConfig};
pub use message::Topic;
pub use session::{BrokerSession, ConnectStatus, ConnectionState, MqttSession};
