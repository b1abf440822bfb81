use std::net::IpAddr;

use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS,
};
use tracing::{debug, error, info, warn};

use super::config::ClientConfig;
use crate::net::events::{EventSender, NetEvent};

/// Request buffer between the client handle and the event loop
const REQUEST_CAPACITY: usize = 10;

#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// Connection status reported by the broker session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectStatus {
    /// CONNACK with return code 0
    Accepted,
    /// Broker answered the CONNECT with a refusal
    Refused(ConnectReturnCode),
    /// Transport failed before or after the handshake
    Lost(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session has not been connected")]
    NotConnected,

    #[error("Session already connecting to {0}")]
    AlreadyStarted(String),

    #[error("Client error: {0}")]
    Client(#[from] rumqttc::ClientError),
}

/// Stateful broker client used by the orchestrator and the publisher.
///
/// Status changes are not returned from `connect`; they arrive later as
/// [`NetEvent::Status`] on the network event queue.
pub trait BrokerSession {
    fn connect(
        &mut self,
        address: IpAddr,
        port: u16,
        config: &ClientConfig,
    ) -> Result<(), SessionError>;

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), SessionError>;
}

/// `rumqttc` backed session.
///
/// The event loop is driven by a task on the same runtime, which only
/// forwards status changes to the event queue. It stops polling after the
/// first connection error, so `rumqttc` never reconnects on its own.
pub struct MqttSession {
    events: EventSender,
    client: Option<AsyncClient>,
}

impl MqttSession {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            client: None,
        }
    }
}

impl BrokerSession for MqttSession {
    fn connect(
        &mut self,
        address: IpAddr,
        port: u16,
        config: &ClientConfig,
    ) -> Result<(), SessionError> {
        if self.client.is_some() {
            return Err(SessionError::AlreadyStarted(address.to_string()));
        }

        let mut mqtt_options = MqttOptions::new(config.client_id.clone(), address.to_string(), port);
        mqtt_options
            .set_keep_alive(config.keep_alive)
            .set_clean_session(true);

        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);
        info!(
            "Connecting to broker {}:{} as '{}'",
            address, port, config.client_id
        );
        tokio::spawn(drive_event_loop(event_loop, self.events.clone()));

        self.client = Some(client);
        Ok(())
    }

    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), SessionError> {
        let client = self.client.as_ref().ok_or(SessionError::NotConnected)?;
        client.try_publish(topic, qos, retain, payload.to_vec())?;
        Ok(())
    }
}

async fn drive_event_loop(mut event_loop: EventLoop, events: EventSender) {
    loop {
        let status = match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    ConnectStatus::Accepted
                } else {
                    ConnectStatus::Refused(ack.code)
                }
            }
            Ok(event) => {
                debug!("MQTT event: {:?}", event);
                continue;
            }
            Err(ConnectionError::ConnectionRefused(code)) => ConnectStatus::Refused(code),
            Err(e) => ConnectStatus::Lost(e.to_string()),
        };

        let stop = status != ConnectStatus::Accepted;
        if events.send(NetEvent::Status(status)).is_err() {
            error!("Network event queue closed, stopping MQTT event loop");
            return;
        }
        if stop {
            break;
        }
    }

    warn!("MQTT event loop stopped, no reconnect will be attempted");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::EventQueue;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpListener;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn client_config() -> ClientConfig {
        ClientConfig {
            client_id: "rackwatch-test".to_string(),
            keep_alive: Duration::from_secs(60),
        }
    }

    /// Accepts every connection and closes it straight away.
    async fn hang_up_listener() -> (u16, Arc<AtomicUsize>) {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accepted = Arc::new(AtomicUsize::new(0));

        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(socket);
            }
        });

        (port, accepted)
    }

    #[tokio::test]
    async fn publish_before_connect_fails() {
        let queue = EventQueue::new();
        let mut session = MqttSession::new(queue.sender());

        assert!(matches!(
            session.publish("racks/01/door", b"ON", QoS::AtMostOnce, false),
            Err(SessionError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn closed_connection_is_reported_once_and_never_retried() {
        let (port, accepted) = hang_up_listener().await;
        let mut queue = EventQueue::new();
        let mut session = MqttSession::new(queue.sender());

        session.connect(LOCALHOST, port, &client_config()).unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        match queue.drain().as_slice() {
            [NetEvent::Status(ConnectStatus::Lost(_))] => {}
            other => panic!("unexpected events: {:?}", other),
        };
        assert_eq!(accepted.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(queue.drain().is_empty());
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_connect_is_rejected() {
        let (port, _accepted) = hang_up_listener().await;
        let queue = EventQueue::new();
        let mut session = MqttSession::new(queue.sender());

        session.connect(LOCALHOST, port, &client_config()).unwrap();

        assert!(matches!(
            session.connect(LOCALHOST, port, &client_config()),
            Err(SessionError::AlreadyStarted(_))
        ));
    }
}
