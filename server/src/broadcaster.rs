//! Fan-out of round events to connected players

use crate::registry::{ConnectionRegistry, PlayerId};
use crate::round::RoundEvent;
use log::{debug, error, warn};
use shared::{AnswerVerdict, ServerMessage};
use tokio_tungstenite::tungstenite::Message;

pub const TIME_EXPIRED_TEXT: &str = "Time's up!";

/// Where an outbound message should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Everyone(ServerMessage),
    Player(PlayerId, ServerMessage),
}

impl From<RoundEvent> for Delivery {
    fn from(event: RoundEvent) -> Self {
        match event {
            RoundEvent::NewQuestion {
                prompt,
                options,
                duration,
            } => Delivery::Everyone(ServerMessage::NewQuestion {
                question: prompt,
                options,
                timer: duration,
            }),
            RoundEvent::TimerTick { remaining } => {
                Delivery::Everyone(ServerMessage::TimerTick { time: remaining })
            }
            RoundEvent::TimeExpired => Delivery::Everyone(ServerMessage::Message {
                text: TIME_EXPIRED_TEXT.to_string(),
            }),
            RoundEvent::AnswerResult { player_id, correct } => Delivery::Player(
                player_id,
                ServerMessage::AnswerResult {
                    result: AnswerVerdict::from(correct),
                },
            ),
            RoundEvent::GameOver { scores } => Delivery::Everyone(ServerMessage::GameOver {
                scores: scores
                    .into_iter()
                    .map(|(id, score)| (id.to_string(), score))
                    .collect(),
            }),
        }
    }
}

/// Best-effort delivery of server messages
///
/// A failed send is logged and skipped; it never stops delivery to the
/// remaining connections and never reaches the caller.
#[derive(Debug, Default)]
pub struct Broadcaster {
    delivered: u64,
    failed: u64,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes a round event to everyone or to a single player
    pub fn dispatch(&mut self, registry: &ConnectionRegistry, event: RoundEvent) {
        match Delivery::from(event) {
            Delivery::Everyone(message) => self.publish(registry, &message),
            Delivery::Player(id, message) => self.unicast(registry, &id, &message),
        }
    }

    /// Sends `message` to every live connection
    pub fn publish(&mut self, registry: &ConnectionRegistry, message: &ServerMessage) {
        let Some(frame) = encode(message) else {
            return;
        };

        registry.for_each_live(|connection| match connection.send(frame.clone()) {
            Ok(()) => self.delivered += 1,
            Err(e) => {
                self.failed += 1;
                warn!("Failed to send to player {}: {}", connection.id, e);
            }
        });
    }

    /// Sends `message` to a single player, if still connected
    pub fn unicast(&mut self, registry: &ConnectionRegistry, id: &PlayerId, message: &ServerMessage) {
        let Some(connection) = registry.connection(id) else {
            debug!("Dropping message for departed player {}", id);
            return;
        };
        let Some(frame) = encode(message) else {
            return;
        };

        match connection.send(frame) {
            Ok(()) => self.delivered += 1,
            Err(e) => {
                self.failed += 1;
                warn!("Failed to send to player {}: {}", id, e);
            }
        }
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }
}

fn encode(message: &ServerMessage) -> Option<Message> {
    match message.to_json() {
        Ok(json) => Some(Message::Text(json)),
        Err(e) => {
            error!("Failed to serialize {:?}: {}", message, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::net::SocketAddr;
    use tokio::sync::mpsc;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    fn received(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(Message::Text(text)) = rx.try_recv() {
            messages.push(serde_json::from_str(&text).unwrap());
        }
        messages
    }

    #[test]
    fn test_publish_reaches_every_connection() {
        let mut registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register(test_addr(), tx1);
        registry.register(test_addr(), tx2);

        let mut broadcaster = Broadcaster::new();
        broadcaster.publish(&registry, &ServerMessage::TimerTick { time: 7 });

        assert_eq!(received(&mut rx1), vec![ServerMessage::TimerTick { time: 7 }]);
        assert_eq!(received(&mut rx2), vec![ServerMessage::TimerTick { time: 7 }]);
        assert_eq!(broadcaster.delivered(), 2);
    }

    #[test]
    fn test_broken_connection_does_not_block_others() {
        let mut registry = ConnectionRegistry::new();
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.register(test_addr(), tx1);
        registry.register(test_addr(), tx2);
        drop(rx1);

        let mut broadcaster = Broadcaster::new();
        broadcaster.dispatch(&registry, RoundEvent::TimeExpired);

        assert_eq!(
            received(&mut rx2),
            vec![ServerMessage::Message {
                text: TIME_EXPIRED_TEXT.to_string()
            }]
        );
        assert_eq!(broadcaster.delivered(), 1);
        assert_eq!(broadcaster.failed(), 1);
    }

    #[test]
    fn test_answer_result_is_unicast() {
        let mut registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let (id1, _) = registry.register(test_addr(), tx1);
        registry.register(test_addr(), tx2);

        let mut broadcaster = Broadcaster::new();
        broadcaster.dispatch(
            &registry,
            RoundEvent::AnswerResult {
                player_id: id1,
                correct: true,
            },
        );

        assert_eq!(
            received(&mut rx1),
            vec![ServerMessage::AnswerResult {
                result: AnswerVerdict::Correct
            }]
        );
        assert!(received(&mut rx2).is_empty());
    }

    #[test]
    fn test_unicast_to_departed_player_is_dropped() {
        let registry = ConnectionRegistry::new();
        let mut broadcaster = Broadcaster::new();

        broadcaster.unicast(
            &registry,
            &PlayerId::from("gone"),
            &ServerMessage::Message {
                text: "hello".to_string(),
            },
        );

        assert_eq!(broadcaster.delivered(), 0);
        assert_eq!(broadcaster.failed(), 0);
    }

    #[test]
    fn test_event_to_message_mapping() {
        let id = PlayerId::from("abc");
        let delivery = Delivery::from(RoundEvent::GameOver {
            scores: BTreeMap::from([(id.clone(), 3)]),
        });
        assert_eq!(
            delivery,
            Delivery::Everyone(ServerMessage::GameOver {
                scores: BTreeMap::from([("abc".to_string(), 3)]),
            })
        );

        let delivery = Delivery::from(RoundEvent::NewQuestion {
            prompt: "Q?".to_string(),
            options: vec!["A".to_string(), "B".to_string()],
            duration: 15,
        });
        assert_eq!(
            delivery,
            Delivery::Everyone(ServerMessage::NewQuestion {
                question: "Q?".to_string(),
                options: vec!["A".to_string(), "B".to_string()],
                timer: 15,
            })
        );

        let delivery = Delivery::from(RoundEvent::AnswerResult {
            player_id: id.clone(),
            correct: false,
        });
        assert_eq!(
            delivery,
            Delivery::Player(
                id,
                ServerMessage::AnswerResult {
                    result: AnswerVerdict::Wrong
                }
            )
        );
    }

    #[test]
    fn test_per_connection_order_is_preserved() {
        let mut registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(test_addr(), tx);

        let mut broadcaster = Broadcaster::new();
        for time in (0..5).rev() {
            broadcaster.publish(&registry, &ServerMessage::TimerTick { time });
        }

        let times: Vec<u32> = received(&mut rx)
            .into_iter()
            .map(|message| match message {
                ServerMessage::TimerTick { time } => time,
                other => panic!("Unexpected message {:?}", other),
            })
            .collect();
        assert_eq!(times, vec![4, 3, 2, 1, 0]);
    }
}
