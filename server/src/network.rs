//! Server network layer handling WebSocket connections and the game event loop

use crate::config::GameConfig;
use crate::question_source::QuestionSource;
use crate::registry::PlayerId;
use crate::supervisor::GameSupervisor;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

/// Messages sent from connection tasks to the game loop
#[derive(Debug)]
pub enum NetworkEvent {
    Connected {
        addr: SocketAddr,
        sender: mpsc::UnboundedSender<Message>,
        reply: oneshot::Sender<PlayerId>,
    },
    Inbound {
        player_id: PlayerId,
        text: String,
    },
    Disconnected {
        player_id: PlayerId,
    },
    Shutdown,
}

/// WebSocket server driving a single [`GameSupervisor`]
pub struct Server<S> {
    listener: TcpListener,
    supervisor: GameSupervisor<S>,
    event_tx: mpsc::UnboundedSender<NetworkEvent>,
    event_rx: mpsc::UnboundedReceiver<NetworkEvent>,
}

impl<S> Server<S>
where
    S: QuestionSource + Send + 'static,
{
    pub async fn new(
        addr: &str,
        config: GameConfig,
        source: S,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Trivia server listening on {}", listener.local_addr()?);

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            supervisor: GameSupervisor::new(config, source),
            event_tx,
            event_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Returns a handle that can inject events, e.g. [`NetworkEvent::Shutdown`]
    pub fn event_sender(&self) -> mpsc::UnboundedSender<NetworkEvent> {
        self.event_tx.clone()
    }

    /// Main server loop
    ///
    /// Accepting and socket I/O happen on spawned tasks. Everything that
    /// touches game state runs here, one event at a time.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let Server {
            listener,
            mut supervisor,
            event_tx,
            mut event_rx,
        } = self;

        spawn_acceptor(listener, event_tx);
        info!("Server started successfully");

        loop {
            let deadline = supervisor.next_deadline();

            tokio::select! {
                event = event_rx.recv() => {
                    match event {
                        Some(NetworkEvent::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                        Some(event) => handle_event(&mut supervisor, event),
                    }
                },

                _ = sleep_until(deadline) => {
                    supervisor.on_timer(Instant::now());
                },
            }
        }

        Ok(())
    }
}

fn handle_event<S: QuestionSource>(supervisor: &mut GameSupervisor<S>, event: NetworkEvent) {
    match event {
        NetworkEvent::Connected {
            addr,
            sender,
            reply,
        } => {
            let id = supervisor.on_connect(addr, sender, Instant::now());
            if reply.send(id.clone()).is_err() {
                // The connection task died before learning its ID
                supervisor.on_disconnect(&id);
            }
        }
        NetworkEvent::Inbound { player_id, text } => {
            supervisor.on_message(&player_id, &text, Instant::now());
        }
        NetworkEvent::Disconnected { player_id } => {
            supervisor.on_disconnect(&player_id);
        }
        NetworkEvent::Shutdown => {}
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => {
            tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
        }
        None => std::future::pending().await,
    }
}

/// Spawns task that accepts TCP connections and upgrades them to WebSockets
fn spawn_acceptor(listener: TcpListener, event_tx: mpsc::UnboundedSender<NetworkEvent>) {
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let event_tx = event_tx.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, addr, event_tx).await;
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
            }
        }
    });
}

/// Runs one WebSocket session until either side closes it
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    event_tx: mpsc::UnboundedSender<NetworkEvent>,
) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };
    let (mut outgoing, mut incoming) = ws_stream.split();

    let (sender, mut receiver) = mpsc::unbounded_channel::<Message>();
    let (reply_tx, reply_rx) = oneshot::channel();
    if event_tx
        .send(NetworkEvent::Connected {
            addr,
            sender,
            reply: reply_tx,
        })
        .is_err()
    {
        error!("Game loop is gone, rejecting connection from {}", addr);
        return;
    }
    let Ok(player_id) = reply_rx.await else {
        return;
    };

    // Writer: drains the registry's channel into the socket, in order
    let writer = tokio::spawn(async move {
        while let Some(message) = receiver.recv().await {
            if let Err(e) = outgoing.send(message).await {
                debug!("Socket write failed: {}", e);
                break;
            }
        }
        let _ = outgoing.close().await;
    });

    while let Some(frame) = incoming.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let event = NetworkEvent::Inbound {
                    player_id: player_id.clone(),
                    text,
                };
                if event_tx.send(event).is_err() {
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!("Ignoring binary frame from player {}", player_id);
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Connection error for player {}: {}", player_id, e);
                break;
            }
        }
    }

    let _ = event_tx.send(NetworkEvent::Disconnected {
        player_id: player_id.clone(),
    });
    // Unregistering drops the sender, which ends the writer
    if writer.await.is_err() {
        error!("Writer task for player {} panicked", player_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question_source::QuestionBank;
    use shared::Question;

    fn single_question_bank() -> QuestionBank {
        QuestionBank::from_questions(vec![Question {
            prompt: "Q?".to_string(),
            options: vec!["A".to_string(), "B".to_string()],
            correct_answer: "A".to_string(),
        }])
    }

    #[tokio::test]
    async fn test_server_binds_ephemeral_port() {
        let server = Server::new("127.0.0.1:0", GameConfig::default(), single_question_bank())
            .await
            .unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_event_stops_loop() {
        let server = Server::new("127.0.0.1:0", GameConfig::default(), single_question_bank())
            .await
            .unwrap();
        let events = server.event_sender();

        let handle = tokio::spawn(async move { server.run().await.is_ok() });
        events.send(NetworkEvent::Shutdown).unwrap();

        let finished = tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(finished);
    }

    #[test]
    fn test_connect_event_assigns_player() {
        let mut supervisor = GameSupervisor::new(GameConfig::default(), single_question_bank());
        let (sender, _receiver) = mpsc::unbounded_channel();
        let (reply, mut reply_rx) = oneshot::channel();

        handle_event(
            &mut supervisor,
            NetworkEvent::Connected {
                addr: "127.0.0.1:4000".parse().unwrap(),
                sender,
                reply,
            },
        );

        let id = reply_rx.try_recv().unwrap();
        assert!(supervisor.registry().contains(&id));
    }

    #[test]
    fn test_connect_without_listener_is_rolled_back() {
        let mut supervisor = GameSupervisor::new(GameConfig::default(), single_question_bank());
        let (sender, _receiver) = mpsc::unbounded_channel();
        let (reply, reply_rx) = oneshot::channel();
        drop(reply_rx);

        handle_event(
            &mut supervisor,
            NetworkEvent::Connected {
                addr: "127.0.0.1:4000".parse().unwrap(),
                sender,
                reply,
            },
        );

        assert!(supervisor.registry().is_empty());
    }
}
