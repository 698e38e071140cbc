use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use shared::{AnswerPayload, ClientMessage, ServerMessage};
use std::time::Duration;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;

/// Bot player that answers every question with a random option
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the trivia server
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:3000")]
    server: String,

    /// Longest think time before answering, in milliseconds
    #[arg(short = 'm', long, default_value = "3000")]
    max_delay: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    info!("Connecting to {}", args.server);
    let (ws_stream, _) = tokio_tungstenite::connect_async(args.server.as_str()).await?;
    let (mut outgoing, mut incoming) = ws_stream.split();

    while let Some(frame) = incoming.next().await {
        let text = match frame? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let message: ServerMessage = match serde_json::from_str(&text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Unexpected message {:?}: {}", text, e);
                continue;
            }
        };

        match message {
            ServerMessage::Message { text } => println!("* {}", text),
            ServerMessage::NewQuestion {
                question,
                options,
                timer,
            } => {
                println!("? {} ({}s) {:?}", question, timer, options);

                let (choice, delay) = {
                    let mut rng = rand::thread_rng();
                    let choice = options.choose(&mut rng).cloned();
                    let delay = rng.gen_range(0..=args.max_delay);
                    (choice, delay)
                };
                let Some(answer) = choice else {
                    continue;
                };

                sleep(Duration::from_millis(delay)).await;
                println!("> {}", answer);
                let reply = ClientMessage::Answer(AnswerPayload { question, answer });
                outgoing.send(Message::Text(reply.to_json()?)).await?;
            }
            ServerMessage::TimerTick { time } => info!("{}s left", time),
            ServerMessage::AnswerResult { result } => println!("= {:?}", result),
            ServerMessage::GameOver { scores } => {
                println!("Game over!");
                for (player, score) in scores {
                    println!("  {}: {}", player, score);
                }
            }
        }
    }

    Ok(())
}
