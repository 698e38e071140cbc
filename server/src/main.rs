use clap::Parser;
use log::{error, info};
use server::config::GameConfig;
use server::network::Server;
use server::question_source::QuestionBank;
use shared::{DEFAULT_BATCH_SIZE, QUESTION_DURATION_SECS};
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, env = "PORT", default_value = "3000")]
    port: u16,
    /// Questions per round (1-20)
    #[clap(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,
    /// Seconds players get to answer each question
    #[clap(short = 'd', long, default_value_t = QUESTION_DURATION_SECS)]
    question_duration: u32,
    /// JSON file with `{question, options, answer}` objects
    #[clap(short, long)]
    questions: Option<PathBuf>,
}

/// Parses command-line arguments, loads the question bank and runs the server
/// until it stops or Ctrl+C is pressed.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let bank = match &args.questions {
        Some(path) => QuestionBank::load(path)?,
        None => QuestionBank::builtin(),
    };
    if bank.is_empty() {
        error!("Question bank is empty, rounds will not start");
    }

    let config = GameConfig::default()
        .with_batch_size(args.batch_size)
        .with_question_duration(args.question_duration);
    info!(
        "{} questions available, {} per round, {}s per question",
        bank.len(),
        config.batch_size,
        config.timings.question_duration_secs
    );

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::new(&address, config, bank).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped with error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
