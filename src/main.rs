// main.rs
mod cli;
mod composer;
mod config;
mod core;
mod persona;
mod session;
mod status;

use clap::Parser;
use cli::{Args, Commands};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "kizuna=warn".to_string()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Validate { data_dir } => {
            if let Err(e) = cli::handle_validate(data_dir) {
                eprintln!("❌ Validation error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Status { data_dir } => {
            if let Err(e) = status::handle_status(data_dir) {
                eprintln!("❌ Status error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Prompt {
            bond_change,
            sentiment,
            states,
            ascent,
            data_dir,
        } => {
            if let Err(e) = cli::handle_prompt(bond_change, sentiment, states, ascent, data_dir) {
                eprintln!("❌ Prompt error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Turn {
            sentiment,
            states,
            data_dir,
        } => {
            if let Err(e) = cli::handle_turn(sentiment, states, data_dir) {
                eprintln!("❌ Turn error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Ascent { reply, data_dir } => {
            if let Err(e) = cli::handle_ascent(reply, data_dir) {
                eprintln!("❌ Ascent error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Emotion {
            add,
            discard,
            data_dir,
        } => {
            if let Err(e) = cli::handle_emotion(add, discard, data_dir) {
                eprintln!("❌ Emotion error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Reset { username, data_dir } => {
            if let Err(e) = cli::handle_reset(username, data_dir) {
                eprintln!("❌ Reset error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
