use std::path::PathBuf;

use anyhow::Result;
use colored::*;

use crate::config::Settings;
use crate::persona::Persona;

pub fn handle_status(data_dir: Option<PathBuf>) -> Result<()> {
    let settings = Settings::new(data_dir)?;
    let persona = Persona::load(&settings)?;
    let session = persona.session();

    println!(
        "{}",
        format!("{} Status", persona.character_name()).cyan().bold()
    );
    println!("Session: {}", session.id);
    println!("Started: {}", session.started_at.format("%Y-%m-%d %H:%M UTC"));
    println!("Partner: {}", persona.names().user);
    println!("Bond: {:.2} / 100", session.bond);
    println!("2nd Bond: {:.2} / 100", session.second_bond);
    println!("Messages: {}", session.messages_exchanged);
    if session.stranger {
        println!("{}", "Still strangers".yellow());
    }

    println!("\n{}", "Applied States".cyan().bold());
    if session.applied_states.is_empty() {
        println!("(none)");
    } else {
        for state in &session.applied_states {
            println!(
                "{}: intensity {} (decay {})",
                state.name().cyan(),
                state.intensity(),
                state.decay()
            );
        }
    }

    if session.pending_ascension.is_some() {
        println!("\n{}", "⚡ Ascension questionnaire pending".yellow());
    }

    if !session.carry_add.is_empty() || !session.carry_discard.is_empty() {
        println!("\n{}", "Queued Emotion Triggers".cyan().bold());
        for name in &session.carry_add {
            println!("+ {}", name.green());
        }
        for name in &session.carry_discard {
            println!("- {}", name.red());
        }
    }

    if let Some(ended) = &session.ended {
        println!("\n{}", "Story Ended".red().bold());
        println!("{}", ended);
    }

    Ok(())
}
