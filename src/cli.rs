use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;

use crate::config::Settings;
use crate::core::CharacterStore;
use crate::persona::{Persona, TurnReport, TurnSummary};

#[derive(Parser)]
#[command(name = "kizuna")]
#[command(about = "Bond and state engine for roleplay characters")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the character package and show what it contains
    Validate {
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Show the current session and bond position
    Status {
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Compose instruction text for the next generation
    Prompt {
        /// Render the shorter analysis-context block instead
        #[arg(long)]
        bond_change: bool,
        /// Print the sentiment analysis prompts instead
        #[arg(long)]
        sentiment: bool,
        /// Print the state analysis prompts instead
        #[arg(long)]
        states: bool,
        /// Print the pending ascension questionnaire instead
        #[arg(long)]
        ascent: bool,
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Score a finished generation and advance the session
    Turn {
        /// The sentiment analyser's verdict text
        #[arg(long)]
        sentiment: String,
        /// The state analyser's directive text
        #[arg(long)]
        states: Option<String>,
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Answer a pending ascension questionnaire
    Ascent {
        /// The questionnaire reply text
        #[arg(long)]
        reply: String,
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Queue emotion triggers for the next turn
    Emotion {
        /// State to add if absent (repeatable)
        #[arg(long)]
        add: Vec<String>,
        /// State to remove (repeatable)
        #[arg(long)]
        discard: Vec<String>,
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Archive the session and start over
    Reset {
        /// Username for the fresh session
        #[arg(long)]
        username: Option<String>,
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

pub fn handle_validate(data_dir: Option<PathBuf>) -> Result<()> {
    let settings = Settings::new(data_dir)?;
    let root = settings.character_root();
    let store = CharacterStore::load(&root)?;

    println!("{}", "Character package OK".green().bold());
    println!("Name: {}", store.character_name.cyan());
    println!("States: {}", store.states.len());
    println!("End states: {}", store.end_states.iter().count());
    println!("Bond ranges: {}", store.table.range_count());
    Ok(())
}

pub fn handle_prompt(
    bond_change: bool,
    sentiment: bool,
    states: bool,
    ascent: bool,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let settings = Settings::new(data_dir)?;
    let mut persona = Persona::load(&settings)?;

    if sentiment {
        let (system, confirmation) = persona.sentiment_prompts();
        print_prompt_pair(&system, confirmation);
        return Ok(());
    }
    if states {
        let (system, confirmation) = persona.state_analysis_prompts();
        print_prompt_pair(&system, confirmation);
        return Ok(());
    }
    if ascent {
        let (system, questionnaire) = persona.ascension_questionnaire()?;
        print_prompt_pair(&system, &questionnaire);
        return Ok(());
    }
    if bond_change {
        println!("{}", persona.bond_change_instructions());
        return Ok(());
    }

    let instructions = persona.roleplay_instructions()?;
    println!("{}", instructions);
    Ok(())
}

pub fn handle_turn(
    sentiment: String,
    states: Option<String>,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let settings = Settings::new(data_dir)?;
    let mut persona = Persona::load(&settings)?;

    match persona.turn(&sentiment, states.as_deref())? {
        TurnReport::AscensionProposed {
            system_prompt,
            questionnaire,
        } => {
            println!("{}", "⚡ Ascension proposed".yellow().bold());
            print_prompt_pair(&system_prompt, &questionnaire);
            println!("\nAnswer with: kizuna ascent --reply \"...\"");
        }
        TurnReport::Applied(summary) => print_summary(&summary),
    }
    Ok(())
}

pub fn handle_ascent(reply: String, data_dir: Option<PathBuf>) -> Result<()> {
    let settings = Settings::new(data_dir)?;
    let mut persona = Persona::load(&settings)?;

    let summary = persona.ascent_reply(&reply)?;
    print_summary(&summary);
    Ok(())
}

pub fn handle_emotion(
    add: Vec<String>,
    discard: Vec<String>,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let settings = Settings::new(data_dir)?;
    let mut persona = Persona::load(&settings)?;

    persona.record_emotion_triggers(add, discard)?;
    println!("{}", "Emotion triggers queued for the next turn".green());
    for name in &persona.session().carry_add {
        println!("+ {}", name.green());
    }
    for name in &persona.session().carry_discard {
        println!("- {}", name.red());
    }
    Ok(())
}

pub fn handle_reset(username: Option<String>, data_dir: Option<PathBuf>) -> Result<()> {
    let settings = Settings::new(data_dir)?;
    let mut persona = Persona::load(&settings)?;

    match persona.reset(username)? {
        Some(archived) => println!(
            "{} (archived to {})",
            "Session reset".green().bold(),
            archived.display()
        ),
        None => println!("{}", "Session reset".green().bold()),
    }
    println!(
        "{} meets {} for the first time.",
        persona.character_name().cyan(),
        persona.names().user.cyan()
    );
    Ok(())
}

fn print_prompt_pair(system: &str, confirmation: &str) {
    println!("{}", "System".cyan().bold());
    println!("{}", system);
    println!("\n{}", "Confirmation".cyan().bold());
    println!("{}", confirmation);
}

fn print_summary(summary: &TurnSummary) {
    let change = format!("{:+}", summary.change);
    let change = match summary.change {
        c if c > 0 => change.green(),
        c if c < 0 => change.red(),
        _ => change.normal(),
    };
    println!("Change: {}", change);
    if summary.affirmative > 0 {
        println!("Affirmative answers: {}", summary.affirmative);
    }
    if summary.mini_bonuses > 0 {
        println!("Mini bonuses: {}", summary.mini_bonuses);
    }
    println!("Bond: {:.2} / 100", summary.bond);
    println!("2nd Bond: {:.2} / 100", summary.second_bond);
    println!("Messages: {}", summary.messages_exchanged);
    if summary.stranger {
        println!("{}", "Still strangers".yellow());
    }

    if !summary.applied_states.is_empty() {
        println!("\n{}", "Applied States".cyan().bold());
        for state in &summary.applied_states {
            println!(
                "{}: intensity {} (decay {})",
                state.name().cyan(),
                state.intensity(),
                state.decay()
            );
        }
    }

    if let Some(ended) = &summary.ended {
        println!("\n{}", "Story Ended".red().bold());
        println!("{}", ended);
    }
}
