use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::states::{StateCatalog, StateDefinition};

/// Signed bond change read from a sentiment classification reply, in -3..=3.
/// Text that matches nothing degrades to neutral, never to an error.
pub fn classify_sentiment(text: &str) -> i32 {
    let lowered = text.to_lowercase();
    let mut change = if lowered.contains("positive") {
        1
    } else if lowered.contains("negative") {
        -1
    } else if lowered.contains("neutral") {
        0
    } else {
        warn!("no sentiment keyword in classification reply, defaulting to neutral");
        0
    };
    if lowered.contains("very") {
        change *= 2;
    } else if lowered.contains("extreme") || lowered.contains("overwhelm") {
        // stems, so "extremely" and "overwhelmingly" also match
        change *= 3;
    }
    change
}

/// Number of affirmative answers in a questionnaire reply, capped at 3.
pub fn count_affirmative(text: &str) -> u32 {
    text.to_lowercase().matches("yes").count().min(3) as u32
}

/// Per-kind state lists extracted from generator text. Each state appears
/// at most once per list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDirectives {
    pub increase: Vec<String>,
    pub decrease: Vec<String>,
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

impl StateDirectives {
    pub fn is_empty(&self) -> bool {
        self.increase.is_empty()
            && self.decrease.is_empty()
            && self.add.is_empty()
            && self.remove.is_empty()
    }

    fn list_mut(&mut self, kind: DirectiveKind) -> &mut Vec<String> {
        match kind {
            DirectiveKind::Increase => &mut self.increase,
            DirectiveKind::Decrease => &mut self.decrease,
            DirectiveKind::Add => &mut self.add,
            DirectiveKind::Remove => &mut self.remove,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectiveKind {
    Increase,
    Decrease,
    Add,
    Remove,
}

// narrative markers; lines carrying these are roleplay prose, not directives
const NARRATIVE_WORDS: &[&str] = &["he", "she", "says", "said"];

/// Extracts per-state directives from a block of generator text, line by
/// line. Lines that look like narration are skipped, lines without a
/// directive keyword inherit the previous line's kind so wrapped lists
/// still parse, and a first line without a keyword produces nothing.
pub fn read_state_directives(text: &str, catalog: &StateCatalog) -> StateDirectives {
    let mut directives = StateDirectives::default();
    let mut previous_kind: Option<DirectiveKind> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lowered = trimmed.to_lowercase();
        let line_words = tokenize(&lowered);
        if is_narrative(&lowered, &line_words) {
            debug!(line = trimmed, "skipping narrative line");
            continue;
        }
        let kind = match kind_of(&line_words) {
            Some(kind) => {
                previous_kind = Some(kind);
                kind
            }
            None => match previous_kind {
                Some(kind) => kind,
                None => {
                    debug!(line = trimmed, "line carries no directive keyword");
                    continue;
                }
            },
        };
        for definition in catalog.iter() {
            if mentions(&line_words, definition)
                && !directives.list_mut(kind).iter().any(|n| n == &definition.name)
            {
                directives.list_mut(kind).push(definition.name.clone());
            }
        }
    }

    directives
}

fn tokenize(lowered: &str) -> Vec<&str> {
    lowered
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|word| !word.is_empty())
        .collect()
}

fn is_narrative(lowered: &str, words: &[&str]) -> bool {
    if lowered.contains("i feel") {
        return true;
    }
    words.iter().any(|word| NARRATIVE_WORDS.contains(word))
}

fn kind_of(words: &[&str]) -> Option<DirectiveKind> {
    for word in words {
        let kind = match *word {
            "increase" | "increases" | "increased" | "increasing" => DirectiveKind::Increase,
            "decrease" | "decreases" | "decreased" | "decreasing" => DirectiveKind::Decrease,
            "reduce" | "reduces" | "reduced" | "reducing" => DirectiveKind::Decrease,
            "add" | "adds" | "added" | "adding" => DirectiveKind::Add,
            "remove" | "removes" | "removed" | "removing" => DirectiveKind::Remove,
            _ => continue,
        };
        return Some(kind);
    }
    None
}

// a state is mentioned by its raw identifier or by its title-cased
// rendering appearing as consecutive words
fn mentions(line_words: &[&str], definition: &StateDefinition) -> bool {
    if line_words
        .iter()
        .any(|word| word.eq_ignore_ascii_case(&definition.name))
    {
        return true;
    }
    let title_words: Vec<String> = definition
        .titled
        .split(' ')
        .map(|word| word.to_lowercase())
        .collect();
    if title_words.is_empty() || line_words.len() < title_words.len() {
        return false;
    }
    line_words.windows(title_words.len()).any(|window| {
        window
            .iter()
            .zip(title_words.iter())
            .all(|(word, title)| *word == title.as_str())
    })
}
