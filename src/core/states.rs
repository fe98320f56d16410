use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::core::error::{EngineError, Result};

/// Namespace a state was declared under in `states.txt`. Common states are
/// habitual traits of the character; ordinary states are situational.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSpace {
    Ordinary,
    Common,
}

/// One catalog entry, with its display forms precomputed at load.
#[derive(Debug, Clone)]
pub struct StateDefinition {
    pub name: String,
    pub space: StateSpace,
    /// Chance per turn of spawning unprompted, in [0, 1].
    pub spawn_rate: f64,
    /// Plus states feed bond mini bonuses while applied.
    pub plus: bool,
    /// "SELF_DOUBT" rendered as "Self doubt".
    pub humanized: String,
    /// "SELF_DOUBT" rendered as "Self Doubt", for matching generator prose.
    pub titled: String,
}

/// First word of the humanized form, used for copula selection.
pub fn first_word(humanized: &str) -> &str {
    humanized.split(' ').next().unwrap_or(humanized)
}

fn humanize(name: &str) -> String {
    let lowered = name.replace('_', " ").to_lowercase();
    let mut chars = lowered.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => lowered,
    }
}

fn title_case(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let lowered = word.to_lowercase();
            let mut chars = lowered.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => lowered,
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// All states defined for a character, both namespaces.
#[derive(Debug, Clone)]
pub struct StateCatalog {
    states: Vec<StateDefinition>,
    index: HashMap<String, usize>,
}

impl StateCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Line grammar: `[!]NAME[+][=RATE]`. `!` marks common, `+` marks a
    /// plus state, `=RATE` sets the spawn rate. Names must be unique
    /// across both namespaces, upper-case, and contain no spaces.
    pub fn parse(content: &str) -> Result<Self> {
        let mut states = Vec::new();
        let mut index = HashMap::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.contains(' ') {
                return Err(EngineError::StateCatalog(format!(
                    "state contains spaces, which is not allowed: {}",
                    line
                )));
            }
            if line != line.to_uppercase() {
                return Err(EngineError::StateCatalog(format!(
                    "state must be uppercase: {}",
                    line
                )));
            }

            let (body, space) = match line.strip_prefix('!') {
                Some(rest) => (rest, StateSpace::Common),
                None => (line, StateSpace::Ordinary),
            };
            let (name_part, rate_part) = match body.split_once('=') {
                Some((name, rate)) => (name, Some(rate)),
                None => (body, None),
            };
            let (name, plus) = match name_part.strip_suffix('+') {
                Some(rest) => (rest, true),
                None => (name_part, false),
            };
            if name.is_empty() {
                return Err(EngineError::StateCatalog(format!(
                    "state has no name: {}",
                    line
                )));
            }
            let spawn_rate = match rate_part {
                Some(raw) => {
                    let rate: f64 = raw.parse().map_err(|_| {
                        EngineError::StateCatalog(format!(
                            "invalid spawn rate for state '{}': {}",
                            name, raw
                        ))
                    })?;
                    if !(0.0..=1.0).contains(&rate) {
                        return Err(EngineError::StateCatalog(format!(
                            "spawn rate for state '{}' must be between 0.0 and 1.0",
                            name
                        )));
                    }
                    rate
                }
                None => 0.0,
            };

            if index.contains_key(name) {
                return Err(EngineError::StateCatalog(format!(
                    "duplicate state found in state list: {}",
                    name
                )));
            }
            index.insert(name.to_string(), states.len());
            states.push(StateDefinition {
                name: name.to_string(),
                space,
                spawn_rate,
                plus,
                humanized: humanize(name),
                titled: title_case(name),
            });
        }

        Ok(StateCatalog { states, index })
    }

    pub fn get(&self, name: &str) -> Option<&StateDefinition> {
        self.index.get(name).map(|&i| &self.states[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StateDefinition> {
        self.states.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.states.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Terminal marker from `end_states.txt`.
#[derive(Debug, Clone)]
pub struct EndStateDefinition {
    pub name: String,
    pub description: String,
}

impl EndStateDefinition {
    /// Closing line shown when the session reaches this end state.
    pub fn human_readable(&self, character_name: &str, username: &str) -> String {
        let description = self
            .description
            .replace("{{char}}", character_name)
            .replace("{{user}}", username);
        format!("{}: {}", title_case(&self.name), description)
    }
}

#[derive(Debug, Clone)]
pub struct EndStateCatalog {
    states: Vec<EndStateDefinition>,
    index: HashMap<String, usize>,
}

impl EndStateCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Lines of `STATE: description`, unique upper-case names.
    pub fn parse(content: &str) -> Result<Self> {
        let mut states = Vec::new();
        let mut index = HashMap::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (name, description) = line.split_once(':').ok_or_else(|| {
                EngineError::EndStateCatalog(format!(
                    "invalid end state format: {}. Must be STATE: DESCRIPTION",
                    line
                ))
            })?;
            let name = name.trim();
            let description = description.trim();
            if name.contains(' ') {
                return Err(EngineError::EndStateCatalog(format!(
                    "end state contains spaces, which is not allowed: {}",
                    name
                )));
            }
            if name != name.to_uppercase() {
                return Err(EngineError::EndStateCatalog(format!(
                    "end state must be uppercase: {}",
                    name
                )));
            }
            if index.contains_key(name) {
                return Err(EngineError::EndStateCatalog(format!(
                    "duplicate end state found in end state list: {}",
                    name
                )));
            }
            index.insert(name.to_string(), states.len());
            states.push(EndStateDefinition {
                name: name.to_string(),
                description: description.to_string(),
            });
        }

        Ok(EndStateCatalog { states, index })
    }

    pub fn get(&self, name: &str) -> Option<&EndStateDefinition> {
        self.index.get(name).map(|&i| &self.states[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndStateDefinition> {
        self.states.iter()
    }
}
