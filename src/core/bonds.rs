use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::applied::AppliedState;
use crate::core::bond_text::{BondRange, ProcessedBond};
use crate::core::error::{EngineError, Result};
use crate::core::states::{first_word, EndStateCatalog, StateCatalog};
use crate::core::tuning::BondTuning;

pub const STRANGER_FILE: &str = "stranger.txt";
pub const STRANGER_BAD_FILE: &str = "stranger_bad.txt";

const INTENSITY_LABELS: [&str; 5] = ["", "", "Very ", "Extremely ", "Extremely and Overwhelmingly "];

const CLOSING_DIRECTIVES: &str = "\n\nBe very descriptive\
\n\nIMPORTANT: Keep your response 3 paragraphs maximum. Do NOT write actions or dialogue for {{user}}. Only roleplay as {{char}}.\
\n\n{{char}} should be proactive and propose ideas, activities, and things to do with {{user}} based on the circumstances and their bond\
\n\n{{char}} may change the scenario and setting to keep things interesting for both parties";

/// Resolves the `{{char}}` and `{{user}}` placeholders carried by every
/// configured text.
#[derive(Debug, Clone)]
pub struct Names {
    pub character: String,
    pub user: String,
}

impl Names {
    pub fn new(character: impl Into<String>, user: impl Into<String>) -> Self {
        Names {
            character: character.into(),
            user: user.into(),
        }
    }

    pub fn resolve(&self, text: &str) -> String {
        text.replace("{{char}}", &self.character)
            .replace("{{user}}", &self.user)
    }
}

/// The persisted bond position of a session. The engine takes this and
/// returns a new value, it keeps no position of its own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BondRuntime {
    pub bond: f64,
    pub second_bond: f64,
    pub stranger: bool,
    pub messages_exchanged: u32,
}

impl Default for BondRuntime {
    fn default() -> Self {
        BondRuntime {
            bond: 0.0,
            second_bond: 0.0,
            stranger: true,
            messages_exchanged: 0,
        }
    }
}

/// Instruction text rendered for one bond position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BondInstructions {
    Standard(String),
    DeadEnd(String),
}

impl BondInstructions {
    pub fn text(&self) -> &str {
        match self {
            BondInstructions::Standard(text) => text,
            BondInstructions::DeadEnd(text) => text,
        }
    }

    pub fn is_dead_end(&self) -> bool {
        matches!(self, BondInstructions::DeadEnd(_))
    }
}

/// Unresolved dead-end pieces for a terminal bond position.
#[derive(Debug, Clone, Copy)]
pub struct DeadEndOutcome<'a> {
    pub description: &'a str,
    /// End state named by the `!end:` override, if any.
    pub end_state: Option<&'a str>,
}

/// All parsed bond texts for a character, keyed by bond range plus the
/// two stranger texts. Construction validates the whole table, a value
/// of this type always tiles `[-100, 100]`.
#[derive(Debug, Clone)]
pub struct BondTable {
    ranges: Vec<(BondRange, ProcessedBond)>,
    stranger: ProcessedBond,
    stranger_bad: ProcessedBond,
}

impl BondTable {
    /// Loads every `.txt` file in `bonds_dir` and validates the set.
    /// Ranges must tile `[-100, 100]` without gaps or overlaps and both
    /// stranger texts must exist as ordinary texts. Every sub-level must
    /// carry a `*:` line plus one line per catalog state.
    pub fn load(
        bonds_dir: &Path,
        states: &StateCatalog,
        end_states: &EndStateCatalog,
    ) -> Result<BondTable> {
        let mut paths: Vec<_> = Vec::new();
        for entry in fs::read_dir(bonds_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("txt") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut named: Vec<(BondRange, String, String)> = Vec::new();
        let mut stranger = None;
        let mut stranger_bad = None;
        for path in &paths {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let text = fs::read_to_string(path)?;
            match file_name {
                STRANGER_FILE => {
                    stranger = Some(Self::parse_stranger("stranger bond", &text, states, end_states)?);
                }
                STRANGER_BAD_FILE => {
                    stranger_bad =
                        Some(Self::parse_stranger("stranger bad bond", &text, states, end_states)?);
                }
                _ => {
                    let range = BondRange::from_file_name(file_name)?;
                    named.push((range, file_name.to_string(), text));
                }
            }
        }

        let stranger = stranger.ok_or_else(|| EngineError::BondFile {
            file: STRANGER_FILE.to_string(),
            message: "missing from bonds folder".to_string(),
        })?;
        let stranger_bad = stranger_bad.ok_or_else(|| EngineError::BondFile {
            file: STRANGER_BAD_FILE.to_string(),
            message: "missing from bonds folder".to_string(),
        })?;

        if named.is_empty() {
            return Err(EngineError::Range(
                "no bond range files found in bonds folder".to_string(),
            ));
        }
        named.sort_by_key(|(range, _, _)| range.min);
        for pair in named.windows(2) {
            if pair[0].0.max > pair[1].0.min {
                return Err(EngineError::Range(format!(
                    "bond ranges overlap between files '{}' and '{}'",
                    pair[0].1, pair[1].1
                )));
            }
        }
        let mut expected = -100;
        for (range, file, _) in &named {
            if range.min != expected {
                return Err(EngineError::Range(format!(
                    "bond ranges have a gap before file '{}', expected min bond {} but got {}",
                    file, expected, range.min
                )));
            }
            expected = range.max;
        }
        if expected != 100 {
            return Err(EngineError::Range(format!(
                "bond ranges must reach 100, coverage stops at {}",
                expected
            )));
        }

        let mut ranges = Vec::with_capacity(named.len());
        for (range, _, text) in named {
            let description = format!("bond range {} to {}", range.min, range.max);
            let processed = ProcessedBond::parse(&description, &text)?;
            Self::validate_processed(&description, &processed, states, end_states)?;
            ranges.push((range, processed));
        }

        Ok(BondTable {
            ranges,
            stranger,
            stranger_bad,
        })
    }

    fn parse_stranger(
        description: &str,
        text: &str,
        states: &StateCatalog,
        end_states: &EndStateCatalog,
    ) -> Result<ProcessedBond> {
        let processed = ProcessedBond::parse(description, text)?;
        if processed.is_dead_end() {
            return Err(EngineError::BondFile {
                file: description.to_string(),
                message: "stranger text must not be a dead end".to_string(),
            });
        }
        Self::validate_processed(description, &processed, states, end_states)?;
        Ok(processed)
    }

    fn validate_processed(
        description: &str,
        processed: &ProcessedBond,
        states: &StateCatalog,
        end_states: &EndStateCatalog,
    ) -> Result<()> {
        let fail = |message: String| EngineError::BondFile {
            file: description.to_string(),
            message,
        };
        match processed {
            ProcessedBond::DeadEnd { overrides, .. } => {
                for (key, value) in overrides {
                    if key != "end" {
                        return Err(fail(format!("unknown dead end override '{}'", key)));
                    }
                    if !end_states.contains(value) {
                        return Err(fail(format!(
                            "dead end override names unknown end state '{}'",
                            value
                        )));
                    }
                }
            }
            ProcessedBond::Standard { levels } => {
                for (level, sub_level) in levels {
                    if sub_level.general.is_none() {
                        return Err(fail(format!(
                            "state '*' not found at 2nd bond level {}",
                            level
                        )));
                    }
                    for definition in states.iter() {
                        if !sub_level.per_state.contains_key(&definition.name) {
                            return Err(fail(format!(
                                "state '{}' not found at 2nd bond level {}",
                                definition.name, level
                            )));
                        }
                    }
                    for key in sub_level.per_state.keys() {
                        if !states.contains(key) {
                            return Err(fail(format!(
                                "unknown state '{}' at 2nd bond level {}",
                                key, level
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// The parsed text owning `bond`. Strangers always read the stranger
    /// texts, picked by the sign of the bond. A bond of exactly 100 falls
    /// past every half-open range and belongs to the range ending at 100.
    pub fn processed_for(&self, bond: f64, stranger: bool) -> &ProcessedBond {
        if stranger {
            return if bond < 0.0 {
                &self.stranger_bad
            } else {
                &self.stranger
            };
        }
        let clamped = bond.clamp(-100.0, 100.0);
        for (range, processed) in &self.ranges {
            if range.contains(clamped) || (range.max == 100 && clamped >= 100.0) {
                return processed;
            }
        }
        // the tiling walk at load time makes this unreachable
        warn!(bond, "no bond range resolved, falling back to stranger text");
        &self.stranger
    }

    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }
}

/// Turns a bond position into instruction text and advances it from one
/// turn's classification.
#[derive(Debug, Clone)]
pub struct BondEngine {
    tuning: BondTuning,
    table: BondTable,
}

impl BondEngine {
    pub fn new(tuning: BondTuning, table: BondTable) -> Self {
        BondEngine { tuning, table }
    }

    pub fn tuning(&self) -> &BondTuning {
        &self.tuning
    }

    pub fn table(&self) -> &BondTable {
        &self.table
    }

    /// Renders the instruction text for a bond position. One sentence per
    /// applied state, labelled by intensity, follows the sub-level's
    /// general instruction. With `for_bond_change` the per-state sentences
    /// and closing style directives are replaced by the sub-level's
    /// optional `**:` rules.
    pub fn instructions_for(
        &self,
        runtime: &BondRuntime,
        applied: &[AppliedState],
        catalog: &StateCatalog,
        names: &Names,
        for_bond_change: bool,
    ) -> BondInstructions {
        let processed = self.table.processed_for(runtime.bond, runtime.stranger);
        if let ProcessedBond::DeadEnd { description, .. } = processed {
            warn!(bond = runtime.bond, "bond position is a dead end");
            return BondInstructions::DeadEnd(names.resolve(description));
        }
        let Some(level) = processed.level_for(runtime.second_bond) else {
            warn!(
                bond = runtime.bond,
                second_bond = runtime.second_bond,
                "no instructions for bond position"
            );
            return BondInstructions::Standard(String::new());
        };

        let mut text = level.general.clone().unwrap_or_default();

        if for_bond_change {
            if let Some(rules) = &level.bond_change {
                text.push('\n');
                text.push_str(rules);
            }
            return BondInstructions::Standard(names.resolve(&text));
        }

        for state in applied {
            let Some(definition) = catalog.get(state.name()) else {
                warn!(state = state.name(), "applied state missing from catalog, skipping");
                continue;
            };
            let Some(instruction) = level.per_state.get(state.name()) else {
                warn!(state = state.name(), "no instruction line for applied state, skipping");
                continue;
            };
            let label = INTENSITY_LABELS
                .get(usize::from(state.intensity()))
                .copied()
                .unwrap_or("");
            // "Nerves are a thing", not "Nerves is a thing"
            let copula = if first_word(&definition.humanized)
                .to_lowercase()
                .ends_with('s')
            {
                " "
            } else {
                " is "
            };
            text.push('\n');
            text.push_str("{{char}}");
            text.push_str(copula);
            text.push_str("currently ");
            text.push_str(label);
            text.push_str(&definition.humanized);
            text.push_str(", ");
            text.push_str(instruction);
        }

        text.push_str(CLOSING_DIRECTIVES);
        BondInstructions::Standard(names.resolve(&text))
    }

    /// Terminal outcome for the current position, if its range is marked
    /// as a dead end. Strangers never hit dead ends.
    pub fn dead_end(&self, runtime: &BondRuntime) -> Option<DeadEndOutcome<'_>> {
        if runtime.stranger {
            return None;
        }
        match self.table.processed_for(runtime.bond, false) {
            ProcessedBond::DeadEnd {
                description,
                overrides,
            } => Some(DeadEndOutcome {
                description,
                end_state: overrides.get("end").map(String::as_str),
            }),
            ProcessedBond::Standard { .. } => None,
        }
    }

    /// Whether the second bond may ascend this turn. Ascension needs a
    /// positive expected bond change and at least one ascent rule in the
    /// current sub-level; confirmation happens outside the engine.
    pub fn can_ascend_second_bond(&self, runtime: &BondRuntime, expected_change: i32) -> bool {
        if expected_change <= 0 {
            return false;
        }
        let processed = self.table.processed_for(runtime.bond, runtime.stranger);
        if processed.is_dead_end() {
            debug!(bond = runtime.bond, "dead end position cannot ascend");
            return false;
        }
        match processed.level_for(runtime.second_bond) {
            Some(level) if !level.ascent_rules.is_empty() => {
                debug!(
                    bond = runtime.bond,
                    second_bond = runtime.second_bond,
                    "second bond can ascend"
                );
                true
            }
            _ => {
                debug!(
                    bond = runtime.bond,
                    second_bond = runtime.second_bond,
                    "no ascent rules at this position"
                );
                false
            }
        }
    }

    /// Ascent questions for the current sub-level, unresolved.
    pub fn ascent_rules(&self, runtime: &BondRuntime) -> &[String] {
        let processed = self.table.processed_for(runtime.bond, runtime.stranger);
        match processed.level_for(runtime.second_bond) {
            Some(level) => &level.ascent_rules,
            None => &[],
        }
    }

    /// Applies one turn's classification to the bond position. `change`
    /// is the signed sentiment magnitude and `second_change` the
    /// confirmed ascent tally. Both outputs stay clamped to their
    /// ranges, and a stranger whose new bond magnitude or message count
    /// crosses its breakaway threshold leaves stranger mode with the
    /// bond scaled by the matching reset.
    pub fn next_bond_state(
        &self,
        current: &BondRuntime,
        change: i32,
        second_change: u32,
        mini_bonuses: u32,
    ) -> BondRuntime {
        let tuning = &self.tuning;
        let mut bond = current.bond;
        let mut second_bond = current.second_bond;
        let mut stranger = current.stranger;

        if change > 0 {
            bond += tuning.climb_rate * f64::from(change);
            if bond > 100.0 {
                bond = 100.0;
            }
        } else if change < 0 {
            bond -= tuning.climb_rate
                * tuning.negative_bias_for(stranger)
                * f64::from(change.abs());
            if bond < -100.0 {
                bond = -100.0;
            }
        } else {
            bond += tuning.climb_rate * tuning.neutral_bias_for(stranger);
        }

        if change < 0 {
            // setbacks also bleed the second bond
            second_bond -= tuning.second_climb_rate
                * tuning.second_negative_bias_for(stranger)
                * f64::from(change.abs());
            if second_bond < 0.0 {
                second_bond = 0.0;
            }
        } else if second_change > 0 {
            second_bond += tuning.second_climb_rate * f64::from(second_change);
            if second_bond > 100.0 {
                second_bond = 100.0;
            }
        }

        if change >= 0 {
            // plus-state credit counts as neutral engagement
            bond += f64::from(mini_bonuses) * tuning.climb_rate * tuning.neutral_bias_for(stranger);
        }

        if stranger {
            if bond.abs() >= f64::from(tuning.stranger_breakaway) {
                bond *= if bond < 0.0 {
                    tuning.stranger_breakaway_reset_negative
                } else {
                    tuning.stranger_breakaway_reset
                };
                stranger = false;
                debug!(bond, "stranger breakaway by bond magnitude");
            } else if current.messages_exchanged >= tuning.stranger_messages_breakaway {
                bond *= if bond < 0.0 {
                    tuning.stranger_messages_reset_negative
                } else {
                    tuning.stranger_messages_reset
                };
                stranger = false;
                debug!(bond, "stranger breakaway by message count");
            }
        }

        BondRuntime {
            bond: bond.clamp(-100.0, 100.0),
            second_bond: second_bond.clamp(0.0, 100.0),
            stranger,
            messages_exchanged: current.messages_exchanged,
        }
    }
}
