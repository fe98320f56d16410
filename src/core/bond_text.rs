use std::collections::BTreeMap;

use crate::core::error::{EngineError, Result};

/// Half-open `[min, max)` interval encoded in a `<min>_<max>.txt` filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BondRange {
    pub min: i32,
    pub max: i32,
}

impl BondRange {
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let invalid = || EngineError::Range(format!(
            "invalid bond file name '{}', should be in format '<min>_<max>.txt'",
            file_name
        ));
        let stem = file_name.strip_suffix(".txt").ok_or_else(invalid)?;
        let (min_raw, max_raw) = stem.split_once('_').ok_or_else(invalid)?;
        let min: i32 = min_raw.parse().map_err(|_| invalid())?;
        let max: i32 = max_raw.parse().map_err(|_| invalid())?;
        if !(-100..=100).contains(&min) || !(-100..=100).contains(&max) || min >= max {
            return Err(EngineError::Range(format!(
                "invalid bond range in file name '{}', values should be between -100 and 100 and min < max",
                file_name
            )));
        }
        Ok(BondRange { min, max })
    }

    pub fn contains(&self, bond: f64) -> bool {
        bond >= f64::from(self.min) && bond < f64::from(self.max)
    }
}

/// One `?level` section of a bond text.
#[derive(Debug, Clone, Default)]
pub struct SubLevel {
    /// Text of the `*:` line. Presence is validated per level.
    pub general: Option<String>,
    /// Instruction text keyed by state name.
    pub per_state: BTreeMap<String, String>,
    /// Questions gating ascent to the next level.
    pub ascent_rules: Vec<String>,
    /// Text of the optional `**:` line.
    pub bond_change: Option<String>,
}

/// Parsed body of one bond text file.
#[derive(Debug, Clone)]
pub enum ProcessedBond {
    Standard {
        /// Sub-levels keyed by their second-bond threshold, first key 0.
        levels: BTreeMap<u32, SubLevel>,
    },
    DeadEnd {
        description: String,
        /// Keyed `!key: value` lines; `end` names the terminal state.
        overrides: BTreeMap<String, String>,
    },
}

impl ProcessedBond {
    pub fn is_dead_end(&self) -> bool {
        matches!(self, ProcessedBond::DeadEnd { .. })
    }

    /// Sub-level bucket covering `second_bond`. Buckets span from their
    /// key up to the next key; the last bucket extends through 100.
    pub fn level_for(&self, second_bond: f64) -> Option<&SubLevel> {
        let levels = match self {
            ProcessedBond::Standard { levels } => levels,
            ProcessedBond::DeadEnd { .. } => return None,
        };
        let key = second_bond.clamp(0.0, 100.0) as u32;
        levels.range(..=key).next_back().map(|(_, level)| level)
    }

    /// Parses the line grammar. `file` names the source in errors.
    ///
    /// A file whose first content line starts with `!` is a dead end:
    /// `!key: value` lines become overrides, everything else joins the
    /// description. Otherwise lines belong to `?level` sections holding
    /// `>` ascent rules and `key: text` instruction lines.
    pub fn parse(file: &str, text: &str) -> Result<Self> {
        let fail = |message: String| EngineError::BondFile {
            file: file.to_string(),
            message,
        };

        let mut levels: BTreeMap<u32, SubLevel> = BTreeMap::new();
        let mut current_level: Option<u32> = None;
        let mut dead_end: Option<(Vec<String>, BTreeMap<String, String>)> = None;
        let mut saw_content = false;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((ref mut description, ref mut overrides)) = dead_end {
                if let Some(rest) = line.strip_prefix('!') {
                    match rest.split_once(':') {
                        Some((key, value)) => {
                            overrides.insert(key.trim().to_string(), value.trim().to_string());
                        }
                        None => {
                            if !rest.trim().is_empty() {
                                description.push(rest.trim().to_string());
                            }
                        }
                    }
                } else {
                    description.push(line.to_string());
                }
                saw_content = true;
                continue;
            }

            if let Some(rest) = line.strip_prefix('!') {
                if saw_content {
                    return Err(fail(format!(
                        "dead end marker '{}' must open the file",
                        line
                    )));
                }
                let mut description = Vec::new();
                let mut overrides = BTreeMap::new();
                match rest.split_once(':') {
                    Some((key, value)) => {
                        overrides.insert(key.trim().to_string(), value.trim().to_string());
                    }
                    None => {
                        if !rest.trim().is_empty() {
                            description.push(rest.trim().to_string());
                        }
                    }
                }
                dead_end = Some((description, overrides));
                saw_content = true;
                continue;
            }
            saw_content = true;

            if let Some(rest) = line.strip_prefix('?') {
                let next_level: u32 = rest.trim().parse().map_err(|_| {
                    fail(format!("invalid second bond level indicator '{}'", line))
                })?;
                if next_level > 100 {
                    return Err(fail(format!(
                        "invalid second bond level indicator '{}', must be between 0 and 100",
                        line
                    )));
                }
                match current_level {
                    None => {
                        if next_level != 0 {
                            return Err(fail(format!(
                                "first second bond level indicator must be 0, found '{}'",
                                line
                            )));
                        }
                    }
                    Some(previous) => {
                        if next_level < previous {
                            return Err(fail(format!(
                                "second bond level indicators must be in ascending order, found '{}' after level {}",
                                line, previous
                            )));
                        }
                        if next_level == previous {
                            return Err(fail(format!(
                                "duplicate second bond level indicator '{}'",
                                line
                            )));
                        }
                        if levels[&previous].ascent_rules.is_empty() {
                            return Err(fail(format!(
                                "second bond level {} must have at least one ascent rule",
                                previous
                            )));
                        }
                    }
                }
                current_level = Some(next_level);
                levels.insert(next_level, SubLevel::default());
                continue;
            }

            if let Some(rest) = line.strip_prefix('>') {
                let level = current_level.ok_or_else(|| {
                    fail(format!(
                        "ascent rule '{}' found before any second bond level indicator",
                        line
                    ))
                })?;
                if let Some(sub_level) = levels.get_mut(&level) {
                    sub_level.ascent_rules.push(rest.trim().to_string());
                }
                continue;
            }

            if let Some((key, value)) = line.split_once(':') {
                let level = current_level.ok_or_else(|| {
                    fail(format!(
                        "instruction line '{}' found before any second bond level indicator",
                        line
                    ))
                })?;
                let key = key.trim();
                let value = value.trim().to_string();
                if let Some(sub_level) = levels.get_mut(&level) {
                    match key {
                        "*" => sub_level.general = Some(value),
                        "**" => sub_level.bond_change = Some(value),
                        _ => {
                            sub_level.per_state.insert(key.to_string(), value);
                        }
                    }
                }
                continue;
            }

            // bare prose outside the grammar is dropped, matching the
            // tolerance for hand-edited files
            tracing::debug!(file, line, "ignoring unmarked line in bond text");
        }

        match dead_end {
            Some((description, overrides)) => Ok(ProcessedBond::DeadEnd {
                description: description.join("\n"),
                overrides,
            }),
            None => {
                if levels.is_empty() {
                    return Err(fail(
                        "bond text must declare at least one second bond level".to_string(),
                    ));
                }
                Ok(ProcessedBond::Standard { levels })
            }
        }
    }
}
