use std::collections::BTreeSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::classifier::StateDirectives;
use crate::core::error::{EngineError, Result};
use crate::core::states::StateCatalog;

pub const MAX_INTENSITY: u8 = 4;
pub const DECAY_RESET: u8 = 3;

/// A state currently applying to the character. Intensity runs 0 to 4,
/// the decay counter counts turns until the next intensity step down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedState {
    name: String,
    intensity: u8,
    decay: u8,
}

impl AppliedState {
    pub fn new(name: impl Into<String>, intensity: u8, decay: u8) -> Result<Self> {
        let state = AppliedState {
            name: name.into(),
            intensity,
            decay,
        };
        state.validate()?;
        Ok(state)
    }

    /// A state first triggered this turn.
    pub fn fresh(name: impl Into<String>) -> Self {
        AppliedState {
            name: name.into(),
            intensity: 1,
            decay: DECAY_RESET,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(EngineError::AppliedState(
                "applied state has an empty name".to_string(),
            ));
        }
        if self.intensity > MAX_INTENSITY {
            return Err(EngineError::AppliedState(format!(
                "intensity {} for state '{}' is outside 0..={}",
                self.intensity, self.name, MAX_INTENSITY
            )));
        }
        if self.decay == 0 || self.decay > DECAY_RESET {
            return Err(EngineError::AppliedState(format!(
                "decay counter {} for state '{}' is outside 1..={}",
                self.decay, self.name, DECAY_RESET
            )));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn intensity(&self) -> u8 {
        self.intensity
    }

    pub fn decay(&self) -> u8 {
        self.decay
    }
}

/// Names granted through the random-odds channel this arc. A remembered
/// state cannot be re-added by the classifier until a reroll releases it,
/// which keeps an agreeable generator from re-confirming the same spawn
/// forever.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomOddsMemory {
    remembered: BTreeSet<String>,
}

impl RandomOddsMemory {
    pub fn remembers(&self, name: &str) -> bool {
        self.remembered.contains(name)
    }

    pub fn record(&mut self, name: &str) {
        self.remembered.insert(name.to_string());
    }

    pub fn release(&mut self, name: &str) {
        self.remembered.remove(name);
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.remembered.iter()
    }

    pub fn len(&self) -> usize {
        self.remembered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remembered.is_empty()
    }
}

/// Per-turn inputs to `advance`, merged from the classifier lists and the
/// carryover sets the external emotion detector produced last turn.
#[derive(Debug, Clone, Default)]
pub struct TurnDirectives {
    pub to_add: Vec<String>,
    pub to_reduce: Vec<String>,
    pub to_remove: Vec<String>,
    pub add_if_absent: Vec<String>,
}

impl TurnDirectives {
    pub fn from_classified(
        directives: &StateDirectives,
        carry_add: &[String],
        carry_discard: &[String],
    ) -> Self {
        let mut to_add = directives.increase.clone();
        for name in &directives.add {
            if !to_add.contains(name) {
                to_add.push(name.clone());
            }
        }
        let mut to_remove = directives.remove.clone();
        for name in carry_discard {
            if !to_remove.contains(name) {
                to_remove.push(name.clone());
            }
        }
        TurnDirectives {
            to_add,
            to_reduce: directives.decrease.clone(),
            to_remove,
            add_if_absent: carry_add.to_vec(),
        }
    }
}

/// Advances the applied-state set once per conversational turn.
#[derive(Debug, Clone)]
pub struct StateEngine {
    catalog: StateCatalog,
}

impl StateEngine {
    pub fn new(catalog: StateCatalog) -> Self {
        StateEngine { catalog }
    }

    pub fn catalog(&self) -> &StateCatalog {
        &self.catalog
    }

    /// One turn of the applied set. Rolls happen in a fixed order so a
    /// seeded RNG reproduces a turn exactly: one release reroll per
    /// remembered name (name order), then one spawn roll per catalog
    /// state with odds (file order).
    pub fn advance(
        &self,
        current: &[AppliedState],
        directives: &TurnDirectives,
        memory: &mut RandomOddsMemory,
        rng: &mut impl Rng,
    ) -> Vec<AppliedState> {
        // release rerolls run at double the spawn rate
        let remembered: Vec<String> = memory.names().cloned().collect();
        for name in remembered {
            let rate = match self.catalog.get(&name) {
                Some(definition) => definition.spawn_rate,
                None => {
                    warn!(state = %name, "remembered state missing from catalog, releasing");
                    memory.release(&name);
                    continue;
                }
            };
            if rng.gen::<f64>() < rate * 2.0 {
                debug!(state = %name, "random odds memory released");
                memory.release(&name);
            }
        }

        let mut spawned: Vec<String> = Vec::new();
        for definition in self.catalog.iter() {
            if definition.spawn_rate > 0.0 && rng.gen::<f64>() < definition.spawn_rate {
                debug!(state = %definition.name, "state spawned from random odds");
                spawned.push(definition.name.clone());
                memory.record(&definition.name);
            }
        }

        let mut to_add: Vec<&str> = Vec::new();
        for name in &directives.to_add {
            let has_odds = self
                .catalog
                .get(name)
                .map_or(false, |definition| definition.spawn_rate > 0.0);
            if has_odds && memory.remembers(name) {
                warn!(state = %name, "add denied, still remembered from random odds");
                continue;
            }
            if has_odds {
                memory.record(name);
            }
            to_add.push(name);
        }

        let zeroed = |name: &str| {
            directives.to_reduce.iter().any(|n| n == name)
                || directives.to_remove.iter().any(|n| n == name)
        };
        let triggered =
            |name: &str| to_add.iter().any(|n| *n == name) || spawned.iter().any(|n| n == name);

        let mut next: Vec<AppliedState> = Vec::new();
        for state in current {
            let mut state = state.clone();
            state.decay = state.decay.saturating_sub(1);
            if state.decay == 0 {
                let step = if state.intensity == MAX_INTENSITY { 2 } else { 1 };
                state.intensity = state.intensity.saturating_sub(step);
                state.decay = DECAY_RESET;
            }
            if triggered(&state.name) {
                state.intensity = (state.intensity + 1).min(MAX_INTENSITY);
            }
            if zeroed(&state.name) {
                // removal is instant, never graded
                state.intensity = 0;
            }
            if state.intensity > 0 {
                next.push(state);
            }
        }

        let present = |list: &[AppliedState], name: &str| list.iter().any(|s| s.name == name);
        for name in to_add
            .iter()
            .copied()
            .chain(spawned.iter().map(|s| s.as_str()))
            .chain(directives.add_if_absent.iter().map(|s| s.as_str()))
        {
            if present(&next, name) || zeroed(name) {
                continue;
            }
            if !self.catalog.contains(name) {
                warn!(state = %name, "ignoring directive for unknown state");
                continue;
            }
            next.push(AppliedState::fresh(name));
        }

        next
    }

    /// Bond credit from applied plus states, granted on non-negative turns.
    pub fn mini_bonuses(&self, applied: &[AppliedState]) -> u32 {
        applied
            .iter()
            .filter(|state| {
                self.catalog
                    .get(state.name())
                    .map_or(false, |definition| definition.plus)
            })
            .map(|state| u32::from(state.intensity()))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn engine(catalog: &str) -> StateEngine {
        StateEngine::new(StateCatalog::parse(catalog).unwrap())
    }

    // StepRng at u64::MAX makes every roll fail for rates below 0.49,
    // at 0 every roll succeeds
    fn never() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    fn always() -> StepRng {
        StepRng::new(0, 0)
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert!(AppliedState::new("HAPPY", 5, 3).is_err());
        assert!(AppliedState::new("HAPPY", 2, 0).is_err());
        assert!(AppliedState::new("HAPPY", 2, 4).is_err());
        assert!(AppliedState::new("", 2, 3).is_err());
        assert!(AppliedState::new("HAPPY", 4, 3).is_ok());
    }

    #[test]
    fn decay_steps_down_and_resets() {
        let engine = engine("HAPPY\nWORRIED\n");
        let current = vec![
            AppliedState::new("HAPPY", 2, 1).unwrap(),
            AppliedState::new("WORRIED", 4, 1).unwrap(),
        ];
        let next = engine.advance(
            &current,
            &TurnDirectives::default(),
            &mut RandomOddsMemory::default(),
            &mut never(),
        );
        assert_eq!(next.len(), 2);
        assert_eq!(next[0].intensity(), 1);
        assert_eq!(next[0].decay(), DECAY_RESET);
        // the drop is doubled from max intensity
        assert_eq!(next[1].intensity(), 2);
        assert_eq!(next[1].decay(), DECAY_RESET);
    }

    #[test]
    fn drains_to_empty_within_twelve_turns() {
        let engine = engine("HAPPY\n");
        let mut states = vec![AppliedState::new("HAPPY", 4, 3).unwrap()];
        let mut memory = RandomOddsMemory::default();
        let mut turns = 0;
        while !states.is_empty() {
            states = engine.advance(&states, &TurnDirectives::default(), &mut memory, &mut never());
            turns += 1;
            assert!(turns <= 12, "applied states did not drain");
        }
        assert_eq!(turns, 9);
    }

    #[test]
    fn retrigger_increments_and_caps() {
        let engine = engine("HAPPY\n");
        let directives = TurnDirectives {
            to_add: vec!["HAPPY".to_string()],
            ..TurnDirectives::default()
        };
        let current = vec![AppliedState::new("HAPPY", 4, 3).unwrap()];
        let next = engine.advance(
            &current,
            &directives,
            &mut RandomOddsMemory::default(),
            &mut never(),
        );
        assert_eq!(next[0].intensity(), MAX_INTENSITY);
    }

    #[test]
    fn reduce_removes_instantly() {
        let engine = engine("HAPPY\n");
        let directives = TurnDirectives {
            to_reduce: vec!["HAPPY".to_string()],
            ..TurnDirectives::default()
        };
        let current = vec![AppliedState::new("HAPPY", 4, 3).unwrap()];
        let next = engine.advance(
            &current,
            &directives,
            &mut RandomOddsMemory::default(),
            &mut never(),
        );
        assert!(next.is_empty());
    }

    #[test]
    fn new_states_enter_fresh() {
        let engine = engine("HAPPY\nWORRIED\n");
        let directives = TurnDirectives {
            to_add: vec!["HAPPY".to_string()],
            add_if_absent: vec!["WORRIED".to_string()],
            ..TurnDirectives::default()
        };
        let next = engine.advance(
            &[],
            &directives,
            &mut RandomOddsMemory::default(),
            &mut never(),
        );
        assert_eq!(next.len(), 2);
        assert!(next.iter().all(|s| s.intensity() == 1 && s.decay() == DECAY_RESET));
    }

    #[test]
    fn add_if_absent_does_not_retrigger() {
        let engine = engine("WORRIED\n");
        let directives = TurnDirectives {
            add_if_absent: vec!["WORRIED".to_string()],
            ..TurnDirectives::default()
        };
        let current = vec![AppliedState::new("WORRIED", 2, 3).unwrap()];
        let next = engine.advance(
            &current,
            &directives,
            &mut RandomOddsMemory::default(),
            &mut never(),
        );
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].intensity(), 2);
    }

    #[test]
    fn concurrent_reduce_blocks_new_add() {
        let engine = engine("HAPPY\n");
        let directives = TurnDirectives {
            to_add: vec!["HAPPY".to_string()],
            to_remove: vec!["HAPPY".to_string()],
            ..TurnDirectives::default()
        };
        let next = engine.advance(
            &[],
            &directives,
            &mut RandomOddsMemory::default(),
            &mut never(),
        );
        assert!(next.is_empty());
    }

    #[test]
    fn remembered_add_is_denied() {
        let engine = engine("HAPPY=0.3\n");
        let mut memory = RandomOddsMemory::default();
        memory.record("HAPPY");
        let directives = TurnDirectives {
            to_add: vec!["HAPPY".to_string()],
            ..TurnDirectives::default()
        };
        let current = vec![AppliedState::new("HAPPY", 2, 3).unwrap()];
        let next = engine.advance(&current, &directives, &mut memory, &mut never());
        // neither added fresh nor intensity-incremented
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].intensity(), 2);
        assert!(memory.remembers("HAPPY"));
    }

    #[test]
    fn release_reroll_frees_the_name() {
        let engine = engine("HAPPY=0.3\n");
        let mut memory = RandomOddsMemory::default();
        memory.record("HAPPY");
        // forced release, and the forced spawn right after re-records it
        let next = engine.advance(&[], &TurnDirectives::default(), &mut memory, &mut always());
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].name(), "HAPPY");
        assert!(memory.remembers("HAPPY"));
    }

    #[test]
    fn spawn_records_into_memory() {
        let engine = engine("HAPPY=0.3\nWORRIED\n");
        let mut memory = RandomOddsMemory::default();
        let next = engine.advance(&[], &TurnDirectives::default(), &mut memory, &mut always());
        // only the state with odds spawns
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].name(), "HAPPY");
        assert!(memory.remembers("HAPPY"));
        assert!(!memory.remembers("WORRIED"));
    }

    #[test]
    fn unknown_directive_names_are_ignored() {
        let engine = engine("HAPPY\n");
        let directives = TurnDirectives {
            to_add: vec!["UNHEARD_OF".to_string()],
            ..TurnDirectives::default()
        };
        let next = engine.advance(
            &[],
            &directives,
            &mut RandomOddsMemory::default(),
            &mut never(),
        );
        assert!(next.is_empty());
    }

    #[test]
    fn seeded_rng_reproduces_a_turn() {
        let engine = engine("HAPPY=0.5\nWORRIED=0.5\nCURIOUS=0.5\n");
        let run = |seed: u64| {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let mut memory = RandomOddsMemory::default();
            engine.advance(&[], &TurnDirectives::default(), &mut memory, &mut rng)
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn mini_bonuses_sum_plus_intensities() {
        let engine = engine("HAPPY+\nWORRIED\nCURIOUS+\n");
        let applied = vec![
            AppliedState::new("HAPPY", 3, 3).unwrap(),
            AppliedState::new("WORRIED", 4, 3).unwrap(),
            AppliedState::new("CURIOUS", 1, 2).unwrap(),
        ];
        assert_eq!(engine.mini_bonuses(&applied), 4);
        assert_eq!(engine.mini_bonuses(&[]), 0);
    }

    #[test]
    fn merges_classifier_lists() {
        let classified = StateDirectives {
            increase: vec!["HAPPY".to_string()],
            decrease: vec!["WORRIED".to_string()],
            add: vec!["CURIOUS".to_string(), "HAPPY".to_string()],
            remove: vec!["GLOOMY".to_string()],
        };
        let carry_add = vec!["TIRED".to_string()];
        let carry_discard = vec!["RESTLESS".to_string()];
        let directives = TurnDirectives::from_classified(&classified, &carry_add, &carry_discard);
        assert_eq!(directives.to_add, vec!["HAPPY", "CURIOUS"]);
        assert_eq!(directives.to_reduce, vec!["WORRIED"]);
        assert_eq!(directives.to_remove, vec!["GLOOMY", "RESTLESS"]);
        assert_eq!(directives.add_if_absent, vec!["TIRED"]);
    }
}
