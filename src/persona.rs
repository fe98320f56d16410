use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::composer;
use crate::config::Settings;
use crate::core::{
    classify_sentiment, count_affirmative, read_state_directives, AppliedState, BondEngine,
    BondRuntime, CharacterStore, EndStateCatalog, Names, StateCatalog, StateDirectives,
    StateEngine, TurnDirectives,
};
use crate::session::{PendingAscension, SessionState};

/// What a scored turn produced.
#[derive(Debug, Clone)]
pub enum TurnReport {
    /// The position allows a second-bond ascent. The turn is held open
    /// until the questionnaire reply arrives or the next prompt lets it
    /// lapse.
    AscensionProposed {
        system_prompt: String,
        questionnaire: String,
    },
    Applied(TurnSummary),
}

#[derive(Debug, Clone)]
pub struct TurnSummary {
    pub change: i32,
    pub affirmative: u32,
    pub mini_bonuses: u32,
    pub bond: f64,
    pub second_bond: f64,
    pub stranger: bool,
    pub messages_exchanged: u32,
    pub applied_states: Vec<AppliedState>,
    pub ended: Option<String>,
}

/// One loaded character plus its live session. All mutation goes through
/// here so the prompt/score alternation and the session file stay
/// consistent.
pub struct Persona {
    character_name: String,
    bond_engine: BondEngine,
    state_engine: StateEngine,
    end_states: EndStateCatalog,
    names: Names,
    session: SessionState,
    session_file: PathBuf,
}

impl Persona {
    pub fn load(settings: &Settings) -> Result<Self> {
        let root = settings.character_root();
        let store = CharacterStore::load(&root)
            .with_context(|| format!("Failed to load character from {}", root.display()))?;
        let session_file = CharacterStore::paths(&root).session_file();

        let mut session = SessionState::load_or_new(&session_file)?;
        if session.username.is_none() {
            session.username = settings.username.clone();
        }
        let username = session
            .username
            .clone()
            .unwrap_or_else(|| "User".to_string());

        let names = Names::new(store.character_name.clone(), username);
        Ok(Persona {
            character_name: store.character_name,
            bond_engine: BondEngine::new(store.tuning, store.table),
            state_engine: StateEngine::new(store.states),
            end_states: store.end_states,
            names,
            session,
            session_file,
        })
    }

    pub fn character_name(&self) -> &str {
        &self.character_name
    }

    pub fn names(&self) -> &Names {
        &self.names
    }

    pub fn catalog(&self) -> &StateCatalog {
        self.state_engine.catalog()
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Composes the roleplay instruction block for the next generation and
    /// marks the session as awaiting a score. A pending ascension lapses
    /// here, applied as if every questionnaire answer had been NO.
    pub fn roleplay_instructions(&mut self) -> Result<String> {
        if let Some(ended) = &self.session.ended {
            info!("instructions requested after the story ended");
            return Ok(ended.clone());
        }
        if let Some(pending) = self.session.pending_ascension.take() {
            warn!("ascension proposal lapsed without a reply");
            self.apply_turn(pending.change, 0, pending.directives)?;
        }
        if !self.session.ran_post_inference_last {
            warn!("previous generation was never scored");
        }

        let runtime = self.session.runtime();
        if let Some(text) = self.ending_text(&runtime) {
            warn!(bond = runtime.bond, "bond position is a dead end, story ends");
            self.session.ended = Some(text.clone());
            self.session.save(&self.session_file)?;
            return Ok(text);
        }

        let instructions = self.bond_engine.instructions_for(
            &runtime,
            &self.session.applied_states,
            self.state_engine.catalog(),
            &self.names,
            false,
        );
        self.session.ran_post_inference_last = false;
        self.session.save(&self.session_file)?;
        Ok(instructions.text().to_string())
    }

    /// The shorter instruction rendering used as conversation context for
    /// the analysis passes.
    pub fn bond_change_instructions(&self) -> String {
        let runtime = self.session.runtime();
        let instructions = self.bond_engine.instructions_for(
            &runtime,
            &self.session.applied_states,
            self.state_engine.catalog(),
            &self.names,
            true,
        );
        instructions.text().to_string()
    }

    pub fn sentiment_prompts(&self) -> (String, &'static str) {
        (
            composer::sentiment_system_prompt(&self.names),
            composer::sentiment_confirmation_prompt(),
        )
    }

    pub fn state_analysis_prompts(&self) -> (String, &'static str) {
        (
            composer::state_analysis_system_prompt(&self.names, self.state_engine.catalog()),
            composer::state_analysis_confirmation_prompt(),
        )
    }

    /// The questionnaire for the pending ascension proposal.
    pub fn ascension_questionnaire(&self) -> Result<(String, String)> {
        if self.session.pending_ascension.is_none() {
            return Err(anyhow!("no ascension is pending; score a turn first"));
        }
        let runtime = self.session.runtime();
        let rules = self.bond_engine.ascent_rules(&runtime);
        Ok((
            composer::questionnaire_system_prompt(&self.names),
            composer::questionnaire_prompt(rules, &self.names),
        ))
    }

    /// Scores one finished generation: reads the sentiment verdict and the
    /// optional state directives, then either applies the turn or proposes
    /// a second-bond ascent.
    pub fn turn(&mut self, sentiment_text: &str, states_text: Option<&str>) -> Result<TurnReport> {
        self.ensure_active()?;
        if self.session.pending_ascension.is_some() {
            return Err(anyhow!(
                "an ascension questionnaire is pending; reply to it or compose a new prompt to let it lapse"
            ));
        }
        if self.session.ran_post_inference_last {
            return Err(anyhow!(
                "nothing to score; compose roleplay instructions first"
            ));
        }

        let change = classify_sentiment(sentiment_text);
        let directives = match states_text {
            Some(text) => read_state_directives(text, self.state_engine.catalog()),
            None => StateDirectives::default(),
        };

        // one user message and one reply per scored generation
        self.session.messages_exchanged += 2;

        let runtime = self.session.runtime();
        if self.bond_engine.can_ascend_second_bond(&runtime, change) {
            let rules = self.bond_engine.ascent_rules(&runtime);
            let system_prompt = composer::questionnaire_system_prompt(&self.names);
            let questionnaire = composer::questionnaire_prompt(rules, &self.names);
            self.session.pending_ascension = Some(PendingAscension { change, directives });
            self.session.save(&self.session_file)?;
            info!(change, "ascension proposed, awaiting questionnaire reply");
            return Ok(TurnReport::AscensionProposed {
                system_prompt,
                questionnaire,
            });
        }

        let summary = self.apply_turn(change, 0, directives)?;
        Ok(TurnReport::Applied(summary))
    }

    /// Applies the held turn with the questionnaire reply tallied in.
    pub fn ascent_reply(&mut self, reply: &str) -> Result<TurnSummary> {
        self.ensure_active()?;
        let pending = self
            .session
            .pending_ascension
            .take()
            .ok_or_else(|| anyhow!("no ascension is pending"))?;
        let tally = count_affirmative(reply);
        info!(tally, "ascension questionnaire scored");
        self.apply_turn(pending.change, tally, pending.directives)
    }

    /// Queues emotion-trigger names for the next turn. Added names enter
    /// the applied set if absent, discarded names are removed.
    pub fn record_emotion_triggers(
        &mut self,
        add: Vec<String>,
        discard: Vec<String>,
    ) -> Result<()> {
        self.ensure_active()?;
        let add: Vec<String> = add.into_iter().map(|n| n.to_uppercase()).collect();
        let discard: Vec<String> = discard.into_iter().map(|n| n.to_uppercase()).collect();
        for name in add.iter().chain(discard.iter()) {
            if !self.state_engine.catalog().contains(name) {
                return Err(anyhow!("unknown state: {}", name));
            }
        }
        // the most recent sign wins for a name queued both ways
        for name in add {
            self.session.carry_discard.retain(|queued| queued != &name);
            if !self.session.carry_add.contains(&name) {
                self.session.carry_add.push(name);
            }
        }
        for name in discard {
            self.session.carry_add.retain(|queued| queued != &name);
            if !self.session.carry_discard.contains(&name) {
                self.session.carry_discard.push(name);
            }
        }
        self.session.save(&self.session_file)?;
        Ok(())
    }

    /// Archives the current session file and starts a fresh session.
    pub fn reset(&mut self, username: Option<String>) -> Result<Option<PathBuf>> {
        let archived = SessionState::archive(&self.session_file)?;
        let mut fresh = SessionState::new();
        fresh.username = username.or_else(|| self.session.username.clone());
        self.names.user = fresh
            .username
            .clone()
            .unwrap_or_else(|| "User".to_string());
        self.session = fresh;
        self.session.save(&self.session_file)?;
        info!("session reset");
        Ok(archived)
    }

    fn ensure_active(&self) -> Result<()> {
        match &self.session.ended {
            Some(_) => Err(anyhow!("the story has ended; reset the session to begin again")),
            None => Ok(()),
        }
    }

    fn ending_text(&self, runtime: &BondRuntime) -> Option<String> {
        let outcome = self.bond_engine.dead_end(runtime)?;
        let text = match outcome.end_state.and_then(|name| self.end_states.get(name)) {
            Some(definition) => {
                definition.human_readable(&self.names.character, &self.names.user)
            }
            None => self.names.resolve(outcome.description),
        };
        Some(text)
    }

    fn apply_turn(
        &mut self,
        change: i32,
        second_change: u32,
        directives: StateDirectives,
    ) -> Result<TurnSummary> {
        let turn_directives = TurnDirectives::from_classified(
            &directives,
            &self.session.carry_add,
            &self.session.carry_discard,
        );
        let mut rng = SmallRng::from_entropy();
        let advanced = self.state_engine.advance(
            &self.session.applied_states,
            &turn_directives,
            &mut self.session.random_odds_memory,
            &mut rng,
        );
        let mini_bonuses = self.state_engine.mini_bonuses(&advanced);

        let runtime = self.bond_engine.next_bond_state(
            &self.session.runtime(),
            change,
            second_change,
            mini_bonuses,
        );
        self.session.apply_runtime(runtime);
        self.session.applied_states = advanced;
        self.session.carry_add.clear();
        self.session.carry_discard.clear();
        self.session.pending_ascension = None;
        self.session.ran_post_inference_last = true;

        if let Some(text) = self.ending_text(&runtime) {
            warn!(bond = runtime.bond, "bond position reached a dead end");
            self.session.ended = Some(text);
        }
        self.session.save(&self.session_file)?;

        info!(
            change,
            bond = runtime.bond,
            second_bond = runtime.second_bond,
            stranger = runtime.stranger,
            "turn applied"
        );
        Ok(TurnSummary {
            change,
            affirmative: second_change,
            mini_bonuses,
            bond: runtime.bond,
            second_bond: runtime.second_bond,
            stranger: runtime.stranger,
            messages_exchanged: runtime.messages_exchanged,
            applied_states: self.session.applied_states.clone(),
            ended: self.session.ended.clone(),
        })
    }
}
