pub mod applied;
pub mod bond_text;
pub mod bonds;
pub mod classifier;
pub mod error;
pub mod states;
pub mod store;
pub mod tuning;

pub use applied::{AppliedState, RandomOddsMemory, StateEngine, TurnDirectives};
pub use bond_text::{BondRange, ProcessedBond, SubLevel};
pub use bonds::{BondEngine, BondInstructions, BondRuntime, BondTable, DeadEndOutcome, Names};
pub use classifier::{classify_sentiment, count_affirmative, read_state_directives, StateDirectives};
pub use error::{EngineError, Result};
pub use states::{EndStateCatalog, EndStateDefinition, StateCatalog, StateDefinition};
pub use store::{CharacterPaths, CharacterStore};
pub use tuning::BondTuning;
