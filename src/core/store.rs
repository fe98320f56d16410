use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::core::bonds::BondTable;
use crate::core::error::{EngineError, Result};
use crate::core::states::{EndStateCatalog, StateCatalog};
use crate::core::tuning::BondTuning;

/// File layout inside one character's directory.
#[derive(Debug, Clone)]
pub struct CharacterPaths {
    root: PathBuf,
}

impl CharacterPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CharacterPaths { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name_file(&self) -> PathBuf {
        self.root.join("name.txt")
    }

    pub fn bonds_dir(&self) -> PathBuf {
        self.root.join("bonds")
    }

    pub fn tuning_file(&self) -> PathBuf {
        self.bonds_dir().join("config.json")
    }

    pub fn states_file(&self) -> PathBuf {
        self.root.join("states.txt")
    }

    pub fn end_states_file(&self) -> PathBuf {
        self.root.join("end_states.txt")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn session_file(&self) -> PathBuf {
        self.logs_dir().join("last.json")
    }
}

/// Every validated configuration artifact for one character. Loading
/// checks the whole directory up front, so a constructed store is always
/// internally consistent.
#[derive(Debug, Clone)]
pub struct CharacterStore {
    pub character_name: String,
    pub tuning: BondTuning,
    pub states: StateCatalog,
    pub end_states: EndStateCatalog,
    pub table: BondTable,
}

impl CharacterStore {
    /// Load a character from its directory, failing on the first
    /// inconsistency.
    pub fn load(root: &Path) -> Result<CharacterStore> {
        let paths = CharacterPaths::new(root);

        let character_name = fs::read_to_string(paths.name_file())
            .map_err(|e| {
                EngineError::Character(format!(
                    "cannot read character name from '{}': {}",
                    paths.name_file().display(),
                    e
                ))
            })?
            .trim()
            .to_string();
        if character_name.is_empty() {
            return Err(EngineError::Character(format!(
                "character name in '{}' is empty",
                paths.name_file().display()
            )));
        }

        let tuning = BondTuning::load(&paths.tuning_file())?;
        let states = StateCatalog::load(&paths.states_file())?;
        let end_states = EndStateCatalog::load(&paths.end_states_file())?;
        let table = BondTable::load(&paths.bonds_dir(), &states, &end_states)?;

        info!(
            character = %character_name,
            states = states.len(),
            ranges = table.range_count(),
            "character configuration loaded"
        );

        Ok(CharacterStore {
            character_name,
            tuning,
            states,
            end_states,
            table,
        })
    }

    pub fn paths(root: &Path) -> CharacterPaths {
        CharacterPaths::new(root)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::tuning;
    use tempfile::TempDir;

    /// Writes a minimal but complete character directory.
    pub(crate) fn write_character(root: &Path) {
        fs::write(root.join("name.txt"), "Mika\n").unwrap();
        fs::write(root.join("states.txt"), "HAPPY+\nWORRIED\n!CURIOUS=0.1\n").unwrap();
        fs::write(
            root.join("end_states.txt"),
            "HEARTBREAK: {{char}} can no longer bear to speak with {{user}}.\n",
        )
        .unwrap();

        let bonds = root.join("bonds");
        fs::create_dir_all(&bonds).unwrap();
        let tuning_json = serde_json::to_string_pretty(&tuning::tests::sample()).unwrap();
        fs::write(bonds.join("config.json"), tuning_json).unwrap();

        fs::write(
            bonds.join("-100_-80.txt"),
            "!{{char}} refuses to see {{user}} again.\n!end: HEARTBREAK\n",
        )
        .unwrap();
        fs::write(
            bonds.join("-80_0.txt"),
            "?0\n\
             *: {{char}} is wary of {{user}}.\n\
             HAPPY: a rare smile slips through.\n\
             WORRIED: worry shows openly.\n\
             CURIOUS: asks pointed questions.\n",
        )
        .unwrap();
        fs::write(
            bonds.join("0_100.txt"),
            "?0\n\
             *: {{char}} warms up to {{user}}.\n\
             HAPPY: smiles often.\n\
             WORRIED: hides worry behind a grin.\n\
             CURIOUS: leans in to listen.\n\
             **: Focus on sincerity over grand gestures.\n\
             > Did {{char}} share something personal with {{user}}?\n\
             ?50\n\
             *: {{char}} trusts {{user}} deeply.\n\
             HAPPY: beams with joy.\n\
             WORRIED: asks {{user}} for help.\n\
             CURIOUS: plans adventures together.\n",
        )
        .unwrap();
        fs::write(
            bonds.join("stranger.txt"),
            "?0\n\
             *: {{char}} does not know {{user}} yet.\n\
             HAPPY: offers a polite smile.\n\
             WORRIED: keeps a careful distance.\n\
             CURIOUS: steals glances.\n",
        )
        .unwrap();
        fs::write(
            bonds.join("stranger_bad.txt"),
            "?0\n\
             *: {{char}} distrusts {{user}}.\n\
             HAPPY: no smile at all.\n\
             WORRIED: visibly tense.\n\
             CURIOUS: interrogates instead of asking.\n",
        )
        .unwrap();
    }

    #[test]
    fn loads_a_complete_character() {
        let dir = TempDir::new().unwrap();
        write_character(dir.path());
        let store = CharacterStore::load(dir.path()).unwrap();
        assert_eq!(store.character_name, "Mika");
        assert_eq!(store.states.len(), 3);
        assert_eq!(store.table.range_count(), 3);
        assert!(store.end_states.contains("HEARTBREAK"));
    }

    #[test]
    fn missing_name_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        write_character(dir.path());
        fs::remove_file(dir.path().join("name.txt")).unwrap();
        let err = CharacterStore::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("character name"));
    }

    #[test]
    fn empty_name_is_fatal() {
        let dir = TempDir::new().unwrap();
        write_character(dir.path());
        fs::write(dir.path().join("name.txt"), "  \n").unwrap();
        let err = CharacterStore::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("is empty"));
    }

    #[test]
    fn bond_files_must_cover_the_catalog() {
        let dir = TempDir::new().unwrap();
        write_character(dir.path());
        // grow the catalog without touching the bond files
        fs::write(
            dir.path().join("states.txt"),
            "HAPPY+\nWORRIED\n!CURIOUS=0.1\nGLOOMY\n",
        )
        .unwrap();
        let err = CharacterStore::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("'GLOOMY' not found"));
    }

    #[test]
    fn paths_follow_the_directory_layout() {
        let paths = CharacterPaths::new("/tmp/mika");
        assert!(paths.tuning_file().ends_with("bonds/config.json"));
        assert!(paths.session_file().ends_with("logs/last.json"));
        assert!(paths.states_file().ends_with("states.txt"));
        assert!(paths.end_states_file().ends_with("end_states.txt"));
        assert!(paths.name_file().ends_with("name.txt"));
    }
}
