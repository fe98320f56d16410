use crate::core::{Names, StateCatalog};

/// System instructions for the sentiment analysis pass. The analyser model
/// must answer with one of the starred phrases `classify_sentiment` knows
/// how to read.
pub fn sentiment_system_prompt(names: &Names) -> String {
    format!(
        "You are an assistant that analyses conversations between {} and {}.\
         \n\nYou MUST respond with:\
         \n\n*The interaction was Positive*\
         \n*The interaction was Negative*\
         \n*The interaction was very Positive*\
         \n*The interaction was very Negative*\
         \n*The interaction was extremely Positive*\
         \n*The interaction was extremely Negative*\
         \n*The interaction was Neutral*\
         \n\nExactly those phrases, only output one; on whether the interaction \
         was positive, negative or neutral, consider the tone, content, and \
         emotional context of the message in your analysis.",
        names.character, names.user
    )
}

/// Final user-side nudge for the sentiment pass.
pub fn sentiment_confirmation_prompt() -> &'static str {
    "Your classification (output ONLY one of the exact phrases): \
     *The interaction was Positive* | *The interaction was Negative* | \
     *The interaction was very Positive* | *The interaction was very Negative* | \
     *The interaction was extremely Positive* | *The interaction was extremely Negative* | \
     *The interaction was Neutral*"
}

/// System instructions for the ascension questionnaire pass.
pub fn questionnaire_system_prompt(names: &Names) -> String {
    format!(
        "You are an assistant that analyses conversations between {} and {}.\
         \n\nYou MUST respond with:\"YES\" or \"NO\" each of the questions given, \
         do not explain your answers, simply output in the format. \
         \n\n1. YES, 2. NO, etc. to the questions. that come after QUESTIONS:",
        names.character, names.user
    )
}

/// The numbered questionnaire built from a sub-level's ascent rules, with
/// name placeholders resolved.
pub fn questionnaire_prompt(questions: &[String], names: &Names) -> String {
    let mut formatted = String::new();
    for (i, question) in questions.iter().enumerate() {
        formatted.push_str(&format!("{}. {}\n", i + 1, names.resolve(question)));
    }
    format!(
        "QUESTIONS:\n\n{}\n\nYour response should be in the format: \
         1. YES or NO, 2. YES or NO, etc. Answer the questions",
        formatted
    )
}

/// System instructions for the behavioral-state analysis pass. The analyser
/// answers with one directive per line, which `read_state_directives`
/// parses back.
pub fn state_analysis_system_prompt(names: &Names, catalog: &StateCatalog) -> String {
    let known_states = catalog.names().collect::<Vec<_>>().join("\n");
    format!(
        "You are an assistant that analyses conversations between {} and {}.\
         \n\nYou MUST respond with one directive per line, in the format:\
         \n\nIncrease <STATE>\nDecrease <STATE>\nAdd <STATE>\nRemove <STATE>\
         \n\nOnly use these states:\n\n{}\
         \n\nDo not explain your answers, do not write narration, output the \
         directives only.",
        names.character, names.user, known_states
    )
}

/// Final user-side nudge for the state analysis pass.
pub fn state_analysis_confirmation_prompt() -> &'static str {
    "Your directives (one per line, nothing else): \
     Increase <STATE> | Decrease <STATE> | Add <STATE> | Remove <STATE>"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Names {
        Names::new("Mika", "Alex")
    }

    #[test]
    fn sentiment_system_prompt_lists_every_phrase() {
        let prompt = sentiment_system_prompt(&names());
        assert!(prompt.starts_with(
            "You are an assistant that analyses conversations between Mika and Alex."
        ));
        for phrase in [
            "*The interaction was Positive*",
            "*The interaction was Negative*",
            "*The interaction was very Positive*",
            "*The interaction was very Negative*",
            "*The interaction was extremely Positive*",
            "*The interaction was extremely Negative*",
            "*The interaction was Neutral*",
        ] {
            assert!(prompt.contains(phrase), "missing {phrase}");
        }
        assert!(prompt.ends_with("in your analysis."));
    }

    #[test]
    fn sentiment_confirmation_is_single_line() {
        let prompt = sentiment_confirmation_prompt();
        assert!(prompt.starts_with("Your classification"));
        assert!(!prompt.contains('\n'));
    }

    #[test]
    fn questionnaire_numbers_and_resolves() {
        let questions = vec![
            "Does {{char}} trust {{user}}?".to_string(),
            "Was the moment sincere?".to_string(),
        ];
        let prompt = questionnaire_prompt(&questions, &names());
        assert!(prompt.starts_with("QUESTIONS:\n\n1. Does Mika trust Alex?\n2. Was the moment sincere?\n"));
        assert!(prompt.ends_with("1. YES or NO, 2. YES or NO, etc. Answer the questions"));
    }

    #[test]
    fn questionnaire_system_prompt_demands_yes_no() {
        let prompt = questionnaire_system_prompt(&names());
        assert!(prompt.contains("\"YES\" or \"NO\""));
        assert!(prompt.ends_with("QUESTIONS:"));
    }

    #[test]
    fn state_analysis_prompt_lists_known_states() {
        let catalog = StateCatalog::parse("HAPPY+\nSELF_DOUBT\n").unwrap();
        let prompt = state_analysis_system_prompt(&names(), &catalog);
        // the plus flag stays out of the advertised names
        assert!(prompt.contains("HAPPY\nSELF_DOUBT"));
        assert!(prompt.contains("Increase <STATE>"));
        assert!(prompt.contains("do not write narration"));
    }
}
