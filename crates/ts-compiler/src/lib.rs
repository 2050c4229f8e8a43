use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value as JsonValue;
use ts_core::{
    Contact, Diagnostic, Fragment, GameData, Round, RoundKey, StoryMetadata, ThreadScriptError,
    Variables,
};
use ts_parser::{
    evaluate_body, leading_condition, prescan_variables, split_passages, tokenize_body, Passage,
};

pub const INITIAL_CONTACT_TAG: &str = "initial_contact";
pub const INITIAL_VARIABLES_TAG: &str = "initial_variables";
pub const INITIAL_VARIABLES_TITLE: &str = "Initial Variables";
const STORY_TITLE: &str = "StoryTitle";
const STORY_DATA: &str = "StoryData";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileOutput {
    pub program: GameData,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl CompileOutput {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// The program, or the first structural error as a hard failure.
    pub fn into_result(self) -> Result<GameData, ThreadScriptError> {
        match self.errors.into_iter().next() {
            None => Ok(self.program),
            Some(diagnostic) => Err(diagnostic_error(diagnostic)),
        }
    }
}

fn diagnostic_error(diagnostic: Diagnostic) -> ThreadScriptError {
    match diagnostic.line() {
        Some(line) => ThreadScriptError::with_span(
            diagnostic.code,
            diagnostic.message,
            ts_core::SourceSpan::lines(line, line),
        ),
        None => ThreadScriptError::new(diagnostic.code, diagnostic.message),
    }
}

fn round_title_regex() -> &'static Regex {
    static ROUND_TITLE: OnceLock<Regex> = OnceLock::new();
    ROUND_TITLE.get_or_init(|| {
        Regex::new(r"^(\w[\w ]*)-Round-(\d+(\.\d+)?)$").expect("round title regex must compile")
    })
}

/// Splits `Eli-Round-2.1` into its contact name and round key.
pub fn parse_round_title(title: &str) -> Option<(String, RoundKey)> {
    let caps = round_title_regex().captures(title.trim())?;
    let contact = caps.get(1)?.as_str().trim().to_string();
    let key = caps.get(2)?.as_str().parse().ok()?;
    Some((contact, key))
}

/// A round-shaped title with a bad key (`A-Round-2.01`) reports the key
/// problem; anything else is simply not a round title.
fn invalid_round_title(passage: &Passage) -> Diagnostic {
    let key_error = round_title_regex()
        .captures(passage.title.trim())
        .and_then(|caps| caps.get(2))
        .and_then(|raw| raw.as_str().parse::<RoundKey>().err());
    match key_error {
        Some(error) => Diagnostic::at_line(
            error.code,
            format!(
                "Passage \"{}\" has an invalid round key ({}); ignored.",
                passage.title, error.message
            ),
            passage.line,
        ),
        None => Diagnostic::at_line(
            "ROUND_TITLE_INVALID",
            format!(
                "Passage \"{}\" is not named <Contact>-Round-<N>; ignored.",
                passage.title
            ),
            passage.line,
        ),
    }
}

fn is_initial_variables(passage: &Passage) -> bool {
    passage.has_tag(INITIAL_VARIABLES_TAG) || passage.title == INITIAL_VARIABLES_TITLE
}

/// Compiles a Twee script. Never fails outright: structural problems are
/// returned in `errors`, recoverable ones in `warnings`, and the program holds
/// whatever could be assembled.
pub fn compile(source: &str) -> CompileOutput {
    let split = split_passages(source);
    let mut output = CompileOutput {
        errors: split.errors,
        warnings: split.warnings,
        ..CompileOutput::default()
    };

    let initial_variables = initial_variables(source, &split.passages);
    let mut snapshot = initial_variables.clone();
    let mut assembler = Assembler::default();

    for passage in &split.passages {
        if passage.placeholder || is_initial_variables(passage) {
            continue;
        }
        if passage.is_metadata() {
            read_metadata(passage, &mut assembler.metadata, &mut output.warnings);
            continue;
        }
        let Some((contact, key)) = parse_round_title(&passage.title) else {
            output.warnings.push(invalid_round_title(passage));
            continue;
        };

        let tokenized = tokenize_body(&passage.content, passage.content_line());
        output.warnings.extend(tokenized.warnings);
        let evaluation = evaluate_body(&tokenized.fragments, &mut snapshot);
        let condition = if key.is_conditional() {
            leading_condition(&tokenized.fragments)
        } else {
            None
        };

        let round = Round {
            key,
            title: passage.title.clone(),
            text: evaluation.text,
            choices: evaluation.choices,
            actions: evaluation.actions,
            original_content: passage.content.clone(),
            body: tokenized.fragments,
            condition,
        };
        assembler.add_round(
            contact,
            round,
            passage.has_tag(INITIAL_CONTACT_TAG),
            passage.line,
            &mut output.errors,
        );
    }

    let mut program = assembler.finish(initial_variables);
    check_choice_targets(&program, &mut output.warnings);
    if program.metadata.start.is_none() {
        let start = program
            .contacts_in_order()
            .find_map(|contact| contact.rounds.values().next())
            .map(|round| round.title.clone());
        program.metadata.start = start;
    }

    tracing::debug!(
        contacts = program.contacts.len(),
        errors = output.errors.len(),
        warnings = output.warnings.len(),
        "compiled script"
    );
    output.program = program;
    output
}

/// Pass one: every `(set:)` in the raw text, then the values of any
/// initial-variables passage on top.
fn initial_variables(source: &str, passages: &[Passage]) -> Variables {
    let mut variables = prescan_variables(source);
    for passage in passages.iter().filter(|passage| is_initial_variables(passage)) {
        variables.extend(prescan_variables(&passage.content));
    }
    variables
}

fn read_metadata(passage: &Passage, metadata: &mut StoryMetadata, warnings: &mut Vec<Diagnostic>) {
    match passage.title.as_str() {
        STORY_TITLE => {
            let title = passage.content.trim();
            if !title.is_empty() {
                metadata.title = Some(title.to_string());
            }
        }
        STORY_DATA => match serde_json::from_str::<JsonValue>(&passage.content) {
            Ok(json) => {
                let field = |name: &str| json.get(name).and_then(JsonValue::as_str).map(str::to_string);
                metadata.start = field("start");
                metadata.format = field("format");
                metadata.ifid = field("ifid");
            }
            Err(error) => warnings.push(Diagnostic::at_line(
                "STORY_DATA_INVALID",
                format!("StoryData is not valid JSON: {}", error),
                passage.content_line(),
            )),
        },
        other => {
            tracing::debug!(passage = other, "skipping untagged passage");
        }
    }
}

#[derive(Default)]
struct Assembler {
    contacts: BTreeMap<String, Contact>,
    order: Vec<String>,
    metadata: StoryMetadata,
}

impl Assembler {
    fn add_round(
        &mut self,
        contact_name: String,
        round: Round,
        initial_contact: bool,
        line: usize,
        errors: &mut Vec<Diagnostic>,
    ) {
        if !self.contacts.contains_key(&contact_name) {
            self.order.push(contact_name.clone());
        }
        let contact = self
            .contacts
            .entry(contact_name.clone())
            .or_insert_with(|| Contact::new(contact_name));
        if initial_contact {
            contact.initially_unlocked = true;
        }
        if contact.rounds.contains_key(&round.key) {
            errors.push(Diagnostic::at_line(
                "ROUND_KEY_DUPLICATE",
                format!(
                    "Round {} of \"{}\" is defined more than once; the first definition is kept.",
                    round.key, contact.name
                ),
                line,
            ));
            return;
        }
        contact.rounds.insert(round.key, round);
    }

    fn finish(self, initial_variables: Variables) -> GameData {
        GameData {
            contacts: self.contacts,
            contact_order: self.order,
            initial_variables,
            metadata: self.metadata,
        }
    }
}

/// Every choice in every branch, not only the ones visible at compile time.
fn check_choice_targets(program: &GameData, warnings: &mut Vec<Diagnostic>) {
    for contact in program.contacts_in_order() {
        for round in contact.rounds.values() {
            for fragment in &round.body {
                let Fragment::Choice { choice } = fragment else {
                    continue;
                };
                let Some(key) = choice.target_round else {
                    continue;
                };
                if contact.round(&key).is_none() {
                    warnings.push(Diagnostic::new(
                        "CHOICE_TARGET_MISSING",
                        format!(
                            "Choice \"{}\" in \"{}\" targets \"{}\", but {} has no round {}.",
                            choice.text, round.title, choice.target, contact.name, key
                        ),
                    ));
                }
            }
        }
    }
}
