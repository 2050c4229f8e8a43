use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value as JsonValue;
use ts_core::{Diagnostic, Position, Size};

/// One `:: Title [tags] {meta}` section of a Twee source.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub title: String,
    pub tags: Vec<String>,
    pub content: String,
    pub position: Option<Position>,
    pub size: Option<Size>,
    /// 1-based line of the header.
    pub line: usize,
    /// Set when the header could not be read and the title was synthesized.
    pub placeholder: bool,
    has_tag_list: bool,
    content_start: usize,
}

impl Passage {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }

    /// Headers without a bracketed tag list (`StoryTitle`, `StoryData`, …)
    /// describe the story rather than a round.
    pub fn is_metadata(&self) -> bool {
        !self.has_tag_list
    }

    /// Line of the first non-blank content line.
    pub fn content_line(&self) -> usize {
        self.content_start
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitPassages {
    pub passages: Vec<Passage>,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

fn header_regex() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(
            r"^::\s*(?P<title>[^\[\]\{\}]*?)\s*(?:\[(?P<tags>[^\[\]]*)\])?\s*(?P<meta>\{.*\})?\s*$",
        )
        .expect("passage header regex must compile")
    })
}

pub fn split_passages(source: &str) -> SplitPassages {
    let mut result = SplitPassages::default();
    let mut current: Option<(Passage, Vec<&str>)> = None;
    let mut preamble = false;

    for (index, raw_line) in source.lines().enumerate() {
        let line_number = index + 1;
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

        if line.starts_with("::") {
            if let Some((passage, lines)) = current.take() {
                result.passages.push(finish_passage(passage, &lines));
            }
            let passage = parse_header(line, line_number, &mut result);
            current = Some((passage, Vec::new()));
            continue;
        }

        match current.as_mut() {
            Some((_, lines)) => lines.push(line),
            None => {
                if !line.trim().is_empty() {
                    preamble = true;
                }
            }
        }
    }

    if let Some((passage, lines)) = current.take() {
        result.passages.push(finish_passage(passage, &lines));
    }

    if preamble {
        result.warnings.push(Diagnostic::at_line(
            "PASSAGE_PREAMBLE_IGNORED",
            "Text before the first passage header is ignored.",
            1,
        ));
    }

    result
}

fn finish_passage(mut passage: Passage, lines: &[&str]) -> Passage {
    let start = lines
        .iter()
        .position(|line| !line.trim().is_empty())
        .unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map(|index| index + 1)
        .unwrap_or(start);
    passage.content_start = passage.line + 1 + start;
    passage.content = lines[start..end.max(start)].join("\n");
    passage
}

fn parse_header(line: &str, line_number: usize, result: &mut SplitPassages) -> Passage {
    let Some(caps) = header_regex().captures(line) else {
        result.errors.push(Diagnostic::at_line(
            "PASSAGE_HEADER_INVALID",
            format!("Malformed passage header \"{}\".", line.trim()),
            line_number,
        ));
        return placeholder(line_number);
    };

    let title = caps
        .name("title")
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    if title.is_empty() {
        result.errors.push(Diagnostic::at_line(
            "PASSAGE_TITLE_EMPTY",
            "Passage header has no title.",
            line_number,
        ));
        return placeholder(line_number);
    }

    let has_tag_list = caps.name("tags").is_some();
    let mut tags: Vec<String> = Vec::new();
    if let Some(raw_tags) = caps.name("tags") {
        for tag in raw_tags.as_str().split_whitespace() {
            if !tags.iter().any(|existing| existing == tag) {
                tags.push(tag.to_string());
            }
        }
    }

    let mut passage = Passage {
        title,
        tags,
        content: String::new(),
        position: None,
        size: None,
        line: line_number,
        placeholder: false,
        has_tag_list,
        content_start: line_number + 1,
    };

    if let Some(meta) = caps.name("meta") {
        match serde_json::from_str::<JsonValue>(meta.as_str()) {
            Ok(json) => {
                passage.position = json
                    .get("position")
                    .and_then(JsonValue::as_str)
                    .and_then(parse_pair)
                    .map(|(x, y)| Position { x, y });
                passage.size = json
                    .get("size")
                    .and_then(JsonValue::as_str)
                    .and_then(parse_pair)
                    .map(|(w, h)| Size { w, h });
            }
            Err(error) => result.warnings.push(Diagnostic::at_line(
                "PASSAGE_METADATA_INVALID",
                format!(
                    "Passage \"{}\" has unreadable metadata: {}",
                    passage.title, error
                ),
                line_number,
            )),
        }
    }

    passage
}

fn placeholder(line_number: usize) -> Passage {
    Passage {
        title: format!("Untitled Passage {}", line_number),
        tags: Vec::new(),
        content: String::new(),
        position: None,
        size: None,
        line: line_number,
        placeholder: true,
        has_tag_list: false,
        content_start: line_number + 1,
    }
}

fn parse_pair(raw: &str) -> Option<(f64, f64)> {
    let (a, b) = raw.split_once(',')?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}
