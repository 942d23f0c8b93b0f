//! Parser for human-authored decision records (Nygard and MADR layouts).

use crate::error::{DecisionError, Result};
use crate::infer::content_hash;
use lore_protocol::{Consequences, Decision, DecisionSource, EvidencePointer};
use regex::Regex;
use serde_yaml::Value;
use std::sync::OnceLock;

const DECISION_DIRS: &[&str] = &[
    "adr",
    "adrs",
    "decisions",
    "decision-records",
    "architecture-decisions",
];

const SKIPPED_STEMS: &[&str] = &["readme", "index", "toc", "summary"];

const NEGATIVE_CUES: &[&str] = &[
    "risk",
    "harder",
    "cost",
    "slower",
    "complex",
    "lose",
    "drawback",
    "downside",
    "overhead",
    "burden",
    "difficult",
    "must maintain",
];

/// Whether `rel_path` looks like a decision record by location or name.
pub fn is_decision_document(rel_path: &str) -> bool {
    let lower = rel_path.to_ascii_lowercase();
    let Some((dirs, name)) = split_name(&lower) else {
        return false;
    };
    let Some(stem) = name
        .strip_suffix(".md")
        .or_else(|| name.strip_suffix(".markdown"))
    else {
        return false;
    };
    if SKIPPED_STEMS.contains(&stem) || stem.contains("template") {
        return false;
    }
    stem.starts_with("adr-")
        || stem.starts_with("adr_")
        || dirs.split('/').any(|dir| DECISION_DIRS.contains(&dir))
}

fn split_name(rel_path: &str) -> Option<(&str, &str)> {
    match rel_path.rsplit_once('/') {
        Some((dirs, name)) => Some((dirs, name)),
        None if !rel_path.is_empty() => Some(("", rel_path)),
        None => None,
    }
}

#[derive(Debug, Default)]
struct FrontMatter {
    title: Option<String>,
    status: Option<String>,
    id: Option<String>,
    tags: Vec<String>,
}

impl FrontMatter {
    /// Front matter is optional metadata: anything malformed is dropped with a warning
    /// and the record is still read from its body.
    fn read(rel_path: &str, yaml: &str) -> Self {
        let value: Value = match serde_yaml::from_str(yaml) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("{rel_path}: ignoring malformed front matter: {err}");
                return Self::default();
            }
        };
        let Value::Mapping(map) = value else {
            log::warn!("{rel_path}: ignoring front matter that is not a mapping");
            return Self::default();
        };
        let field = |key: &str| {
            let value = map.get(key)?;
            let text = scalar(value);
            if text.is_none() {
                log::warn!("{rel_path}: ignoring non-scalar front matter field '{key}'");
            }
            text
        };
        Self {
            title: field("title"),
            status: field("status"),
            id: field("id"),
            tags: map.get("tags").map(|tags| tag_list(rel_path, tags)).unwrap_or_default(),
        }
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// `tags` may be a list or a single comma separated string.
fn tag_list(rel_path: &str, value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Sequence(items) => items.iter().filter_map(scalar).collect(),
        Value::Null => Vec::new(),
        other => match scalar(other) {
            Some(text) => text.split(',').map(str::to_string).collect(),
            None => {
                log::warn!("{rel_path}: ignoring unreadable front matter tags");
                Vec::new()
            }
        },
    };
    raw.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Status,
    Context,
    Decision,
    Alternatives,
    Consequences,
    Positive,
    Negative,
    Other,
}

fn section_for(heading: &str) -> Option<Section> {
    let heading = heading.trim().trim_end_matches(':').trim().to_lowercase();
    let section = match heading.as_str() {
        "status" => Section::Status,
        "context" | "context and problem statement" | "problem statement" | "background" => {
            Section::Context
        }
        "decision" | "decision outcome" | "chosen option" => Section::Decision,
        "considered options" | "alternatives" | "alternatives considered"
        | "options considered" | "options" => Section::Alternatives,
        "consequences" => Section::Consequences,
        "positive consequences" | "positive" | "pros" | "advantages" => Section::Positive,
        "negative consequences" | "negative" | "cons" | "disadvantages" | "drawbacks" => {
            Section::Negative
        }
        _ => return None,
    };
    Some(section)
}

#[derive(Debug, Default)]
struct Sections {
    title: Option<(usize, String)>,
    status: Vec<String>,
    context: Vec<String>,
    decision: Vec<String>,
    alternatives: Vec<String>,
    consequences: Vec<String>,
    positive: Vec<String>,
    negative: Vec<String>,
}

impl Sections {
    fn lines_mut(&mut self, section: Section) -> Option<&mut Vec<String>> {
        match section {
            Section::Status => Some(&mut self.status),
            Section::Context => Some(&mut self.context),
            Section::Decision => Some(&mut self.decision),
            Section::Alternatives => Some(&mut self.alternatives),
            Section::Consequences => Some(&mut self.consequences),
            Section::Positive => Some(&mut self.positive),
            Section::Negative => Some(&mut self.negative),
            Section::Preamble | Section::Other => None,
        }
    }
}

fn split_sections(body: &str, line_offset: usize) -> Sections {
    let mut sections = Sections::default();
    let mut current = Section::Preamble;
    for (idx, line) in body.lines().enumerate() {
        let trimmed = line.trim_start();
        if let Some(title) = trimmed.strip_prefix("# ") {
            if sections.title.is_none() {
                sections.title = Some((idx + 1 + line_offset, title.trim().to_string()));
            }
            continue;
        }
        if let Some(heading) = trimmed.strip_prefix("## ") {
            current = section_for(heading).unwrap_or(Section::Other);
            continue;
        }
        if let Some(heading) = trimmed
            .strip_prefix("### ")
            .or_else(|| trimmed.strip_prefix("#### "))
        {
            // Unknown subsections stay part of the enclosing section.
            if let Some(section) = section_for(heading) {
                current = section;
            } else if current != Section::Other {
                if let Some(lines) = sections.lines_mut(current) {
                    lines.push(String::new());
                }
            }
            continue;
        }
        if let Some(lines) = sections.lines_mut(current) {
            lines.push(line.trim_end().to_string());
        }
    }
    sections
}

fn split_front_matter(content: &str) -> (Option<&str>, &str, usize) {
    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return (None, content, 0);
    };
    let mut offset = 0;
    for (idx, line) in rest.split_inclusive('\n').enumerate() {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(yaml), body, idx + 2);
        }
        offset += line.len();
    }
    (None, content, 0)
}

fn title_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:adr[-_ ]?)?\d+(?:\s*[.:)\-]\s*|\s+)").expect("valid regex")
    })
}

fn supersedes_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bsupersedes\s+\[?((?:adr[-_ ]?)?\d+)").expect("valid regex")
    })
}

fn superseded_by_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bsuperseded\s+by\s+\[?((?:adr[-_ ]?)?\d+)").expect("valid regex")
    })
}

/// Parse one decision document. The returned id is provisional; callers de-duplicate.
pub fn parse_decision_document(rel_path: &str, content: &str) -> Result<Decision> {
    let (yaml, body, line_offset) = split_front_matter(content);
    let front = match yaml {
        Some(yaml) if !yaml.trim().is_empty() => FrontMatter::read(rel_path, yaml),
        _ => FrontMatter::default(),
    };
    let sections = split_sections(body, line_offset);

    let context = paragraph_text(&sections.context);
    if context.is_empty() {
        return Err(DecisionError::MissingSection {
            path: rel_path.to_string(),
            section: "context",
        });
    }
    let decision_text = paragraph_text(&sections.decision);
    if decision_text.is_empty() {
        return Err(DecisionError::MissingSection {
            path: rel_path.to_string(),
            section: "decision",
        });
    }

    let stem = file_stem(rel_path);
    let title_line = sections.title.as_ref().map_or(1, |(line, _)| *line);
    let raw_title = front
        .title
        .clone()
        .or_else(|| sections.title.as_ref().map(|(_, title)| title.clone()))
        .unwrap_or_else(|| stem.replace(['-', '_'], " "));
    let title = strip_title_prefix(&raw_title);

    let status = front
        .status
        .clone()
        .or_else(|| first_line(&sections.status))
        .filter(|status| !status.is_empty());

    let mut consequences = Consequences {
        positive: items(&sections.positive),
        negative: items(&sections.negative),
    };
    for item in items(&sections.consequences) {
        classify_consequence(item, &mut consequences);
    }

    let id = front
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| derive_id(stem));

    let mut decision = Decision::new(id, title, DecisionSource::Existing);
    decision.status = status;
    decision.context = context;
    decision.decision_text = decision_text;
    decision.alternatives = items(&sections.alternatives);
    decision.consequences = consequences;
    decision.evidence = vec![EvidencePointer {
        file: rel_path.to_string(),
        line: title_line,
        pattern: "decision-record".to_string(),
        source_hash: Some(content_hash(content)),
    }];
    decision.origin = Some(rel_path.to_string());
    decision.keywords = front.tags;
    decision.supersedes = references(supersedes_re(), body);
    decision.superseded_by = references(superseded_by_re(), body);
    if let Some(status) = &front.status {
        for id in references(superseded_by_re(), status) {
            if !decision.superseded_by.contains(&id) {
                decision.superseded_by.push(id);
            }
        }
    }
    Ok(decision)
}

fn file_stem(rel_path: &str) -> &str {
    let name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

fn strip_title_prefix(title: &str) -> String {
    let stripped = title_prefix_re().replace(title.trim(), "");
    let stripped = stripped.trim();
    if stripped.is_empty() {
        title.trim().to_string()
    } else {
        stripped.to_string()
    }
}

/// `0007-use-kafka` and `adr-7-use-kafka` map to `ADR-0007`; anything else to a slug id.
pub(crate) fn derive_id(stem: &str) -> String {
    let lower = stem.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("adr-")
        .or_else(|| lower.strip_prefix("adr_"))
        .unwrap_or(&lower);
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    match digits.parse::<u32>() {
        Ok(number) => format!("ADR-{number:04}"),
        Err(_) => format!("ADR-{}", slugify(&lower)),
    }
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug.to_string()
    }
}

fn normalize_reference(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.parse::<u32>() {
        Ok(number) => format!("ADR-{number:04}"),
        Err(_) => raw.to_uppercase(),
    }
}

fn references(re: &Regex, text: &str) -> Vec<String> {
    let mut ids: Vec<String> = re
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| normalize_reference(m.as_str()))
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

fn paragraph_text(lines: &[String]) -> String {
    lines
        .iter()
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn first_line(lines: &[String]) -> Option<String> {
    lines
        .iter()
        .map(|line| strip_bullet(line.trim()).unwrap_or(line.trim()))
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

fn strip_bullet(line: &str) -> Option<&str> {
    if let Some(rest) = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("+ "))
    {
        return Some(rest.trim());
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return Some(rest.trim());
        }
    }
    None
}

/// Bullet items, or one item per paragraph when a section has no bullets.
fn items(lines: &[String]) -> Vec<String> {
    let bullets: Vec<String> = lines
        .iter()
        .filter_map(|line| strip_bullet(line.trim()))
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    if !bullets.is_empty() {
        return bullets;
    }
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }
    paragraphs
}

fn classify_consequence(item: String, consequences: &mut Consequences) {
    let lower = item.to_lowercase();
    for (prefix, positive) in [
        ("good, ", true),
        ("good: ", true),
        ("positive: ", true),
        ("bad, ", false),
        ("bad: ", false),
        ("negative: ", false),
    ] {
        if lower.starts_with(prefix) {
            let rest = item.get(prefix.len()..).unwrap_or("").trim().to_string();
            if positive {
                consequences.positive.push(rest);
            } else {
                consequences.negative.push(rest);
            }
            return;
        }
    }
    if NEGATIVE_CUES.iter().any(|cue| lower.contains(cue)) {
        consequences.negative.push(item);
    } else {
        consequences.positive.push(item);
    }
}
