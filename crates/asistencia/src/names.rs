use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static RE_FOOTNOTE_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:<b>)?\((\d+)\)(?:</b>)?\s+(.*)$").expect("invalid regex: footnote definition")
});

static RE_FOOTNOTE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*(?:<b>)?\((\d+)\)(?:</b>)?").expect("invalid regex: footnote reference")
});

fn join_words(words: &[&str]) -> String {
    words.join(" ")
}

/// Splits a Spanish enumeration of people into individual names.
///
/// Every comma separated segment but the last is one name. The last segment
/// may hold several people joined by " y ", which is ambiguous because a
/// person can also carry two surnames. Chunks are resolved pairwise from the
/// end: a single-word chunk followed by another chunk is read as a first
/// name belonging to that chunk ("Juan y Pedro García"), anything else closes
/// the last chunk as a name of its own.
///
/// ```
/// use asistencia::names::parse_nlp_list;
///
/// assert_eq!(
///     parse_nlp_list("Juan Pérez, Ana López y María García"),
///     vec!["Juan Pérez", "Ana López", "María García"]
/// );
/// ```
pub fn parse_nlp_list(paragraph: &str) -> Vec<String> {
    let mut segments: Vec<&str> = paragraph.split(',').collect();
    let last = segments.pop().unwrap_or_default();

    let mut names: Vec<String> = segments
        .into_iter()
        .map(|segment| join_words(&segment.split_whitespace().collect::<Vec<_>>()))
        .collect();

    let mut chunks: Vec<Vec<&str>> = last
        .split(" y ")
        .map(|chunk| chunk.split_whitespace().collect())
        .collect();

    chunks.retain(|chunk: &Vec<&str>| {
        if chunk.is_empty() {
            log::warn!("Dropping empty name in list '{}'", paragraph.trim());
        }
        !chunk.is_empty()
    });

    let mut resolved = Vec::new();
    while let Some(tail) = chunks.pop() {
        let Some(head) = chunks.pop() else {
            resolved.push(join_words(&tail));
            break;
        };

        if head.len() == 1 {
            if tail.len() == 1 {
                log::warn!(
                    "Ambiguous name list '{}': reading '{} y {}' as a single person",
                    paragraph.trim(),
                    head[0],
                    tail[0]
                );
            }
            resolved.push(format!("{} y {}", join_words(&head), join_words(&tail)));
        } else {
            resolved.push(join_words(&tail));
            chunks.push(head);
        }
    }

    resolved.reverse();
    names.extend(resolved);

    names.retain(|name| {
        if name.is_empty() {
            log::warn!("Dropping empty name in list '{}'", paragraph.trim());
        }
        !name.is_empty()
    });

    names
}

/// Collects footnote definitions of the form `(N) text` from sibling lines.
pub fn parse_footnotes<S: AsRef<str>>(lines: &[S]) -> HashMap<String, String> {
    lines
        .iter()
        .filter_map(|line| {
            let caps = RE_FOOTNOTE_DEFINITION.captures(line.as_ref().trim())?;
            Some((caps[1].to_string(), caps[2].trim().to_string()))
        })
        .collect()
}

/// Removes `(N)` markers from a name and resolves them against `footnotes`.
pub fn strip_footnotes(name: &str, footnotes: &HashMap<String, String>) -> (String, Vec<String>) {
    let notes = RE_FOOTNOTE_REFERENCE
        .captures_iter(name)
        .filter_map(|caps| {
            let number = &caps[1];
            let note = footnotes.get(number).cloned();
            if note.is_none() {
                log::warn!("Footnote ({}) referenced by '{}' is not defined", number, name);
            }
            note
        })
        .collect();

    let cleaned = RE_FOOTNOTE_REFERENCE.replace_all(name, "").trim().to_string();

    (cleaned, notes)
}
