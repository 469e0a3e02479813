//! Note file format.
//!
//! Handles:
//! ```text
//!   ---                      (header block, must contain corkboard-plugin: note)
//!   key: value               (one field per line)
//!   ---
//!                            (blank separator)
//!   body text                (verbatim)
//! ```
//!
//! Decoding is lenient: a field that is missing or unreadable takes its
//! default instead of rejecting the file.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{
    BackgroundStyle, Note, NoteColor, NoteHeader, NoteShape, NoteSize, NoteStyle, PinKind,
    PinPosition,
};

pub const DELIMITER: &str = "---";
pub const TYPE_KEY: &str = "corkboard-plugin";
pub const TYPE_VALUE: &str = "note";

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Fresh note identifier: `note-<millis hex>-<seq>`.
pub fn generate_id() -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("note-{:x}-{}", ts, seq)
}

/// Parsed `key: value` pairs of a header block, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderBlock {
    pub fields: Vec<(String, String)>,
}

impl HeaderBlock {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_note(&self) -> bool {
        self.get(TYPE_KEY) == Some(TYPE_VALUE)
    }

    fn number(&self, key: &str) -> Option<f64> {
        self.get(key)
            .and_then(|v| unquote(v).trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    fn text(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(unquote)
            .filter(|v| !v.is_empty())
    }

    /// Typed view with per-field defaults.
    pub fn to_note_header(&self) -> NoteHeader {
        let word = |key: &str| self.get(key).map(unquote).unwrap_or_default();
        NoteHeader {
            id: self.text("id").unwrap_or_else(generate_id),
            x: self.number("x").unwrap_or(0.0),
            y: self.number("y").unwrap_or(0.0),
            color: NoteColor::from_keyword_or_default(&word("color")),
            size: NoteSize::from_keyword_or_default(&word("size")),
            shape: NoteShape::from_keyword_or_default(&word("shape")),
            style: NoteStyle::from_keyword_or_default(&word("style")),
            background: BackgroundStyle::from_keyword_or_default(&word("background")),
            background_image: self.text("backgroundImage"),
            rotation: self.number("rotation").unwrap_or(0.0),
            original_rotation: self.number("originalRotation"),
            pin: PinKind::from_keyword_or_default(&word("pin")),
            pin_position: PinPosition::from_keyword_or_default(&word("pinPosition")),
        }
    }
}

/// Quote a value, escaping backslashes and double quotes.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Inverse of [`quote`]. Unquoted values are returned trimmed as-is.
pub fn unquote(value: &str) -> String {
    let trimmed = value.trim();
    let inner = if trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')))
    {
        &trimmed[1..trimmed.len() - 1]
    } else {
        return trimmed.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn format_number(v: f64) -> String {
    // `{}` prints integral floats without a fraction ("11", not "11.0").
    format!("{}", v)
}

/// Encode a note into its file representation.
pub fn encode_note(note: &Note) -> String {
    let header = note.header();
    let mut out = String::new();
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(&format!("{}: {}\n", TYPE_KEY, TYPE_VALUE));
    out.push_str(&format!("id: {}\n", quote(&header.id)));
    out.push_str(&format!("x: {}\n", format_number(header.x)));
    out.push_str(&format!("y: {}\n", format_number(header.y)));
    out.push_str(&format!("color: {}\n", header.color));
    out.push_str(&format!("size: {}\n", header.size));
    out.push_str(&format!("shape: {}\n", header.shape));
    out.push_str(&format!("style: {}\n", header.style));
    out.push_str(&format!("background: {}\n", header.background));
    if let Some(image) = &header.background_image {
        out.push_str(&format!("backgroundImage: {}\n", quote(image)));
    }
    out.push_str(&format!("rotation: {}\n", format_number(header.rotation)));
    if let Some(original) = header.original_rotation {
        out.push_str(&format!("originalRotation: {}\n", format_number(original)));
    }
    out.push_str(&format!("pin: {}\n", header.pin));
    out.push_str(&format!("pinPosition: {}\n", header.pin_position));
    out.push_str(DELIMITER);
    out.push_str("\n\n");
    out.push_str(&note.content);
    out
}

/// Split a file into its header block and the raw text after it.
pub fn split_header(content: &str) -> Option<(HeaderBlock, String)> {
    let content = content.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines = content.split('\n');

    let opening = lines.next()?;
    if opening.trim_end() != DELIMITER {
        return None;
    }

    let mut block = HeaderBlock::default();
    let mut closed = false;
    let mut consumed = opening.len() + 1;
    for line in lines.by_ref() {
        consumed += line.len() + 1;
        if line.trim_end() == DELIMITER {
            closed = true;
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            if !key.is_empty() {
                block.fields.push((key.to_string(), value.trim().to_string()));
            }
        }
    }
    if !closed {
        return None;
    }

    let rest = content.get(consumed.min(content.len())..).unwrap_or("");
    Some((block, rest.to_string()))
}

/// Read only the header block.
pub fn parse_header(content: &str) -> Option<HeaderBlock> {
    split_header(content).map(|(block, _)| block)
}

/// Remove leading and trailing blank lines, keeping inner text untouched.
pub fn trim_blank_lines(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(s), Some(e)) => lines[s..=e].join("\n"),
        _ => String::new(),
    }
}

/// Decode a note file. Returns `None` unless the header carries the note type marker.
pub fn decode_note(content: &str) -> Option<Note> {
    let (block, body) = split_header(content)?;
    if !block.is_note() {
        return None;
    }
    Some(Note::from_header(block.to_note_header(), trim_blank_lines(&body)))
}

/// Decode only the header of a note file.
pub fn decode_header(content: &str) -> Option<NoteHeader> {
    parse_header(content)
        .filter(HeaderBlock::is_note)
        .map(|block| block.to_note_header())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Note {
        Note {
            id: "n-1".to_string(),
            x: 10.6,
            y: 5.2,
            color: NoteColor::Blue,
            size: NoteSize::Large,
            shape: NoteShape::Circle,
            style: NoteStyle::Lifted,
            background: BackgroundStyle::Image,
            background_image: Some("assets/paper.png".to_string()),
            rotation: -3.5,
            original_rotation: Some(12.25),
            pin: PinKind::Tape,
            pin_position: PinPosition::Left,
            content: "# Title\n\nSome *body* text\n  indented".to_string(),
            file_path: String::new(),
        }
    }

    #[test]
    fn test_encode_layout() {
        let text = encode_note(&Note::new("a").with_position(10.6, 5.2).with_content("hi"));
        assert_eq!(
            text,
            "---\n\
             corkboard-plugin: note\n\
             id: \"a\"\n\
             x: 11\n\
             y: 5\n\
             color: yellow\n\
             size: medium\n\
             shape: square\n\
             style: paper\n\
             background: plain\n\
             rotation: 0\n\
             pin: pin\n\
             pinPosition: center\n\
             ---\n\
             \n\
             hi"
        );
    }

    #[test]
    fn test_round_trip_rounds_coordinates_only() {
        let note = sample();
        let decoded = decode_note(&encode_note(&note)).unwrap();
        let mut expected = note.clone();
        expected.x = 11.0;
        expected.y = 5.0;
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_id_quotes_are_escaped() {
        let note = Note::new(r#"say "hi" \o/"#);
        let text = encode_note(&note);
        assert!(text.contains(r#"id: "say \"hi\" \\o/""#));
        assert_eq!(decode_note(&text).unwrap().id, note.id);
    }

    #[test]
    fn test_optional_fields_omitted() {
        let text = encode_note(&Note::new("a"));
        assert!(!text.contains("originalRotation"));
        assert!(!text.contains("backgroundImage"));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let text = "---\ncorkboard-plugin: note\nid: \"x\"\ncolor: chartreuse\nx: abc\n---\n\nbody";
        let note = decode_note(text).unwrap();
        assert_eq!(note.id, "x");
        assert_eq!(note.color, NoteColor::Yellow);
        assert_eq!(note.size, NoteSize::Medium);
        assert_eq!(note.x, 0.0);
        assert_eq!(note.pin, PinKind::Pin);
        assert_eq!(note.content, "body");
    }

    #[test]
    fn test_missing_id_is_generated() {
        let note = decode_note("---\ncorkboard-plugin: note\n---\n\nbody").unwrap();
        assert!(note.id.starts_with("note-"));
    }

    #[test]
    fn test_rejects_foreign_files() {
        assert!(decode_note("just a markdown file").is_none());
        assert!(decode_note("---\ntags: [a]\n---\n\nnot ours").is_none());
        assert!(decode_note("---\ncorkboard-plugin: note\nno closing delimiter").is_none());
        assert!(decode_header("---\ncorkboard-plugin: board\n---\n").is_none());
    }

    #[test]
    fn test_body_blank_lines_trimmed() {
        let text = "---\ncorkboard-plugin: note\nid: a\n---\n\n\n  \nline one\n\nline two\n\n\n";
        assert_eq!(decode_note(text).unwrap().content, "line one\n\nline two");
    }

    #[test]
    fn test_crlf_is_normalized() {
        let text = "---\r\ncorkboard-plugin: note\r\nid: \"a\"\r\n---\r\n\r\nbody\r\nmore";
        let note = decode_note(text).unwrap();
        assert_eq!(note.id, "a");
        assert_eq!(note.content, "body\nmore");
    }

    #[test]
    fn test_body_with_delimiter_lines_survives() {
        let note = Note::new("a").with_content("above\n---\nbelow");
        assert_eq!(decode_note(&encode_note(&note)).unwrap().content, note.content);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"a\\\"b\""), "a\"b");
        assert_eq!(unquote("'single'"), "single");
        assert_eq!(unquote("  bare  "), "bare");
        assert_eq!(unquote("\"line\\nbreak\""), "line\nbreak");
    }
}
