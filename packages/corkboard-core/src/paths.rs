/// Vault path helpers.
///
/// Vault paths are relative, `/`-separated strings. The vault root is the
/// empty string.
use regex::Regex;
use std::sync::LazyLock;

/// Characters that are illegal in file names on at least one platform.
static ILLEGAL_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/:*?"<>|]"#).unwrap());

pub const NOTE_EXTENSION: &str = "md";

/// Normalize separators and drop empty and `.` segments.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Join a directory and a child name, normalizing the result.
pub fn join(dir: &str, name: &str) -> String {
    let dir = normalize_path(dir);
    if dir.is_empty() {
        normalize_path(name)
    } else {
        normalize_path(&format!("{}/{}", dir, name))
    }
}

/// Parent directory of a normalized path (`""` for top-level entries).
pub fn parent(path: &str) -> String {
    let path = normalize_path(path);
    match path.rfind('/') {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

/// Last segment of a path.
pub fn file_name(path: &str) -> String {
    let path = normalize_path(path);
    match path.rfind('/') {
        Some(idx) => path[idx + 1..].to_string(),
        None => path,
    }
}

/// File name without its last extension.
pub fn file_stem(path: &str) -> String {
    let name = file_name(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[..idx].to_string(),
        _ => name,
    }
}

/// Last extension without the dot, if any.
pub fn extension(path: &str) -> Option<String> {
    let name = file_name(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 => Some(name[idx + 1..].to_string()),
        _ => None,
    }
}

/// Replace characters that file systems reject with `_`.
pub fn sanitize_name(name: &str) -> String {
    ILLEGAL_CHARS_RE.replace_all(name.trim(), "_").into_owned()
}

/// File name backing the note with this identifier.
pub fn note_file_name(id: &str) -> String {
    let stem = sanitize_name(id);
    let stem = if stem.is_empty() || stem.starts_with('.') {
        format!("note-{}", stem.trim_start_matches('.'))
    } else {
        stem
    };
    format!("{}.{}", stem, NOTE_EXTENSION)
}

/// Candidate sibling names for an occupied file name: `a.md` -> `a-1.md`, `a-2.md`, ...
pub fn dedup_candidates(name: &str) -> impl Iterator<Item = String> + '_ {
    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    };
    (1..1000).map(move |i| match ext {
        Some(e) => format!("{}-{}.{}", stem, i, e),
        None => format!("{}-{}", stem, i),
    })
}

pub fn is_note_file(path: &str) -> bool {
    extension(path).as_deref() == Some(NOTE_EXTENSION)
}
