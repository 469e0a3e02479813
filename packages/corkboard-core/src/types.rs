use serde::{Deserialize, Serialize};

/// Declares a keyword enumeration stored as a lowercase word in note headers,
/// settings and legacy JSON. Unknown words decode to the default variant.
macro_rules! keyword_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            #[default]
            $default:ident => $default_kw:literal,
            $($variant:ident => $kw:literal,)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub enum $name {
            #[default]
            $default,
            $($variant,)*
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$name::$default, $($name::$variant,)*];

            pub fn as_str(self) -> &'static str {
                match self {
                    $name::$default => $default_kw,
                    $($name::$variant => $kw,)*
                }
            }

            /// Case-insensitive keyword lookup.
            pub fn from_keyword(word: &str) -> Option<Self> {
                let word = word.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(word))
            }

            /// Keyword lookup falling back to the default variant.
            pub fn from_keyword_or_default(word: &str) -> Self {
                Self::from_keyword(word).unwrap_or_default()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                let word = String::deserialize(d)?;
                Ok(Self::from_keyword_or_default(&word))
            }
        }
    };
}

keyword_enum! {
    pub enum NoteColor {
        #[default]
        Yellow => "yellow",
        Pink => "pink",
        Blue => "blue",
        Green => "green",
        Orange => "orange",
        Purple => "purple",
        White => "white",
    }
}

keyword_enum! {
    pub enum NoteSize {
        #[default]
        Medium => "medium",
        Small => "small",
        Large => "large",
    }
}

keyword_enum! {
    pub enum NoteShape {
        #[default]
        Square => "square",
        Rectangle => "rectangle",
        Circle => "circle",
    }
}

keyword_enum! {
    pub enum NoteStyle {
        #[default]
        Paper => "paper",
        Flat => "flat",
        Lifted => "lifted",
    }
}

keyword_enum! {
    pub enum BackgroundStyle {
        #[default]
        Plain => "plain",
        Lined => "lined",
        Grid => "grid",
        Dotted => "dotted",
        Image => "image",
    }
}

keyword_enum! {
    pub enum PinKind {
        #[default]
        Pin => "pin",
        None => "none",
        Tape => "tape",
        Clip => "clip",
    }
}

keyword_enum! {
    pub enum PinPosition {
        #[default]
        Center => "center",
        Left => "left",
        Right => "right",
    }
}

keyword_enum! {
    /// Background of the whole board.
    pub enum WallStyle {
        #[default]
        Cork => "cork",
        Grid => "grid",
        Dots => "dots",
        Plain => "plain",
        Whiteboard => "whiteboard",
    }
}

/// Everything about a note except its body and storage locator.
///
/// This is what the dirty check compares against the metadata cache.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NoteHeader {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub color: NoteColor,
    pub size: NoteSize,
    pub shape: NoteShape,
    pub style: NoteStyle,
    pub background: BackgroundStyle,
    pub background_image: Option<String>,
    pub rotation: f64,
    pub original_rotation: Option<f64>,
    pub pin: PinKind,
    pub pin_position: PinPosition,
}

/// One sticky note.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Note {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub color: NoteColor,
    pub size: NoteSize,
    pub shape: NoteShape,
    pub style: NoteStyle,
    pub background: BackgroundStyle,
    pub background_image: Option<String>,
    /// Degrees.
    pub rotation: f64,
    /// Rotation before the board was straightened; only set while straightened.
    pub original_rotation: Option<f64>,
    pub pin: PinKind,
    pub pin_position: PinPosition,
    pub content: String,
    /// Vault path of the backing file. Empty until the note is first persisted.
    pub file_path: String,
}

impl Note {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn is_persisted(&self) -> bool {
        !self.file_path.is_empty()
    }

    /// Header as it will be stored: coordinates rounded to whole canvas units.
    pub fn header(&self) -> NoteHeader {
        NoteHeader {
            id: self.id.clone(),
            x: round_coordinate(self.x),
            y: round_coordinate(self.y),
            color: self.color,
            size: self.size,
            shape: self.shape,
            style: self.style,
            background: self.background,
            background_image: self.background_image.clone(),
            rotation: self.rotation,
            original_rotation: self.original_rotation,
            pin: self.pin,
            pin_position: self.pin_position,
        }
    }

    pub fn from_header(header: NoteHeader, content: String) -> Self {
        Self {
            id: header.id,
            x: header.x,
            y: header.y,
            color: header.color,
            size: header.size,
            shape: header.shape,
            style: header.style,
            background: header.background,
            background_image: header.background_image,
            rotation: header.rotation,
            original_rotation: header.original_rotation,
            pin: header.pin,
            pin_position: header.pin_position,
            content,
            file_path: String::new(),
        }
    }
}

/// Round to the nearest integer with halves going up (-2.5 becomes -2),
/// matching the host's `Math.round`. Non-finite values collapse to 0.
pub fn round_coordinate(v: f64) -> f64 {
    if !v.is_finite() {
        return 0.0;
    }
    let r = v.round();
    // `f64::round` sends negative halves away from zero.
    if v - r == 0.5 {
        r + 1.0
    } else {
        r
    }
}

/// Last known camera state of a board.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_zoom")]
    pub zoom: f64,
}

fn default_zoom() -> f64 {
    1.0
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: default_zoom(),
        }
    }
}

/// Per-board configuration, stored in plugin settings keyed by board path.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardConfig {
    #[serde(default)]
    pub wall_style: WallStyle,
    #[serde(default)]
    pub full_width: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
}

impl BoardConfig {
    /// Configuration written for a freshly created board.
    pub fn new_board() -> Self {
        Self {
            wall_style: WallStyle::default(),
            full_width: false,
            viewport: Some(Viewport::default()),
        }
    }
}

/// A loaded board.
#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    pub name: String,
    pub config: BoardConfig,
    /// Insertion order, not display order.
    pub notes: Vec<Note>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup_is_case_insensitive() {
        assert_eq!(NoteColor::from_keyword("Pink"), Some(NoteColor::Pink));
        assert_eq!(WallStyle::from_keyword(" grid "), Some(WallStyle::Grid));
        assert_eq!(NoteSize::from_keyword("huge"), None);
        assert_eq!(NoteSize::from_keyword_or_default("huge"), NoteSize::Medium);
    }

    #[test]
    fn test_keyword_serde_falls_back_to_default() {
        let style: WallStyle = serde_json::from_str("\"neon\"").unwrap();
        assert_eq!(style, WallStyle::Cork);
        assert_eq!(serde_json::to_string(&PinKind::Tape).unwrap(), "\"tape\"");
    }

    #[test]
    fn test_header_rounds_coordinates() {
        let note = Note::new("a").with_position(10.6, -5.5);
        let header = note.header();
        assert_eq!(header.x, 11.0);
        assert_eq!(header.y, -5.0);
        assert_eq!(round_coordinate(f64::NAN), 0.0);
    }

    #[test]
    fn test_halves_round_up() {
        assert_eq!(round_coordinate(2.5), 3.0);
        assert_eq!(round_coordinate(-2.5), -2.0);
        assert_eq!(round_coordinate(-0.5), 0.0);
        assert_eq!(round_coordinate(-2.6), -3.0);
        assert_eq!(round_coordinate(-2.4), -2.0);
    }

    #[test]
    fn test_board_config_defaults() {
        let config: BoardConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.wall_style, WallStyle::Cork);
        assert!(!config.full_width);
        assert!(config.viewport.is_none());

        let fresh = BoardConfig::new_board();
        assert_eq!(fresh.viewport.map(|v| v.zoom), Some(1.0));
    }
}
