use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true, disable_help_subcommand = true)]
pub struct Args {
    /// Vault root folder (defaults to the current directory)
    #[arg(long, value_name = "DIR", global = true)]
    pub vault: Option<PathBuf>,

    /// Settings file (defaults to <config dir>/corkboard/corkboard.json)
    #[arg(long, value_name = "FILE", global = true)]
    pub settings: Option<PathBuf>,

    /// Verbosity level (-v = info, -vv = debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Prepare storage, migrate legacy boards and print the active board
    Init,

    /// List boards
    List,

    /// Create a board
    Create {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Move a board to the trash (the last board is kept)
    Delete {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Print a board's configuration and notes
    Show {
        #[arg(value_name = "NAME")]
        name: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a note to a board and save it
    Add {
        #[arg(value_name = "NAME")]
        board: String,

        /// Note text
        #[arg(value_name = "TEXT")]
        content: String,

        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        x: f64,

        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        y: f64,

        /// Note color keyword
        #[arg(long)]
        color: Option<String>,
    },

    /// Remove a note from a board; its file is trashed on save
    Remove {
        #[arg(value_name = "NAME")]
        board: String,

        #[arg(value_name = "NOTE_ID")]
        id: String,
    },

    /// Straighten or restore every note's rotation on a board
    Straighten {
        #[arg(value_name = "NAME")]
        board: String,

        /// Restore the remembered rotations instead
        #[arg(long)]
        undo: bool,
    },

    /// Set a board's wall style
    Wall {
        #[arg(value_name = "NAME")]
        board: String,

        #[arg(value_name = "STYLE")]
        style: String,
    },

    /// Migrate legacy JSON boards
    Migrate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subcommand_is_required() {
        assert!(Args::try_parse_from(["corkboard"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let parsed =
            Args::try_parse_from(["corkboard", "list", "--vault", "/tmp/vault", "-vv"]).unwrap();
        assert!(matches!(parsed.command, Command::List));
        assert_eq!(parsed.vault, Some(PathBuf::from("/tmp/vault")));
        assert_eq!(parsed.settings, None);
        assert_eq!(parsed.verbose, 2);
    }

    #[test]
    fn test_add_accepts_negative_coordinates() {
        let parsed = Args::try_parse_from([
            "corkboard", "add", "Ideas", "hello", "--x", "-40", "--color", "pink",
        ])
        .unwrap();
        match parsed.command {
            Command::Add {
                board,
                content,
                x,
                y,
                color,
            } => {
                assert_eq!(board, "Ideas");
                assert_eq!(content, "hello");
                assert_eq!((x, y), (-40.0, 0.0));
                assert_eq!(color.as_deref(), Some("pink"));
            }
            _ => panic!("Expected Add command"),
        }
    }
}
