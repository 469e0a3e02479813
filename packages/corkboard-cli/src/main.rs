mod args;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use corkboard_core::settings::SETTINGS_FILE_NAME;
use corkboard_core::types::{NoteColor, WallStyle};
use corkboard_core::{
    Board, Corkboard, JsonSettingsStore, LocalVault, Note, NoteStore, Result, Settings,
};

use crate::args::{Args, Command};

/// Default settings path: ~/.config/corkboard/corkboard.json
fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("corkboard")
        .join(SETTINGS_FILE_NAME)
}

fn init_logger(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn print_board(board: &Board) {
    println!(
        "{} (wall: {}, full width: {})",
        board.name, board.config.wall_style, board.config.full_width
    );
    for note in &board.notes {
        let first_line = note.content.lines().next().unwrap_or_default();
        println!(
            "  {:<24} {:>6} {:>6}  {:<7} {}",
            note.id, note.x, note.y, note.color, first_line
        );
    }
}

fn board_json(board: &Board) -> serde_json::Value {
    serde_json::json!({
        "name": board.name,
        "config": board.config,
        "notes": board.notes.iter().map(|n| serde_json::json!({
            "id": n.id,
            "x": n.x,
            "y": n.y,
            "color": n.color.as_str(),
            "rotation": n.rotation,
            "originalRotation": n.original_rotation,
            "content": n.content,
            "filePath": n.file_path,
        })).collect::<Vec<_>>(),
    })
}

/// Load a board into a store, apply `edit`, and save the result.
async fn edit_board(
    corkboard: &Corkboard<LocalVault>,
    name: &str,
    edit: impl FnOnce(&mut NoteStore) -> Result<()>,
) -> Result<()> {
    let board = corkboard.open_board(name).await?;
    let mut store = NoteStore::from_notes(board.notes);
    edit(&mut store)?;

    let mut snapshot = store.snapshot();
    let report = corkboard.save_board(name, &mut snapshot).await?;
    store.apply_locators(&snapshot);
    println!(
        "{}: {} created, {} updated, {} unchanged, {} trashed",
        name,
        report.created,
        report.updated,
        report.unchanged,
        report.trashed.len()
    );
    for (id, err) in &report.failed {
        eprintln!("  failed {}: {}", id, err);
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let vault_root = match args.vault {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let settings_path = args.settings.unwrap_or_else(default_settings_path);
    log::info!(
        "[corkboard.cli] Vault {}, settings {}",
        vault_root.display(),
        settings_path.display()
    );

    let settings = Settings::load(Arc::new(JsonSettingsStore::new(settings_path)));
    let corkboard = Corkboard::new(Arc::new(LocalVault::new(vault_root)), settings);

    match args.command {
        Command::Init => {
            let active = corkboard.init().await?;
            println!("{}", active);
        }
        Command::List => {
            let active = corkboard.active_board();
            for name in corkboard.list_boards().await? {
                let marker = if active.as_deref() == Some(name.as_str()) { "*" } else { " " };
                println!("{} {}", marker, name);
            }
        }
        Command::Create { name } => {
            let created = corkboard.create_board(&name).await?;
            println!("{}", created);
        }
        Command::Delete { name } => {
            let next = corkboard.delete_board(&name).await?;
            println!("Deleted {}; active board is now {}", name, next);
        }
        Command::Show { name, json } => {
            let board = corkboard.open_board(&name).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&board_json(&board))?);
            } else {
                print_board(&board);
            }
        }
        Command::Add {
            board,
            content,
            x,
            y,
            color,
        } => {
            let color = match color {
                Some(keyword) => NoteColor::from_keyword(&keyword).ok_or_else(|| {
                    corkboard_core::StorageError::Parse {
                        path: "--color".to_string(),
                        reason: format!("unknown color {:?}", keyword),
                    }
                })?,
                None => NoteColor::default(),
            };
            edit_board(&corkboard, &board, |store| {
                let id = store.next_id();
                let note = Note {
                    color,
                    ..Note::new(id).with_position(x, y).with_content(content)
                };
                let added = store.add(note)?;
                println!("Added {}", added.id);
                Ok(())
            })
            .await?;
        }
        Command::Remove { board, id } => {
            edit_board(&corkboard, &board, |store| {
                store
                    .remove(&id)
                    .map(|_| ())
                    .ok_or(corkboard_core::StorageError::NotFound(id.clone()))
            })
            .await?;
        }
        Command::Straighten { board, undo } => {
            edit_board(&corkboard, &board, |store| {
                store.set_straightened(!undo);
                Ok(())
            })
            .await?;
        }
        Command::Wall { board, style } => {
            let wall = WallStyle::from_keyword(&style).ok_or_else(|| {
                corkboard_core::StorageError::Parse {
                    path: "STYLE".to_string(),
                    reason: format!("unknown wall style {:?}", style),
                }
            })?;
            if !corkboard.boards().board_exists(&board).await? {
                return Err(corkboard_core::StorageError::BoardNotFound(board));
            }
            let mut config = corkboard.board_config(&board);
            config.wall_style = wall;
            corkboard.set_board_config(&board, config)?;
        }
        Command::Migrate => {
            let report = corkboard.migrate().await?;
            if report.is_empty() {
                println!("Nothing to migrate");
            }
            for name in &report.migrated {
                println!("Migrated {}", name);
            }
            for file in &report.skipped {
                println!("Skipped {} (no notes)", file);
            }
            if !report.failed.is_empty() {
                eprintln!(
                    "{} legacy board(s) could not be migrated and will be retried",
                    report.failed.len()
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logger(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
