use crate::game::GameStore;
use crate::network::ConnectionState;
use shared::BOARD_SIZE;
use std::fmt::Write;

const EMPTY_CELL: char = '.';

/// Draws the board as text. Confirmed letters are uppercase, staged letters
/// lowercase.
pub fn render_board(store: &GameStore) -> String {
    let mut out = String::from("   ");
    for col in 0..BOARD_SIZE {
        let _ = write!(out, "{:>3}", col);
    }
    out.push('\n');

    for (row, cells) in store.board().rows().enumerate() {
        let _ = write!(out, "{:>3}", row);
        for (col, cell) in cells.iter().enumerate() {
            let glyph = match (cell, store.staged_at(row, col)) {
                (Some(letter), _) => letter.to_ascii_uppercase(),
                (None, Some(letter)) => letter.to_ascii_lowercase(),
                (None, None) => EMPTY_CELL,
            };
            let _ = write!(out, "{:>3}", glyph);
        }
        out.push('\n');
    }
    out
}

pub fn render_players(store: &GameStore) -> String {
    if store.players().is_empty() {
        return "no players yet\n".to_string();
    }

    let mut out = String::new();
    for player in store.players() {
        let marker = if store.current_turn() == Some(player.id.as_str()) {
            '>'
        } else {
            ' '
        };
        let _ = writeln!(out, "{} {} ({})", marker, player.name, player.id);
    }
    out
}

pub fn render_log(store: &GameStore) -> String {
    let mut out = String::new();
    for entry in store.activity() {
        let _ = writeln!(out, "- {}", entry);
    }
    out
}

pub fn connection_badge(store: &GameStore) -> &'static str {
    if store.connection_lost() {
        return "[connection lost]";
    }
    match store.connection_status() {
        ConnectionState::Connecting => "[connecting...]",
        ConnectionState::Connected => "[connected]",
        ConnectionState::Disconnected => "[disconnected]",
    }
}
