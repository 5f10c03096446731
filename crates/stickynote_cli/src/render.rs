//! Plain-text rendering of the note board.
//!
//! Rendering only reads snapshots; it never touches repository state.

use stickynote_core::Note;

pub const EMPTY_BOARD: &str = "No notes yet. Add one with `stickynote add <text>`.";

/// Renders one line per note: id, position, then text on a single line.
pub fn render_board(notes: &[Note]) -> String {
    if notes.is_empty() {
        return EMPTY_BOARD.to_string();
    }

    let id_width = notes
        .iter()
        .map(|note| note.id.as_str().len())
        .max()
        .unwrap_or(0);
    notes
        .iter()
        .map(|note| {
            format!(
                "{:<id_width$}  ({:>7.1}, {:>7.1})  {}",
                note.id.as_str(),
                note.x,
                note.y,
                single_line(&note.text)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_position(note_id: &str, x: f64, y: f64) -> String {
    format!("{note_id} -> ({x:.1}, {y:.1})")
}

fn single_line(text: &str) -> String {
    text.lines().collect::<Vec<_>>().join(" / ")
}

#[cfg(test)]
mod tests {
    use super::{render_board, render_position, EMPTY_BOARD};
    use stickynote_core::Note;

    #[test]
    fn empty_board_has_a_hint() {
        assert_eq!(render_board(&[]), EMPTY_BOARD);
    }

    #[test]
    fn notes_render_in_order_with_aligned_ids() {
        let board = render_board(&[
            Note::new("a", "first", 0.0, 0.0),
            Note::new("bcd", "two\nlines", 15.0, -5.0),
        ]);
        let lines: Vec<&str> = board.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("a    "));
        assert!(lines[0].ends_with("first"));
        assert!(lines[1].contains("15.0"));
        assert!(lines[1].contains("-5.0"));
        assert!(lines[1].ends_with("two / lines"));
    }

    #[test]
    fn position_uses_one_decimal() {
        assert_eq!(render_position("n1", 15.0, 5.26), "n1 -> (15.0, 5.3)");
    }
}
