//! Word-boundary sliding-window chunker.
//!
//! Splits extracted document text into overlapping [`Chunk`]s of a configured
//! character size. When a window's right edge would land mid-word, it is
//! pulled back to the nearest space after the cursor so words are never split
//! unless a single unbroken run exceeds the window size.
//!
//! Offsets are character positions (not bytes) so the same numbering applies
//! regardless of the source encoding.

use crate::models::Chunk;

/// Split `text` into overlapping chunks of up to `size` characters.
///
/// Walks the text left to right. Each window is shortened to the last space
/// strictly after the cursor when the window would otherwise end mid-word
/// before the end of the text. Windows that trim to the empty string are
/// dropped without consuming a `chunk_id`.
///
/// The cursor advances to `window_end - overlap` when that makes progress,
/// otherwise to `window_end` — this guarantees termination for every
/// `size`/`overlap` combination, including `overlap >= size`.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<Chunk> {
    // A zero window could never advance the cursor.
    let size = size.max(1);

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut chunk_id: i64 = 0;

    while start < len {
        let hard_end = start + size;
        let mut end = hard_end.min(len);

        // Only respect word boundaries when the window ends before the text does.
        if hard_end < len {
            if let Some(space_pos) = (start..end).rev().find(|&i| chars[i] == ' ') {
                if space_pos > start {
                    end = space_pos;
                }
            }
        }

        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(Chunk {
                chunk_id,
                text: trimmed.to_string(),
                start_offset: start,
                end_offset: end,
            });
            chunk_id += 1;
        }

        start = if end > overlap && end - overlap > start {
            end - overlap
        } else {
            end
        };
    }

    chunks
}
