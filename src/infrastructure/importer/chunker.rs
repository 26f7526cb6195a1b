//! Fixed-size text chunking

/// Split text into chunks of at most `chunk_size` bytes, overlapping by
/// `chunk_overlap`, cutting at word boundaries where possible.
///
/// Callers validate that `chunk_size > 0` and `chunk_overlap < chunk_size`.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let text = text.trim();

    if text.is_empty() {
        return vec![];
    }

    if text.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    let step = chunk_size - chunk_overlap;

    while start < text.len() {
        let target_end = (start + chunk_size).min(text.len());
        let end = find_chunk_end(text, start, target_end);

        let chunk = text[start..end].trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= text.len() {
            break;
        }

        start += step;
        if start >= end {
            start = end;
        }
        // the overlap step can land between the bytes of a multibyte char
        while !text.is_char_boundary(start) {
            start += 1;
        }
    }

    chunks
}

fn find_chunk_end(text: &str, start: usize, target_end: usize) -> usize {
    if target_end >= text.len() {
        return text.len();
    }

    let boundary = find_word_boundary_before(text, target_end);

    if boundary <= start {
        find_word_boundary_after(text, target_end)
    } else {
        boundary
    }
}

/// Nearest word boundary at or before `pos`, or 0 when there is none
fn find_word_boundary_before(text: &str, pos: usize) -> usize {
    let bytes = text.as_bytes();
    let mut boundary = pos;

    while boundary > 0 && !bytes[boundary - 1].is_ascii_whitespace() {
        boundary -= 1;
    }

    boundary
}

fn find_word_boundary_after(text: &str, pos: usize) -> usize {
    let bytes = text.as_bytes();
    let mut boundary = pos;

    while boundary < text.len() && !bytes[boundary].is_ascii_whitespace() {
        boundary += 1;
    }

    boundary
}
