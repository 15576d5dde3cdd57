/// A contiguous span of source text ready to embed.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub text: String,
    pub page: Option<u32>,
    /// Character offset of the chunk inside its unit (page or pasted text).
    pub offset: usize,
}

/// Splits one logical unit into windows of at most `max_chars` characters.
///
/// Units that fit are returned whole. Longer units are cut into fixed-size
/// windows; consecutive windows share `overlap` characters. Whitespace-only
/// windows are dropped.
pub fn split_unit(
    text: &str,
    page: Option<u32>,
    max_chars: usize,
    overlap: usize,
) -> Vec<DocumentChunk> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    if total == 0 {
        return Vec::new();
    }

    let max_chars = max_chars.max(1);
    let step = max_chars.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + max_chars).min(total);
        let window: String = chars[start..end].iter().collect();
        if !window.trim().is_empty() {
            chunks.push(DocumentChunk {
                text: window,
                page,
                offset: start,
            });
        }
        if end == total {
            break;
        }
        start += step;
    }

    chunks
}
