/// Breaks text into lines of at most `width` characters, preferring spaces.
///
/// Existing newlines are kept. A word longer than `width` is split mid-word.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut remaining = paragraph.trim_end();
        if remaining.is_empty() {
            lines.push(String::new());
            continue;
        }

        while remaining.chars().count() > width {
            let limit = remaining
                .char_indices()
                .nth(width)
                .map(|(i, _)| i)
                .unwrap_or(remaining.len());

            let split_at = remaining[..limit]
                .rfind(' ')
                .filter(|&i| i > 0)
                .unwrap_or(limit);

            lines.push(remaining[..split_at].trim_end().to_string());
            remaining = remaining[split_at..].trim_start();
        }

        if !remaining.is_empty() {
            lines.push(remaining.to_string());
        }
    }

    lines
}
