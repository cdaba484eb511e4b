//! Titles derived from file names

const SEPARATORS: [char; 4] = [' ', '-', '_', '.'];

fn leading_digits(s: &str) -> usize {
    s.bytes().take_while(u8::is_ascii_digit).count()
}

/// Strip a leading `N`, `NN` or `N-NN` track number, but only when a
/// separator follows it.
fn strip_track_number(s: &str) -> &str {
    let n = leading_digits(s);
    if !(1..=2).contains(&n) {
        return s;
    }
    let mut rest = &s[n..];
    if let Some(after) = rest.strip_prefix('-') {
        let m = leading_digits(after);
        if (1..=2).contains(&m) {
            rest = &after[m..];
        }
    }
    match rest.chars().next() {
        Some(c) if SEPARATORS.contains(&c) => rest.trim_start_matches(SEPARATORS),
        _ => s,
    }
}

/// Title for a file stem such as `03 - Moonlight Sonata`.
///
/// Returns `None` if nothing is left after stripping.
pub fn title_from_filename(stem: &str) -> Option<String> {
    let title = strip_track_number(stem.trim()).trim();
    (!title.is_empty()).then(|| title.to_string())
}
