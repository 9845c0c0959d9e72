use xi_rope::Rope;

use super::span::Span;

/// Extracts the text for a span from the rope as an owned String.
///
/// The span is clamped to the rope; a span that fell off the end after an
/// edit yields the clamped remainder instead of panicking.
pub fn slice_to_string(rope: &Rope, sp: Span) -> String {
    let len = rope.len();
    let start = sp.start.min(len);
    let end = sp.end.min(len).max(start);
    rope.slice_to_cow(start..end).into_owned()
}

/// Extracts text for a span, truncating to at most `max` bytes with a "..."
/// suffix. Truncation backs off to the previous char boundary.
pub fn preview(rope: &Rope, sp: Span, max: usize) -> String {
    let mut s = slice_to_string(rope, sp);
    if s.len() > max {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push_str("...");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_short_text_unchanged() {
        let rope = Rope::from("hello");
        assert_eq!(preview(&rope, Span::new(0, 5), 10), "hello");
    }

    #[test]
    fn preview_truncates_long_text() {
        let rope = Rope::from("hello world");
        assert_eq!(preview(&rope, Span::new(0, 11), 5), "hello...");
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let rope = Rope::from("héllo");
        assert_eq!(preview(&rope, Span::new(0, 6), 2), "h...");
    }

    #[test]
    fn slice_clamps_out_of_range() {
        let rope = Rope::from("hello");
        assert_eq!(slice_to_string(&rope, Span::new(3, 40)), "lo");
        assert_eq!(slice_to_string(&rope, Span::new(30, 40)), "");
    }
}
