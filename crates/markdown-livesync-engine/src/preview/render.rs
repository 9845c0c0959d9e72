use std::sync::OnceLock;

use regex::Regex;

use crate::error::RenderError;

/// External renderer for content the preview shows as a widget instead of
/// its source. Each method takes the source and returns display text.
pub trait RenderCollaborator {
    /// Short name used in diagnostics and logs.
    fn name(&self) -> &'static str;

    fn render_math(&self, expr: &str) -> Result<String, RenderError>;

    fn render_html(&self, code: &str) -> Result<String, RenderError>;

    fn render_image(&self, href: &str, alt: &str) -> Result<String, RenderError>;

    /// Display text for a link whose label (or bare URL) is `text`.
    fn render_link(&self, href: &str, text: &str) -> Result<String, RenderError>;

    /// Resolves a `[^label]` reference to the marker shown in its place.
    fn resolve_footnote(&self, label: &str) -> Result<String, RenderError>;
}

/// Built-in renderer producing plain text suitable for a terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRenderer;

impl RenderCollaborator for PlainRenderer {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn render_math(&self, expr: &str) -> Result<String, RenderError> {
        let mut depth = 0i32;
        for c in expr.chars() {
            match c {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                break;
            }
        }
        if depth != 0 {
            return Err(RenderError::new(self.name(), format!("unbalanced braces in `{expr}`")));
        }
        Ok(expr.trim().to_string())
    }

    fn render_html(&self, code: &str) -> Result<String, RenderError> {
        static TAG_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = TAG_REGEX.get_or_init(|| Regex::new(r"<[^>]*>").expect("Invalid HTML tag regex"));
        let text = re.replace_all(code, "");
        Ok(html_escape::decode_html_entities(&text).into_owned())
    }

    fn render_image(&self, href: &str, alt: &str) -> Result<String, RenderError> {
        let label = if alt.is_empty() { href } else { alt };
        Ok(format!("[image: {label}]"))
    }

    fn render_link(&self, href: &str, text: &str) -> Result<String, RenderError> {
        Ok(if text.trim().is_empty() { href } else { text }.to_string())
    }

    fn resolve_footnote(&self, label: &str) -> Result<String, RenderError> {
        if label.is_empty() || label.contains(char::is_whitespace) {
            return Err(RenderError::new(self.name(), format!("no footnote target for `{label}`")));
        }
        Ok(format!("[{label}]"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("<b>bold</b> &amp; more", "bold & more")]
    #[case("<br/>", "")]
    #[case("<span style=\"color:red\">x</span>", "x")]
    fn html_is_reduced_to_text(#[case] code: &str, #[case] expected: &str) {
        assert_eq!(PlainRenderer.render_html(code).unwrap(), expected);
    }

    #[test]
    fn math_with_unbalanced_braces_fails() {
        assert_eq!(PlainRenderer.render_math(" x^{2} ").unwrap(), "x^{2}");
        let err = PlainRenderer.render_math("\\frac{1}{2").unwrap_err();
        assert_eq!(err.collaborator, "plain");
    }

    #[test]
    fn image_falls_back_to_href() {
        assert_eq!(PlainRenderer.render_image("a.png", "").unwrap(), "[image: a.png]");
        assert_eq!(PlainRenderer.render_image("a.png", "cat").unwrap(), "[image: cat]");
    }

    #[test]
    fn link_shows_label_or_destination() {
        assert_eq!(PlainRenderer.render_link("https://a.io", "docs").unwrap(), "docs");
        assert_eq!(PlainRenderer.render_link("https://a.io", " ").unwrap(), "https://a.io");
    }

    #[test]
    fn footnote_resolves_to_bracketed_label() {
        assert_eq!(PlainRenderer.resolve_footnote("1").unwrap(), "[1]");
        assert!(PlainRenderer.resolve_footnote("").is_err());
    }
}
