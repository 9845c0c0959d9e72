//! # Inline Extensions
//!
//! Scanners for the syntax the Markdown lexer does not report on its own
//! inside a single block. Each one takes a text token and returns it split
//! into plain text around whatever it recognised.

pub mod autolink;
pub mod cursor;
pub mod footnote;

pub use autolink::split_autolinks;
pub use footnote::split_footnotes;
