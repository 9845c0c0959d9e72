// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
#[allow(dead_code)]
pub fn generate_markdown_content(size: usize) -> String {
    let base = "# Title\n\nParagraph with **strong**, *em* and `code` plus a [link](http://example.com).\n\n- Bullet with ~~strike~~\n- Another with $x^2$\n\n> Quoted *text*\n\n";
    base.repeat(size)
}

#[allow(dead_code)]
pub fn generate_inline_heavy(paragraphs: usize) -> String {
    let mut content = String::new();
    for i in 0..paragraphs {
        content.push_str(&format!(
            "Paragraph {i} has **bold *nested {i}* text**, ``two `ticks` ``, ![img](a.png) and <b>html</b>.\n\n"
        ));
    }
    content
}
