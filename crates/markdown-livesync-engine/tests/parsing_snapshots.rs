use markdown_livesync_config::SyntaxConfig;
use markdown_livesync_engine::Document;
use markdown_livesync_engine::parsing::{full_parse, snapshot};

#[test]
fn fixture_mixed() {
    assert_fixture("mixed");
}

fn assert_fixture(name: &str) {
    let md = std::fs::read_to_string(format!(
        "{}/tests/fixtures/{name}.md",
        env!("CARGO_MANIFEST_DIR")
    ))
    .unwrap();

    let doc = Document::from_markdown(&md);
    let (result, _) = full_parse(&doc, &SyntaxConfig::default());
    snapshot::invariants(&doc, &result);

    let snap = snapshot::normalize(&doc, &result);
    insta::assert_snapshot!(name, snap.trim_end());
}

/// Every markup and punctuation span slices back to the literal source.
#[test]
fn lossless_span_invariant() {
    let md = "Hello **world** and [a link](https://x.y)!";
    let doc = Document::from_markdown(md);
    let (result, _) = full_parse(&doc, &SyntaxConfig::default());

    let strong = &result.markups[0];
    assert_eq!(doc.slice(strong.context), "**world**");
    assert_eq!(doc.slice(strong.content()), "world");

    let link = &result.markups[1];
    let parts: Vec<String> = link.punctuation.iter().map(|p| doc.slice(*p)).collect();
    assert_eq!(parts, vec!["[", "](", ")"]);
    assert_eq!(doc.serialize_with(&result), format!("{md}\n"));
}
