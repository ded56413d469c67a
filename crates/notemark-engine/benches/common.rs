// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
#[allow(dead_code)]
pub fn generate_note(sections: usize) -> String {
    let base = "# Title\n\n## Section\n\nParagraph with *some* **content** and a [[Linked Note]].\n\n- Bullet point with `code`\n  - Nested item\n- Another item, see https://example.com\n\n```rust\nfn example() {\n    println!(\"Hello\");\n}\n```\n\n";
    base.repeat(sections)
}

/// UTF-16 offset just past the first "Paragraph with " in the middle section.
#[allow(dead_code)]
pub fn middle_paragraph_offset(note: &str) -> u32 {
    let middle = note.len() / 2;
    let at = note[middle..]
        .find("Paragraph with ")
        .map_or(middle, |i| middle + i + "Paragraph with ".len());
    note[..at].encode_utf16().count() as u32
}
