//! Markdown-aware text chunker.
//!
//! Splits a markdown document into self-describing [`Chunk`]s sized for
//! embedding and retrieval. The document is split on `##` subheadings; each
//! section that fits within `max_chars` becomes one chunk, and oversized
//! sections are packed greedily on paragraph boundaries (`\n\n`) to preserve
//! semantic coherence.
//!
//! Every chunk is prefixed with the document title line and its section
//! heading (when present) so it reads standalone when retrieved in
//! isolation. A single paragraph longer than `max_chars` is emitted whole —
//! splitting mid-paragraph would destroy the very coherence the prefix
//! scheme exists to preserve.

/// Default chunk size ceiling in characters.
pub const DEFAULT_MAX_CHARS: usize = 1500;

/// Section name used for content before the first `##` subheading.
const INTRO_SECTION: &str = "(intro)";

/// A contiguous, self-describing span of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Section name: the `##` heading stripped of markup, or `"(intro)"`.
    pub section: String,
}

/// Split a markdown document into contextualized chunks.
///
/// An empty document produces zero chunks. Chunks within a section preserve
/// paragraph order; chunks across sections preserve document order.
pub fn chunk_markdown(text: &str, max_chars: usize) -> Vec<Chunk> {
    let title = extract_title(text);
    let mut chunks = Vec::new();

    for (heading, body) in split_by_headings(text) {
        let section = if heading.is_empty() {
            INTRO_SECTION.to_string()
        } else {
            heading.trim_start_matches('#').trim().to_string()
        };

        // The preamble body already contains the title line (when one
        // exists), so it is never repeated as a prefix.
        let effective_title = if heading.is_empty() { "" } else { title };

        for piece in split_section_by_paragraphs(&body, effective_title, &heading, max_chars) {
            if piece.trim().is_empty() {
                continue;
            }
            chunks.push(Chunk {
                text: piece,
                section: section.clone(),
            });
        }
    }

    chunks
}

/// Return the document title line: the first line that is a single-`#`
/// heading. Returns `""` when the document has none.
fn extract_title(text: &str) -> &str {
    text.lines().find(|line| is_title_line(line)).unwrap_or("")
}

fn is_title_line(line: &str) -> bool {
    match line.strip_prefix('#') {
        Some(rest) => !rest.starts_with('#') && rest.starts_with(char::is_whitespace),
        None => false,
    }
}

fn is_subheading_line(line: &str) -> bool {
    match line.strip_prefix("##") {
        Some(rest) => !rest.starts_with('#') && rest.starts_with(char::is_whitespace),
        None => false,
    }
}

/// Split a document into `(heading, body)` sections on `##` subheadings.
///
/// Content before the first subheading (including any title line) becomes a
/// single section with an empty heading, omitted when blank. Headings keep
/// their `##` markup; bodies are trimmed. Empty input yields no sections.
fn split_by_headings(text: &str) -> Vec<(String, String)> {
    fn flush(sections: &mut Vec<(String, String)>, heading: Option<String>, body_lines: &[&str]) {
        let body = body_lines.join("\n").trim().to_string();
        match heading {
            Some(h) => sections.push((h, body)),
            // Preamble only counts when it has content.
            None if !body.is_empty() => sections.push((String::new(), body)),
            None => {}
        }
    }

    let mut sections = Vec::new();
    let mut heading: Option<String> = None;
    let mut body_lines: Vec<&str> = Vec::new();

    for line in text.lines() {
        if is_subheading_line(line) {
            flush(&mut sections, heading.take(), &body_lines);
            body_lines.clear();
            heading = Some(line.trim_end().to_string());
        } else {
            body_lines.push(line);
        }
    }
    flush(&mut sections, heading, &body_lines);

    sections
}

/// Chunk one section's body, prefixing each chunk with the title and
/// heading lines so it is self-describing.
///
/// Paragraphs are packed greedily up to `max_chars` (prefix included). A
/// single paragraph that alone exceeds `max_chars` is emitted as one
/// oversized chunk — the documented escape valve, not an error.
fn split_section_by_paragraphs(
    body: &str,
    title: &str,
    heading: &str,
    max_chars: usize,
) -> Vec<String> {
    let prefix: String = [title, heading]
        .iter()
        .filter(|part| !part.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n\n");

    let with_prefix = |text: &str| -> String {
        if prefix.is_empty() {
            text.to_string()
        } else if text.is_empty() {
            prefix.clone()
        } else {
            format!("{}\n\n{}", prefix, text)
        }
    };

    // Whole section fits in one chunk.
    if with_prefix(body).len() <= max_chars {
        return vec![with_prefix(body)];
    }

    let paragraphs: Vec<&str> = body
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for para in paragraphs {
        if !current.is_empty() {
            let mut candidate = current.join("\n\n");
            candidate.push_str("\n\n");
            candidate.push_str(para);
            if with_prefix(&candidate).len() > max_chars {
                out.push(with_prefix(&current.join("\n\n")));
                current.clear();
            } else {
                current.push(para);
                continue;
            }
        }

        // Escape valve: an unsplittable paragraph larger than max_chars is
        // emitted whole rather than truncated mid-word.
        if with_prefix(para).len() > max_chars {
            out.push(with_prefix(para));
        } else {
            current.push(para);
        }
    }

    if !current.is_empty() {
        out.push(with_prefix(&current.join("\n\n")));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- extract_title ----

    #[test]
    fn test_title_returns_h1_line() {
        assert_eq!(extract_title("# My Title\n\nSome content."), "# My Title");
    }

    #[test]
    fn test_title_empty_when_no_h1() {
        assert_eq!(extract_title("Just a paragraph.\n\nAnother paragraph."), "");
    }

    #[test]
    fn test_title_ignores_h2_headings() {
        assert_eq!(extract_title("## Section Heading\n\nContent."), "");
    }

    #[test]
    fn test_title_first_h1_only() {
        let text = "# First Title\n\n# Second Title\n\nContent.";
        assert_eq!(extract_title(text), "# First Title");
    }

    #[test]
    fn test_title_h1_after_h2_still_counts() {
        let text = "## Intro\n\n# Actual Title\n\nContent.";
        assert_eq!(extract_title(text), "# Actual Title");
    }

    // ---- split_by_headings ----

    #[test]
    fn test_split_no_h2_returns_single_preamble() {
        let result = split_by_headings("Just some preamble content.");
        assert_eq!(
            result,
            vec![("".to_string(), "Just some preamble content.".to_string())]
        );
    }

    #[test]
    fn test_split_empty_input_returns_no_sections() {
        assert!(split_by_headings("").is_empty());
    }

    #[test]
    fn test_split_single_h2_no_preamble() {
        let result = split_by_headings("## Section One\n\nBody text.");
        assert_eq!(
            result,
            vec![("## Section One".to_string(), "Body text.".to_string())]
        );
    }

    #[test]
    fn test_split_preamble_plus_one_h2() {
        let result = split_by_headings("# Title\n\n## Section\n\nBody.");
        assert_eq!(result.len(), 2);
        assert_eq!(result[0], ("".to_string(), "# Title".to_string()));
        assert_eq!(result[1], ("## Section".to_string(), "Body.".to_string()));
    }

    #[test]
    fn test_split_multiple_h2_sections() {
        let result = split_by_headings("## Alpha\n\nAlpha body.\n\n## Beta\n\nBeta body.");
        assert_eq!(result.len(), 2);
        assert_eq!(result[0], ("## Alpha".to_string(), "Alpha body.".to_string()));
        assert_eq!(result[1], ("## Beta".to_string(), "Beta body.".to_string()));
    }

    #[test]
    fn test_split_h2_with_empty_body() {
        let result = split_by_headings("## Heading\n\n## Another");
        assert_eq!(result[0], ("## Heading".to_string(), "".to_string()));
        assert_eq!(result[1], ("## Another".to_string(), "".to_string()));
    }

    #[test]
    fn test_split_h3_is_not_a_boundary() {
        let result = split_by_headings("## Section\n\n### Nested\n\nBody.");
        assert_eq!(result.len(), 1);
        assert!(result[0].1.contains("### Nested"));
    }

    // ---- split_section_by_paragraphs ----

    #[test]
    fn test_small_section_single_chunk() {
        let result = split_section_by_paragraphs("Short content.", "# Title", "## Heading", 1500);
        assert_eq!(result.len(), 1);
        assert!(result[0].contains("Short content."));
    }

    #[test]
    fn test_chunk_prefix_includes_title_and_heading() {
        let result = split_section_by_paragraphs("Content.", "# My Title", "## My Section", 1500);
        assert!(result[0].starts_with("# My Title\n\n## My Section\n\n"));
    }

    #[test]
    fn test_no_title_no_heading_prefix_is_empty() {
        let result = split_section_by_paragraphs("Content.", "", "", 1500);
        assert_eq!(result[0], "Content.");
    }

    #[test]
    fn test_two_paragraphs_split_when_combined_exceeds_max() {
        let para_a = "A".repeat(60);
        let para_b = "B".repeat(60);
        let text = format!("{}\n\n{}", para_a, para_b);
        let result = split_section_by_paragraphs(&text, "", "", 70);
        assert_eq!(result.len(), 2);
        assert!(result[0].contains(&para_a));
        assert!(result[1].contains(&para_b));
    }

    #[test]
    fn test_single_oversized_paragraph_fallback() {
        let huge = "X".repeat(2000);
        let result = split_section_by_paragraphs(&huge, "", "", 100);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0], huge);
    }

    #[test]
    fn test_single_oversized_paragraph_keeps_prefix() {
        let huge = "X".repeat(2000);
        let result = split_section_by_paragraphs(&huge, "# T", "## H", 100);
        assert_eq!(result.len(), 1);
        assert!(result[0].starts_with("# T\n\n## H\n\n"));
        assert!(result[0].contains(&huge));
    }

    #[test]
    fn test_title_only_no_heading() {
        let result = split_section_by_paragraphs("Body text.", "# Title", "", 1500);
        assert!(result[0].starts_with("# Title\n\n"));
        assert!(result[0].contains("Body text."));
    }

    #[test]
    fn test_empty_body_chunk_is_just_the_prefix() {
        let result = split_section_by_paragraphs("", "", "## Heading", 1500);
        assert_eq!(result, vec!["## Heading".to_string()]);
    }

    // ---- chunk_markdown ----

    #[test]
    fn test_section_only_document_single_chunk() {
        let chunks = chunk_markdown("## Section\n\nSome body text.", DEFAULT_MAX_CHARS);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section, "Section");
        assert!(chunks[0].text.contains("## Section"));
        assert!(chunks[0].text.contains("Some body text."));
    }

    #[test]
    fn test_title_preamble_plus_section_two_chunks() {
        let chunks = chunk_markdown("# Title\n\n## Section\n\nSome body text.", DEFAULT_MAX_CHARS);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section, "(intro)");
        assert_eq!(chunks[1].section, "Section");
        // Title carried into the section chunk for standalone context.
        assert!(chunks[1].text.contains("# Title"));
    }

    #[test]
    fn test_empty_document_zero_chunks() {
        assert!(chunk_markdown("", DEFAULT_MAX_CHARS).is_empty());
    }

    #[test]
    fn test_preamble_only_section_is_intro() {
        let chunks = chunk_markdown("Just preamble with no headings.", DEFAULT_MAX_CHARS);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section, "(intro)");
    }

    #[test]
    fn test_title_only_document_single_intro_chunk() {
        let chunks = chunk_markdown("# Title", DEFAULT_MAX_CHARS);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section, "(intro)");
        assert_eq!(chunks[0].text, "# Title");
    }

    #[test]
    fn test_title_not_repeated_in_preamble_chunk() {
        let chunks = chunk_markdown("# Doc Title\n\nThis is the intro.", DEFAULT_MAX_CHARS);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section, "(intro)");
        // The title appears once, as the first line of the preamble body.
        assert_eq!(chunks[0].text.matches("# Doc Title").count(), 1);
        assert!(chunks[0].text.starts_with("# Doc Title"));
    }

    #[test]
    fn test_large_section_is_sub_chunked() {
        let body = vec!["Paragraph text here. ".repeat(5); 10].join("\n\n");
        let text = format!("## Big Section\n\n{}", body);
        let chunks = chunk_markdown(&text, 200);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.section == "Big Section"));
        // Every chunk repeats the heading prefix.
        assert!(chunks.iter().all(|c| c.text.starts_with("## Big Section")));
    }

    #[test]
    fn test_multiple_sections_produce_multiple_chunks() {
        let chunks = chunk_markdown(
            "## Alpha\n\nAlpha content.\n\n## Beta\n\nBeta content.",
            DEFAULT_MAX_CHARS,
        );
        assert_eq!(chunks.len(), 2);
        let sections: Vec<&str> = chunks.iter().map(|c| c.section.as_str()).collect();
        assert_eq!(sections, vec!["Alpha", "Beta"]);
    }

    #[test]
    fn test_max_chars_respected_for_splittable_sections() {
        let para = "Word ".repeat(20);
        let body = vec![para; 20].join("\n\n");
        let text = format!("## Section\n\n{}", body);
        let chunks = chunk_markdown(&text, 300);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                chunk.text.len() <= 300,
                "chunk exceeded max_chars: {} chars",
                chunk.text.len()
            );
        }
    }

    #[test]
    fn test_heading_with_empty_body_still_chunked() {
        let chunks = chunk_markdown("## Heading\n\n## Another\n\nBody.", DEFAULT_MAX_CHARS);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "## Heading");
        assert_eq!(chunks[0].section, "Heading");
    }

    #[test]
    fn test_fits_within_max_returned_verbatim() {
        let text = "## S\n\nShort.";
        let chunks = chunk_markdown(text, DEFAULT_MAX_CHARS);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn test_reassembly_preserves_section_bodies_in_order() {
        let text = "# Guide\n\nIntro paragraph.\n\n## First\n\nAlpha one.\n\nAlpha two.\n\n## Second\n\nBeta one.";
        // Chunk small enough to force paragraph packing within sections.
        let chunks = chunk_markdown(text, 40);

        // Strip prefixes and rejoin; every source paragraph must survive in
        // document order.
        let title = "# Guide";
        let mut reassembled = Vec::new();
        for chunk in &chunks {
            let mut body = chunk.text.as_str();
            if chunk.section != "(intro)" {
                body = body
                    .strip_prefix(title)
                    .map(|b| b.trim_start())
                    .unwrap_or(body);
                body = body
                    .trim_start_matches(|c| c != '\n')
                    .trim_start(); // drop the heading line
            }
            if !body.is_empty() {
                reassembled.push(body.to_string());
            }
        }
        let flat = reassembled.join("\n\n");
        let expected_order = ["Intro paragraph.", "Alpha one.", "Alpha two.", "Beta one."];
        let mut last = 0;
        for needle in expected_order {
            let pos = flat[last..]
                .find(needle)
                .unwrap_or_else(|| panic!("missing paragraph: {}", needle));
            last += pos + needle.len();
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "# T\n\n## A\n\nAlpha.\n\n## B\n\nBeta.";
        let a = chunk_markdown(text, 50);
        let b = chunk_markdown(text, 50);
        assert_eq!(a, b);
    }
}
