/// Fenced fragment extraction
///
/// Scans a markdown document for executable fences of the form
/// ```` ```lang: <code>``` ```` and yields them in document order.
use once_cell::sync::Lazy;
use regex::{CaptureMatches, Regex};
use std::iter::Enumerate;

/// Opening fence with a language tag immediately followed by a colon,
/// a non-greedy body, and a plain closing fence.
static FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?P<lang>[A-Za-z0-9_+.\-]+):\s+(?P<code>.*?)```")
        .expect("fence pattern is valid")
});

/// One executable fragment's source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFragment {
    language: String,
    raw: String,
    normalized: String,
}

impl CodeFragment {
    pub fn new(language: impl Into<String>, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let normalized = normalize(&raw);
        Self {
            language: language.into(),
            raw,
            normalized,
        }
    }

    /// Language tag written before the colon
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Body exactly as it appears in the document
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Body with empty lines removed; this is what gets executed and hashed
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Plain markdown fence used in the rendered output
    pub fn markdown(&self) -> String {
        if self.raw.ends_with('\n') {
            format!("\n```{}\n{}```\n", self.language, self.raw)
        } else {
            format!("\n```{}\n{}\n```\n", self.language, self.raw)
        }
    }
}

/// Drop empty lines. Whitespace-only lines are kept.
fn normalize(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A fragment together with where it sits in the source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedBlock {
    pub fragment: CodeFragment,
    /// Byte offset of the opening fence
    pub start: usize,
    /// Byte offset just past the closing fence
    pub end: usize,
    /// 0-based occurrence index
    pub position: usize,
}

/// Lazy, single-pass iterator over the fragments of one document
pub struct Blocks<'a> {
    matches: Enumerate<CaptureMatches<'static, 'a>>,
}

impl Iterator for Blocks<'_> {
    type Item = ExtractedBlock;

    fn next(&mut self) -> Option<Self::Item> {
        let (position, caps) = self.matches.next()?;
        let whole = caps.get(0)?;
        let language = caps.name("lang").map_or("", |m| m.as_str());
        let code = caps.name("code").map_or("", |m| m.as_str());

        Some(ExtractedBlock {
            fragment: CodeFragment::new(language, code),
            start: whole.start(),
            end: whole.end(),
            position,
        })
    }
}

/// Extract every executable fragment in left-to-right order
pub fn extract_all(document: &str) -> Blocks<'_> {
    Blocks {
        matches: FENCE.captures_iter(document).enumerate(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_single_block() {
        let doc = "before\n```python: a = 1\n_ = a + 1\n```\nafter";
        let blocks: Vec<_> = extract_all(doc).collect();

        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        assert_eq!(block.position, 0);
        assert_eq!(block.fragment.language(), "python");
        assert_eq!(block.fragment.raw(), "a = 1\n_ = a + 1\n");
        assert_eq!(&doc[block.start..block.end], "```python: a = 1\n_ = a + 1\n```");
    }

    #[test]
    fn test_extract_preserves_order_and_positions() {
        let doc = "```js: x = 1\n```\ntext\n```js: y = 2\n```\n```js: z = 3\n```";
        let blocks: Vec<_> = extract_all(doc).collect();

        assert_eq!(blocks.len(), 3);
        for (i, block) in blocks.iter().enumerate() {
            assert_eq!(block.position, i);
        }
        assert!(blocks[0].end <= blocks[1].start);
        assert!(blocks[1].end <= blocks[2].start);
        assert_eq!(blocks[2].fragment.raw(), "z = 3\n");
    }

    #[test]
    fn test_plain_fences_are_ignored() {
        let doc = "```rust\nfn main() {}\n```\n\n```python\nprint(1)\n```\n";
        assert_eq!(extract_all(doc).count(), 0);
    }

    #[test]
    fn test_normalized_drops_empty_lines() {
        let fragment = CodeFragment::new("js", "a = 1\n\n\nb = 2\n  \n");
        assert_eq!(fragment.normalized(), "a = 1\nb = 2\n  ");
    }

    #[test]
    fn test_markdown_rerender() {
        let fragment = CodeFragment::new("python", "a = 1\n");
        assert_eq!(fragment.markdown(), "\n```python\na = 1\n```\n");

        let inline = CodeFragment::new("js", "a = 1");
        assert_eq!(inline.markdown(), "\n```js\na = 1\n```\n");
    }

    #[test]
    fn test_body_may_contain_inline_backticks() {
        let doc = "```js: s = `x`\n_ = s\n```";
        let blocks: Vec<_> = extract_all(doc).collect();
        // The body stops at the first triple backtick, single ones are kept
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].fragment.raw(), "s = `x`\n_ = s\n");
    }
}
