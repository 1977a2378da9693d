//! Structure-preserving chunker for technical documents.
//!
//! Keeps fenced code blocks intact, keeps markdown headers attached to the
//! paragraph that follows them, packs paragraphs per section up to the size
//! limit, and then threads a tail-slice overlap between adjacent chunks.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{CoreError, CoreResult};

fn code_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```.*?```").expect("static regex"))
}

fn md_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(#{1,6})\s+(.+)$").expect("static regex"))
}

fn paragraph_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").expect("static regex"))
}

struct Section {
    content: String,
}

pub struct StructuredTextChunker {
    max_chunk_size: usize,
    overlap: usize,
}

impl StructuredTextChunker {
    pub fn new(max_chunk_size: usize, overlap: usize) -> CoreResult<Self> {
        if max_chunk_size == 0 {
            return Err(CoreError::validation("max_chunk_size must be > 0"));
        }
        if overlap >= max_chunk_size {
            return Err(CoreError::validation(
                "overlap must be less than max_chunk_size",
            ));
        }
        Ok(Self {
            max_chunk_size,
            overlap,
        })
    }

    pub fn chunk(&self, text: &str) -> Vec<String> {
        let raw = text.trim();
        if raw.is_empty() {
            return Vec::new();
        }

        // 1) Protect fenced code blocks; they are never split.
        let mut code_blocks: Vec<String> = Vec::new();
        let protected = code_block_re().replace_all(raw, |caps: &regex::Captures<'_>| {
            code_blocks.push(caps[0].to_string());
            format!("\u{0}CODE_{}\u{0}", code_blocks.len() - 1)
        });

        // 2) Split into header-delimited sections.
        let sections = split_by_headers(&protected);

        // 3) Pack paragraphs per section up to the size limit.
        let mut packed: Vec<String> = Vec::new();
        for section in &sections {
            packed.extend(self.pack_section(section));
        }

        // 4) Restore the protected blocks.
        let restored: Vec<String> = packed
            .into_iter()
            .map(|mut chunk| {
                for (i, block) in code_blocks.iter().enumerate() {
                    chunk = chunk.replace(&format!("\u{0}CODE_{i}\u{0}"), block);
                }
                chunk.trim().to_string()
            })
            .filter(|chunk| !chunk.is_empty())
            .collect();

        // 5) Thread continuity between adjacent chunks.
        self.apply_overlap(restored)
    }

    fn pack_section(&self, section: &Section) -> Vec<String> {
        let paragraphs: Vec<&str> = paragraph_break_re()
            .split(&section.content)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let mut chunks: Vec<String> = Vec::new();
        let mut current = String::new();

        for paragraph in paragraphs {
            let candidate = if current.is_empty() {
                paragraph.to_string()
            } else {
                format!("{current}\n\n{paragraph}")
            };

            if candidate.chars().count() > self.max_chunk_size && !current.is_empty() {
                chunks.push(current.trim().to_string());
                current = paragraph.to_string();
            } else {
                current = candidate;
            }
        }

        if !current.trim().is_empty() {
            chunks.push(current.trim().to_string());
        }

        chunks
    }

    fn apply_overlap(&self, chunks: Vec<String>) -> Vec<String> {
        if chunks.is_empty() || self.overlap == 0 {
            return chunks;
        }

        let mut out: Vec<String> = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push(chunk.clone());
                continue;
            }

            let prev = &out[i - 1];
            let prev_chars: Vec<char> = prev.chars().collect();
            let tail: String = prev_chars[prev_chars.len().saturating_sub(self.overlap)..]
                .iter()
                .collect();
            out.push(format!("{}\n\n{}", tail, chunk).trim().to_string());
        }

        out
    }
}

/// Sections are header + following content; header-less documents form one
/// section.
fn split_by_headers(text: &str) -> Vec<Section> {
    let matches: Vec<_> = md_header_re().find_iter(text).collect();
    if matches.is_empty() {
        return vec![Section {
            content: text.to_string(),
        }];
    }

    let mut sections: Vec<Section> = Vec::new();
    let mut last_end = 0usize;

    for m in &matches {
        if m.start() > last_end {
            let prev = text[last_end..m.start()].trim();
            if !prev.is_empty() {
                sections.push(Section {
                    content: prev.to_string(),
                });
            }
        }
        sections.push(Section {
            content: m.as_str().trim().to_string(),
        });
        last_end = m.end();
    }

    let tail = text[last_end..].trim();
    if !tail.is_empty() {
        sections.push(Section {
            content: tail.to_string(),
        });
    }

    // Keep each header glued to the content right after it.
    let mut merged: Vec<Section> = Vec::new();
    let mut i = 0;
    while i < sections.len() {
        if sections[i].content.starts_with('#') && i + 1 < sections.len() {
            merged.push(Section {
                content: format!("{}\n\n{}", sections[i].content, sections[i + 1].content),
            });
            i += 2;
        } else {
            merged.push(Section {
                content: sections[i].content.clone(),
            });
            i += 1;
        }
    }

    merged
}
