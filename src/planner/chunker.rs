// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Splits a source file into token-bounded chunks
//!
//! Small files stay whole. Larger files are cut along their top-level
//! callable declarations; files with none are sliced at line boundaries.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::syntax::{self, Dialect};
use crate::utils::{estimate_tokens, tokens_to_chars};

/// Upper bound on slices produced for a file without declarations
pub const MAX_SLICES: usize = 12;

/// What a chunk contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// The whole file, or a slice of it
    Module,
    Function,
    Hook,
    Component,
}

impl ChunkKind {
    /// Classify a declaration by naming convention
    pub fn from_name(name: &str) -> Self {
        let mut chars = name.chars();
        match chars.next() {
            Some(c) if c.is_ascii_uppercase() => ChunkKind::Component,
            _ if name.starts_with("use")
                && name[3..].chars().next().is_none_or(|c| c.is_ascii_uppercase()) =>
            {
                ChunkKind::Hook
            }
            _ => ChunkKind::Function,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Module => "module",
            ChunkKind::Function => "function",
            ChunkKind::Hook => "hook",
            ChunkKind::Component => "component",
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A token-bounded piece of one source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// `<path>#module`, `<path>#<name>` or `<path>#slice-<offset>`
    pub id: String,
    /// Human label: `module`, the declaration name, or `part-N`
    pub label: String,
    pub code: String,
    pub kind: ChunkKind,
    pub approx_tokens: u32,
}

impl Chunk {
    fn new(id: String, label: String, code: String, kind: ChunkKind) -> Self {
        let approx_tokens = estimate_tokens(&code);
        Self {
            id,
            label,
            code,
            kind,
            approx_tokens,
        }
    }
}

/// Split `source` into chunks no larger than `max_tokens`.
///
/// An empty result means the file cannot be chunked under this budget.
pub fn chunk(rel_path: &str, source: &str, max_tokens: u32) -> Vec<Chunk> {
    if estimate_tokens(source) <= max_tokens {
        return vec![Chunk::new(
            format!("{}#module", rel_path),
            "module".to_string(),
            source.to_string(),
            ChunkKind::Module,
        )];
    }

    let mut chunks = declaration_chunks(rel_path, source);
    if chunks.is_empty() {
        chunks = slice_chunks(rel_path, source, max_tokens);
    }

    let before = chunks.len();
    chunks.retain(|c| c.approx_tokens <= max_tokens);
    if chunks.len() < before {
        tracing::debug!(
            path = rel_path,
            dropped = before - chunks.len(),
            max_tokens,
            "dropped chunks over budget"
        );
    }
    chunks
}

fn declaration_chunks(rel_path: &str, source: &str) -> Vec<Chunk> {
    let Ok(tree) = syntax::parse(source, Dialect::for_path(rel_path)) else {
        return Vec::new();
    };

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut chunks = Vec::new();

    for decl in syntax::top_level_declarations(&tree, source) {
        if !decl.kind.is_callable() {
            continue;
        }
        let count = seen.entry(decl.name.clone()).or_insert(0);
        *count += 1;
        let id_name = if *count == 1 {
            decl.name.clone()
        } else {
            format!("{}-{}", decl.name, count)
        };

        chunks.push(Chunk::new(
            format!("{}#{}", rel_path, id_name),
            id_name,
            source[decl.range.clone()].to_string(),
            ChunkKind::from_name(&decl.name),
        ));
    }

    chunks
}

fn slice_chunks(rel_path: &str, source: &str, max_tokens: u32) -> Vec<Chunk> {
    let total_chars = source.chars().count();
    let slice_chars = tokens_to_chars(max_tokens).max(total_chars.div_ceil(MAX_SLICES));

    let mut pieces: Vec<(usize, String)> = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;
    let mut current_offset = 0;
    let mut offset = 0;

    for line in source.split_inclusive('\n') {
        let line_chars = line.chars().count();
        let last_slot = pieces.len() + 1 >= MAX_SLICES;
        if !current.is_empty() && current_chars + line_chars > slice_chars && !last_slot {
            pieces.push((current_offset, std::mem::take(&mut current)));
            current_chars = 0;
            current_offset = offset;
        }
        current.push_str(line);
        current_chars += line_chars;
        offset += line.len();
    }
    if !current.trim().is_empty() {
        pieces.push((current_offset, current));
    }

    pieces
        .into_iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .enumerate()
        .map(|(i, (offset, text))| {
            Chunk::new(
                format!("{}#slice-{}", rel_path, offset),
                format!("part-{}", i + 1),
                text,
                ChunkKind::Module,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn padded_fn(name: &str, lines: usize) -> String {
        let mut body = format!("export function {}(x: number) {{\n", name);
        for i in 0..lines {
            body.push_str(&format!("  const v{} = x + {};\n", i, i));
        }
        body.push_str("  return x;\n}\n");
        body
    }

    #[test]
    fn test_small_file_is_single_module_chunk() {
        let source = "export const add = (a: number, b: number) => a + b;\n";
        let chunks = chunk("src/math.ts", source, 1000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "src/math.ts#module");
        assert_eq!(chunks[0].kind, ChunkKind::Module);
        assert_eq!(chunks[0].code, source);
    }

    #[test]
    fn test_split_by_declarations() {
        let source = format!(
            "import x from 'x';\n{}\n{}\n{}",
            padded_fn("parseDate", 10),
            padded_fn("useClock", 10),
            padded_fn("Calendar", 10),
        );
        let chunks = chunk("src/cal.tsx", &source, 120);
        let summary: Vec<(&str, ChunkKind)> =
            chunks.iter().map(|c| (c.id.as_str(), c.kind)).collect();
        assert_eq!(
            summary,
            vec![
                ("src/cal.tsx#parseDate", ChunkKind::Function),
                ("src/cal.tsx#useClock", ChunkKind::Hook),
                ("src/cal.tsx#Calendar", ChunkKind::Component),
            ]
        );
        assert!(chunks[0].code.starts_with("export function parseDate"));
    }

    #[test]
    fn test_duplicate_names_get_suffix() {
        let source = format!("{}{}", padded_fn("run", 20), padded_fn("run", 20));
        let chunks = chunk("a.ts", &source, 150);
        assert_eq!(chunks[0].id, "a.ts#run");
        assert_eq!(chunks[1].id, "a.ts#run-2");
    }

    #[test]
    fn test_oversized_declaration_dropped() {
        let source = format!("{}{}", padded_fn("small", 2), padded_fn("huge", 200));
        let chunks = chunk("a.ts", &source, 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].label, "small");
    }

    #[test]
    fn test_slices_when_no_declarations() {
        let source: String = (0..400).map(|i| format!("console.log({});\n", i)).collect();
        let chunks = chunk("script.js", &source, 400);
        assert!(chunks.len() > 1);
        assert!(chunks.len() <= MAX_SLICES);
        assert_eq!(chunks[0].id, "script.js#slice-0");
        assert_eq!(chunks[0].label, "part-1");
        let rejoined: String = chunks.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(rejoined, source);
    }

    #[test]
    fn test_unchunkable_file_yields_nothing() {
        let source = format!("const blob = \"{}\";\n", "x".repeat(10_000));
        assert!(chunk("blob.ts", &source, 100).is_empty());
    }

    #[test]
    fn test_kind_from_name() {
        assert_eq!(ChunkKind::from_name("Button"), ChunkKind::Component);
        assert_eq!(ChunkKind::from_name("useThing"), ChunkKind::Hook);
        assert_eq!(ChunkKind::from_name("use"), ChunkKind::Hook);
        assert_eq!(ChunkKind::from_name("user"), ChunkKind::Function);
        assert_eq!(ChunkKind::from_name("format"), ChunkKind::Function);
    }

    proptest! {
        #[test]
        fn prop_small_sources_stay_whole(source in "[a-z =;\n]{0,200}") {
            let chunks = chunk("p.ts", &source, 100);
            prop_assert_eq!(chunks.len(), 1);
            prop_assert_eq!(&chunks[0].code, &source);
        }

        #[test]
        fn prop_chunks_respect_budget(lines in 1usize..300, budget in 20u32..400) {
            let source: String = (0..lines).map(|i| format!("call({});\n", i)).collect();
            for c in chunk("p.js", &source, budget) {
                prop_assert!(c.approx_tokens <= budget);
            }
        }

        #[test]
        fn prop_chunking_is_deterministic(lines in 1usize..200, budget in 20u32..200) {
            let source: String = (0..lines).map(|i| format!("step({});\n", i)).collect();
            prop_assert_eq!(chunk("p.js", &source, budget), chunk("p.js", &source, budget));
        }
    }
}
