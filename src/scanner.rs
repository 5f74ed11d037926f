use crate::signatures::{EndStrategy, FormatTag, SignatureTable};
use memchr::memmem;
use std::collections::{HashMap, HashSet};

/// An unresolved signature match. Becomes a payload only after the resolver
/// accepts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub offset: usize,
    pub format: FormatTag,
    pub pattern_len: usize,
    pub strategy: EndStrategy,
}

/// Locate every candidate in the blob: one forward pass of the compiled
/// multi-pattern matcher, then per-signature de-overlap (a hit starting
/// inside the previous hit's pattern bytes is skipped) and a same-offset
/// tie-break that keeps only the longest pattern.
///
/// Output is grouped in table order, ascending offset within each signature.
/// Pure function of its inputs; payload resolution is a separate phase.
pub fn scan(blob: &[u8], table: &SignatureTable) -> Vec<Candidate> {
    let Some(matcher) = table.matcher() else {
        return Vec::new();
    };
    let signatures = table.signatures();

    let mut hits_per_signature: Vec<Vec<usize>> = vec![Vec::new(); signatures.len()];
    for mat in matcher.find_overlapping_iter(blob) {
        hits_per_signature[mat.pattern().as_usize()].push(mat.start());
    }

    let mut candidates = Vec::new();
    for (idx, hits) in hits_per_signature.iter().enumerate() {
        let sig = &signatures[idx];
        let mut next_allowed = 0usize;
        for &start in hits {
            if start < next_allowed {
                continue;
            }
            candidates.push(Candidate {
                offset: start,
                format: sig.format,
                pattern_len: sig.pattern.len(),
                strategy: sig.strategy,
            });
            next_allowed = start + sig.pattern.len();
        }
    }

    dedup_same_offset(&mut candidates);
    candidates
}

/// Two signatures may claim the same offset (the bare SOI prefix under a
/// JFIF marker); the longest pattern wins, table order breaks exact ties.
fn dedup_same_offset(candidates: &mut Vec<Candidate>) {
    let mut longest: HashMap<usize, usize> = HashMap::new();
    for c in candidates.iter() {
        let entry = longest.entry(c.offset).or_insert(c.pattern_len);
        if c.pattern_len > *entry {
            *entry = c.pattern_len;
        }
    }
    let mut taken: HashSet<usize> = HashSet::new();
    candidates.retain(|c| c.pattern_len == longest[&c.offset] && taken.insert(c.offset));
}

/// First occurrence of a single magic; the container inspector's primitive.
pub fn find_first(blob: &[u8], pattern: &[u8]) -> Option<usize> {
    memmem::find(blob, pattern)
}
