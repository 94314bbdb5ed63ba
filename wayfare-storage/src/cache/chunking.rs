//! Splitting encoded values into chunks and putting them back together.

use wayfare_core::Timestamp;

use crate::store::CacheChunk;

/// Split `encoded` into consecutive slices of at most `max_bytes` bytes.
///
/// Always yields at least one slice. Slices end on char boundaries, so
/// non-ASCII input is never split inside a character.
pub fn split_payload(encoded: &str, max_bytes: usize) -> Vec<&str> {
    let max_bytes = max_bytes.max(1);
    if encoded.len() <= max_bytes {
        return vec![encoded];
    }

    let mut parts = Vec::with_capacity(encoded.len() / max_bytes + 1);
    let mut start = 0;
    while start < encoded.len() {
        let mut end = (start + max_bytes).min(encoded.len());
        while !encoded.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            // A single character wider than the bound.
            end = start + 1;
            while !encoded.is_char_boundary(end) {
                end += 1;
            }
        }
        parts.push(&encoded[start..end]);
        start = end;
    }
    parts
}

/// State of an entry after collecting its chunks.
#[derive(Debug, Clone, PartialEq)]
pub enum Assembly {
    /// Every chunk present and unexpired.
    Complete {
        payload: String,
        written_at: Timestamp,
    },
    /// Nothing stored under the key.
    Absent,
    /// Chunk 0 exists but the entry has gaps or mixes writes.
    Incomplete,
    /// At least one chunk of the entry has expired.
    Expired,
}

/// Rebuild an entry from the chunks stored under its key.
///
/// The entry is described by chunk 0. Chunks `0..chunk_count` must all be
/// present and share chunk 0's `written_at`; chunks past `chunk_count`
/// belong to an older, longer entry and are ignored.
pub fn assemble(mut chunks: Vec<CacheChunk>, now: Timestamp) -> Assembly {
    if chunks.is_empty() {
        return Assembly::Absent;
    }
    chunks.sort_by_key(|chunk| chunk.chunk_index);

    let (count, written_at) = match chunks.first() {
        Some(head) if head.chunk_index == 0 => (head.chunk_count as usize, head.written_at),
        _ => return Assembly::Incomplete,
    };
    if count == 0 || chunks.len() < count {
        return Assembly::Incomplete;
    }

    let entry = &chunks[..count];
    let contiguous = entry
        .iter()
        .enumerate()
        .all(|(i, chunk)| chunk.chunk_index as usize == i && chunk.written_at == written_at);
    if !contiguous {
        return Assembly::Incomplete;
    }
    if entry.iter().any(|chunk| chunk.is_expired(now)) {
        return Assembly::Expired;
    }

    let payload: String = entry.iter().map(|chunk| chunk.payload.as_str()).collect();
    Assembly::Complete {
        payload,
        written_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn entry(payload: &str, max: usize, written_at: Timestamp) -> Vec<CacheChunk> {
        let parts = split_payload(payload, max);
        let count = parts.len() as u32;
        parts
            .into_iter()
            .enumerate()
            .map(|(i, part)| CacheChunk {
                cache_key: "k".to_string(),
                chunk_index: i as u32,
                chunk_count: count,
                payload: part.to_string(),
                expires_at: written_at + Duration::hours(1),
                written_at,
            })
            .collect()
    }

    #[test]
    fn test_split_sizes() {
        let parts = split_payload("abcdefghij", 3);
        assert_eq!(parts, vec!["abc", "def", "ghi", "j"]);
        assert_eq!(split_payload("abc", 3), vec!["abc"]);
        assert_eq!(split_payload("", 3), vec![""]);
    }

    #[test]
    fn test_split_respects_char_boundaries() {
        let parts = split_payload("aéb", 2);
        assert_eq!(parts.concat(), "aéb");
        assert!(parts.iter().all(|p| p.len() <= 2));

        let wide = split_payload("🏝🏝", 1);
        assert_eq!(wide, vec!["🏝", "🏝"]);
    }

    #[test]
    fn test_assemble_complete() {
        let now = Utc::now();
        let chunks = entry("abcdefghij", 4, now);
        assert_eq!(
            assemble(chunks, now),
            Assembly::Complete {
                payload: "abcdefghij".to_string(),
                written_at: now,
            }
        );
    }

    #[test]
    fn test_assemble_out_of_order_input() {
        let now = Utc::now();
        let mut chunks = entry("abcdefghij", 4, now);
        chunks.reverse();
        assert!(matches!(assemble(chunks, now), Assembly::Complete { .. }));
    }

    #[test]
    fn test_missing_middle_chunk() {
        let now = Utc::now();
        let mut chunks = entry("abcdefghij", 4, now);
        chunks.remove(1);
        assert_eq!(assemble(chunks, now), Assembly::Incomplete);
    }

    #[test]
    fn test_missing_first_chunk() {
        let now = Utc::now();
        let mut chunks = entry("abcdefghij", 4, now);
        chunks.remove(0);
        assert_eq!(assemble(chunks, now), Assembly::Incomplete);
        assert_eq!(assemble(Vec::new(), now), Assembly::Absent);
    }

    #[test]
    fn test_orphans_from_longer_entry_ignored() {
        let old = Utc::now() - Duration::minutes(5);
        let now = Utc::now();
        let mut chunks = entry("0123456789abcdef", 4, old);
        let newer = entry("wxyz12", 4, now);
        for (i, chunk) in newer.into_iter().enumerate() {
            chunks[i] = chunk;
        }
        assert_eq!(
            assemble(chunks, now),
            Assembly::Complete {
                payload: "wxyz12".to_string(),
                written_at: now,
            }
        );
    }

    #[test]
    fn test_mixed_writes_incomplete() {
        let old = Utc::now() - Duration::minutes(5);
        let now = Utc::now();
        let mut chunks = entry("abcdefgh", 4, now);
        chunks[1].written_at = old;
        assert_eq!(assemble(chunks, now), Assembly::Incomplete);
    }

    #[test]
    fn test_any_expired_chunk_expires_entry() {
        let now = Utc::now();
        let mut chunks = entry("abcdefgh", 4, now);
        chunks[1].expires_at = now - Duration::seconds(1);
        assert_eq!(assemble(chunks, now), Assembly::Expired);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Concatenating the slices reproduces the input for any bound
        #[test]
        fn prop_split_concat(payload in "[A-Za-z0-9+/=]{0,600}", max in 1usize..128) {
            let parts = split_payload(&payload, max);
            prop_assert!(!parts.is_empty());
            prop_assert!(parts.iter().all(|p| p.len() <= max));
            prop_assert_eq!(parts.concat(), payload);
        }

        /// Arbitrary unicode survives splitting too
        #[test]
        fn prop_split_concat_unicode(payload in ".{0,80}", max in 1usize..16) {
            prop_assert_eq!(split_payload(&payload, max).concat(), payload);
        }
    }
}
