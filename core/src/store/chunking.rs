//! Size heuristics for splitting values across several attributes.

use crate::error::LedgerResult;
use serde::Serialize;
use serde_json::Value;

/// Default upper bound for one chunk, matching the host's string attribute limit.
pub const DEFAULT_CHUNK_BYTES: usize = 32767;

/// Approximate encoded size of `s`: 1 byte up to U+007F, 2 up to U+07FF,
/// 3 up to U+FFFF and 4 beyond. Only used for chunk sizing.
pub fn byte_size(s: &str) -> usize {
    s.chars()
        .map(|c| match c as u32 {
            0..=0x7f => 1,
            0x80..=0x7ff => 2,
            0x800..=0xffff => 3,
            _ => 4,
        })
        .sum()
}

/// Text form an item is measured by: strings as-is, numbers and booleans
/// by their display form, everything else as compact JSON.
fn item_text<T: Serialize>(item: &T) -> LedgerResult<String> {
    Ok(match serde_json::to_value(item)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}

/// Greedily pack `items` into ordered chunks whose summed `byte_size`
/// stays within `max_bytes`.
///
/// Items are never split. An item that on its own exceeds `max_bytes` ends
/// up alone in a chunk that is itself over the limit.
pub fn chunk_by_byte_size<T: Serialize + Clone>(
    items: &[T],
    max_bytes: usize,
) -> LedgerResult<Vec<Vec<T>>> {
    let mut chunks = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut current_size = 0usize;

    for item in items {
        let size = byte_size(&item_text(item)?);
        if current_size + size > max_bytes && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_size = 0;
        }
        current.push(item.clone());
        current_size += size;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn byte_size_counts_by_code_point_range() {
        assert_eq!(byte_size("abc"), 3);
        assert_eq!(byte_size("é"), 2);
        assert_eq!(byte_size("通貨"), 6);
        assert_eq!(byte_size("🪙"), 4);
        assert_eq!(byte_size(""), 0);
    }

    #[test]
    fn chunks_cover_items_in_order() {
        let items: Vec<Value> = (0..50).map(|i| json!({ "id": i, "name": "x".repeat(i) })).collect();
        let chunks = chunk_by_byte_size(&items, 200).unwrap();

        let flattened: Vec<Value> = chunks.iter().flatten().cloned().collect();
        assert_eq!(flattened, items);

        for chunk in chunks.iter().filter(|c| c.len() >= 2) {
            let total: usize = chunk.iter().map(|v| byte_size(&item_text(v).unwrap())).sum();
            assert!(total <= 200, "multi-item chunk of {total} bytes exceeds limit");
        }
    }

    #[test]
    fn oversized_item_sits_alone() {
        let items = vec![
            Value::String("aaaa".into()),
            Value::String("b".repeat(20)),
            Value::String("cc".into()),
        ];
        let chunks = chunk_by_byte_size(&items, 10).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1], vec![Value::String("b".repeat(20))]);
    }

    #[test]
    fn oversized_first_item_does_not_emit_empty_chunk() {
        let items = vec![Value::String("z".repeat(40)), json!(1)];
        let chunks = chunk_by_byte_size(&items, 10).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| !c.is_empty()));
    }

    #[test]
    fn scalars_are_measured_by_display_form() {
        let items = vec![json!(12345), json!(true), json!("ab")];
        // 5 + 4 + 2 = 11 bytes
        assert_eq!(chunk_by_byte_size(&items, 11).unwrap().len(), 1);
        assert_eq!(chunk_by_byte_size(&items, 10).unwrap().len(), 2);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let items: Vec<Value> = Vec::new();
        assert!(chunk_by_byte_size(&items, DEFAULT_CHUNK_BYTES).unwrap().is_empty());
    }
}
