//! Rebuild plain-text abstracts from inverted indexes
//!
//! Snapshots store abstracts as word → positions maps:
//! ```json
//! {"Despite": [0], "growing": [1], "interest": [2, 50], ...}
//! ```
//!
//! Words are flattened to (position, word) pairs, sorted by position
//! and joined with single spaces.

use serde_json::{Map, Value};

/// Reconstruct the word sequence of an inverted index.
///
/// Non-integer positions are ignored. Tied positions keep the map's key
/// order (sorted by word), so output is deterministic for a given input.
///
/// # Example
/// ```
/// use serde_json::json;
/// use oaindex_ingest::abstract_decode::decode_inverted_index;
///
/// let index = json!({"a": [2], "fox": [0], "quick": [1]});
/// let text = decode_inverted_index(index.as_object().unwrap());
/// assert_eq!(text, "fox quick a");
/// ```
pub fn decode_inverted_index(index: &Map<String, Value>) -> String {
    let mut pairs: Vec<(u64, &str)> = index
        .iter()
        .filter_map(|(word, positions)| Some((word, positions.as_array()?)))
        .flat_map(|(word, positions)| {
            positions
                .iter()
                .filter_map(Value::as_u64)
                .map(move |p| (p, word.as_str()))
        })
        .collect();

    // Stable: ties stay in key order
    pairs.sort_by_key(|(pos, _)| *pos);

    let mut text = String::with_capacity(pairs.iter().map(|(_, w)| w.len() + 1).sum());
    for (i, (_, word)) in pairs.iter().enumerate() {
        if i > 0 {
            text.push(' ');
        }
        text.push_str(word);
    }
    text
}

/// Decode an `abstract_inverted_index` value.
///
/// Returns None if the value is missing, null, not an object, or empty.
pub fn decode_abstract(value: Option<&Value>) -> Option<String> {
    let obj = value?.as_object()?;
    let text = decode_inverted_index(obj);
    if text.is_empty() { None } else { Some(text) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(v: Value) -> String {
        decode_inverted_index(v.as_object().unwrap())
    }

    #[test]
    fn empty_index() {
        assert_eq!(decode(json!({})), "");
    }

    #[test]
    fn sorts_by_position() {
        assert_eq!(decode(json!({"a": [2], "fox": [0], "quick": [1]})), "fox quick a");
        assert_eq!(decode(json!({"alpha": [1], "beta": [0]})), "beta alpha");
    }

    #[test]
    fn repeated_word() {
        assert_eq!(
            decode(json!({"the": [0, 2], "cat": [1], "sat": [3]})),
            "the cat the sat"
        );
    }

    #[test]
    fn gaps_in_positions_are_closed() {
        assert_eq!(decode(json!({"end": [40], "start": [3]})), "start end");
    }

    #[test]
    fn tied_positions_are_deterministic() {
        let a = decode(json!({"zeta": [0], "eta": [0], "mid": [1]}));
        let b = decode(json!({"eta": [0], "mid": [1], "zeta": [0]}));
        assert_eq!(a, b);
        assert_eq!(a, "eta zeta mid");
    }

    #[test]
    fn malformed_positions_skipped() {
        assert_eq!(
            decode(json!({"ok": [0], "bad": "x", "neg": [-1], "frac": [1.5], "also": [1]})),
            "ok also"
        );
    }

    #[test]
    fn decode_abstract_null_or_empty() {
        assert_eq!(decode_abstract(None), None);
        assert_eq!(decode_abstract(Some(&Value::Null)), None);
        assert_eq!(decode_abstract(Some(&json!({}))), None);
        assert_eq!(decode_abstract(Some(&json!([1, 2]))), None);
    }

    #[test]
    fn decode_abstract_valid() {
        let val = json!({"Hello": [0], "world": [1]});
        assert_eq!(decode_abstract(Some(&val)), Some("Hello world".to_string()));
    }
}
