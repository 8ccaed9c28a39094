//! Locating JSON embedded in model output.
//!
//! Even when prompted for bare JSON, models wrap the object in markdown
//! fences, lead with prose, or tack on stray braces. Rather than lexing
//! the text by hand, this walks the candidate `{` positions and lets
//! serde_json's stream deserializer pull the first complete value off
//! each one; the first well-formed object wins, and anything after it is
//! ignored.

use serde_json::Value;

/// Find and parse the first JSON object in a model response.
///
/// Returns `None` when the text contains no well-formed object.
pub fn first_json_object(text: &str) -> Option<Value> {
    for (start, _) in text.match_indices('{') {
        let mut stream =
            serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            if value.is_object() {
                return Some(value);
            }
        }
    }
    None
}

/// Find the first JSON object and deserialize it into `T`.
///
/// A present-but-mismatched object is still `None`; callers decide
/// whether that is a sentinel case or an error.
pub fn first_json_as<T: serde::de::DeserializeOwned>(text: &str) -> Option<T> {
    serde_json::from_value(first_json_object(text)?).ok()
}
