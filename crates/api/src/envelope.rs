//! Success envelope.

use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

/// Wrap a payload in the success envelope, without meta.
pub fn success<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

/// Wrap a payload in the success envelope with a meta block.
pub fn success_with_meta<T: Serialize>(data: T, meta: Value) -> Json<Value> {
    Json(json!({ "success": true, "data": data, "meta": meta }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let Json(body) = success_with_meta(
            json!({"answer": 42}),
            json!({"provider": "plant-id", "processingTimeMs": 12}),
        );
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["answer"], 42);
        assert_eq!(body["meta"]["provider"], "plant-id");
    }
}
