/// Strips ASCII control characters (0x00-0x1F) from JSON-like text.
/// Upstream catalog documents occasionally carry embedded control bytes
/// that abort parsing; removing them is safe because raw control characters
/// are illegal inside JSON strings and everything else they could be is
/// insignificant whitespace.
pub fn sanitize_json(raw: &str) -> String {
    if raw.bytes().all(|byte| byte >= 0x20) {
        return raw.to_string();
    }
    raw.chars().filter(|ch| (*ch as u32) >= 0x20).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_control_characters_so_document_parses() {
        let raw = "{\"name\": \"game\u{0001}\", \"id\":\u{0000} 42}";
        assert!(serde_json::from_str::<serde_json::Value>(raw).is_err());

        let cleaned = sanitize_json(raw);
        let value: serde_json::Value = serde_json::from_str(&cleaned).expect("sanitized parse");
        assert_eq!(value["name"], "game");
        assert_eq!(value["id"], 42);
    }

    #[test]
    fn valid_document_is_value_identical_after_round_trip() {
        let raw = "{\n  \"version\": \"1.2.3\",\n  \"games\": [1, 2, 3]\n}";
        let before: serde_json::Value = serde_json::from_str(raw).expect("parse original");
        let after: serde_json::Value =
            serde_json::from_str(&sanitize_json(raw)).expect("parse sanitized");
        assert_eq!(before, after);
    }
}
