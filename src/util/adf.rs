use serde_json::Value;

/// Flatten an Atlassian Document Format body (or a plain string, as older
/// Jira APIs return) into card text. Whitespace is collapsed since the card
/// only ever shows one paragraph.
pub fn extract_text_from_adf(value: &Value) -> Option<String> {
    let mut parts = Vec::new();
    collect_text(value, &mut parts);
    let text = parts.join(" ");
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

fn collect_text(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(arr) => arr.iter().for_each(|v| collect_text(v, out)),
        Value::Object(obj) => match obj.get("type").and_then(|v| v.as_str()) {
            Some("text") => {
                if let Some(text) = obj.get("text").and_then(|v| v.as_str()) {
                    out.push(text.to_string());
                }
            }
            Some("mention") => {
                if let Some(text) = obj
                    .get("attrs")
                    .and_then(|a| a.get("text"))
                    .and_then(|v| v.as_str())
                {
                    out.push(text.to_string());
                }
            }
            _ => {
                if let Some(content) = obj.get("content") {
                    collect_text(content, out);
                }
            }
        },
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_string_passes_through() {
        assert_eq!(
            extract_text_from_adf(&json!("  Tray   two jams ")),
            Some("Tray two jams".to_string())
        );
    }

    #[test]
    fn paragraphs_are_joined() {
        let doc = json!({
            "type": "doc",
            "content": [
                {"type": "paragraph", "content": [{"type": "text", "text": "First."}]},
                {"type": "paragraph", "content": [
                    {"type": "text", "text": "Ask"},
                    {"type": "mention", "attrs": {"text": "@bob"}},
                    {"type": "text", "text": "about it."}
                ]}
            ]
        });
        assert_eq!(
            extract_text_from_adf(&doc),
            Some("First. Ask @bob about it.".to_string())
        );
    }

    #[test]
    fn empty_documents_are_none() {
        assert_eq!(extract_text_from_adf(&Value::Null), None);
        assert_eq!(extract_text_from_adf(&json!({"type": "doc", "content": []})), None);
    }
}
