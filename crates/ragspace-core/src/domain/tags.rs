//! Normalization of upload metadata into tags and allowed roles.

use serde_json::Value;

/// Extract and normalize `metadata.tags`: trimmed, deduplicated, order kept.
pub fn normalize_tags(metadata: &Value) -> Vec<String> {
    normalize_string_list(metadata.get("tags"), false)
}

/// Extract and normalize `metadata.allowed_roles`: lowercased for stable
/// comparisons, deduplicated, order kept.
pub fn normalize_allowed_roles(metadata: &Value) -> Vec<String> {
    normalize_string_list(metadata.get("allowed_roles"), true)
}

fn normalize_string_list(value: Option<&Value>, lowercase: bool) -> Vec<String> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let Some(raw) = item.as_str() else { continue };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        let normalized = if lowercase {
            trimmed.to_lowercase()
        } else {
            trimmed.to_string()
        };
        if !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tags_are_trimmed_and_deduplicated_in_order() {
        let metadata = json!({"tags": [" hr ", "policy", "hr", "", 42]});
        assert_eq!(normalize_tags(&metadata), vec!["hr", "policy"]);
    }

    #[test]
    fn allowed_roles_are_lowercased() {
        let metadata = json!({"allowed_roles": ["Admin", "EMPLOYEE", "admin"]});
        assert_eq!(
            normalize_allowed_roles(&metadata),
            vec!["admin", "employee"]
        );
    }

    #[test]
    fn missing_or_non_array_yields_empty() {
        assert!(normalize_tags(&json!({})).is_empty());
        assert!(normalize_tags(&json!({"tags": "not-a-list"})).is_empty());
    }
}
