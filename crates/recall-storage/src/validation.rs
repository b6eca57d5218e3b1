//! Input validation: collected, not first-failure, so a caller sees every
//! offending field at once.

/// Validate a memory write's `content` and `tags` against the deployment's
/// `min_content_length`. Returns every offending field name.
pub fn validate_write(content: &str, tags: &[String], min_content_length: usize) -> Vec<String> {
    let mut fields = Vec::new();
    if content.chars().count() < min_content_length {
        fields.push("content".to_string());
    }
    if tags.len() < 2 || tags.len() > 6 {
        fields.push("tags".to_string());
    }
    fields
}

/// Validate an agent registration name (`1..100 chars`).
pub fn validate_register_name(name: &str) -> Vec<String> {
    let len = name.chars().count();
    if len < 1 || len > 100 {
        vec!["name".to_string()]
    } else {
        Vec::new()
    }
}

/// Validate a search query (`q: 1..500 chars`, `limit: 1..50`).
pub fn validate_search(query: &str, limit: usize) -> Vec<String> {
    let mut fields = Vec::new();
    let len = query.chars().count();
    if len < 1 || len > 500 {
        fields.push("q".to_string());
    }
    if limit < 1 || limit > 50 {
        fields.push("limit".to_string());
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_validation_flags_short_content() {
        let fields = validate_write("short", &["a".to_string(), "b".to_string()], 80);
        assert_eq!(fields, vec!["content".to_string()]);
    }

    #[test]
    fn write_validation_flags_bad_tag_counts() {
        let long = "x".repeat(100);
        assert_eq!(
            validate_write(&long, &["only-one".to_string()], 80),
            vec!["tags".to_string()]
        );
        let seven: Vec<String> = (0..7).map(|i| i.to_string()).collect();
        assert_eq!(validate_write(&long, &seven, 80), vec!["tags".to_string()]);
    }

    #[test]
    fn write_validation_passes_good_input() {
        let long = "x".repeat(100);
        assert!(validate_write(&long, &["a".to_string(), "b".to_string()], 80).is_empty());
    }

    #[test]
    fn register_name_validation() {
        assert_eq!(validate_register_name(""), vec!["name".to_string()]);
        assert!(validate_register_name("Alice").is_empty());
        assert_eq!(
            validate_register_name(&"x".repeat(101)),
            vec!["name".to_string()]
        );
    }

    #[test]
    fn search_validation() {
        assert!(validate_search("anything", 10).is_empty());
        assert_eq!(validate_search("", 10), vec!["q".to_string()]);
        assert_eq!(validate_search("q", 0), vec!["limit".to_string()]);
        assert_eq!(validate_search("q", 51), vec!["limit".to_string()]);
    }
}
