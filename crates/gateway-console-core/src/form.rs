pub const FORM_URLENCODED_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
pub const BODY_LABEL_JSON: &str = "Body (JSON)";
pub const BODY_LABEL_FORM_ENCODED: &str = "Body (JSON) - Auto-converts to form data";

/// Label for the request-body editor given the selected content type.
#[must_use]
pub fn body_label_for_content_type(selected: Option<&str>) -> &'static str {
    match selected {
        Some(FORM_URLENCODED_CONTENT_TYPE) => BODY_LABEL_FORM_ENCODED,
        _ => BODY_LABEL_JSON,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_encoding_is_called_out() {
        let label = body_label_for_content_type(Some("application/x-www-form-urlencoded"));
        assert!(label.contains("Auto-converts to form data"));
    }

    #[test]
    fn everything_else_is_plain_json() {
        assert_eq!(body_label_for_content_type(Some("application/json")), "Body (JSON)");
        assert_eq!(body_label_for_content_type(Some("text/plain")), "Body (JSON)");
        assert_eq!(body_label_for_content_type(Some("")), "Body (JSON)");
        assert_eq!(body_label_for_content_type(None), "Body (JSON)");
        // Exact match only.
        assert_eq!(
            body_label_for_content_type(Some("application/x-www-form-urlencoded; charset=utf-8")),
            "Body (JSON)"
        );
    }
}
