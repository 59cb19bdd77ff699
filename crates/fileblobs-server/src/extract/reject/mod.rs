//! Request extractors that reject with the server's JSON [`Error`].
//!
//! [`Error`]: crate::handler::Error

mod enhanced_form;
mod enhanced_json;
mod enhanced_path;
mod enhanced_query;
mod validated_json;

pub use self::enhanced_form::{Form, FormOrJson};
pub use self::enhanced_json::Json;
pub use self::enhanced_path::Path;
pub use self::enhanced_query::Query;
pub use self::validated_json::ValidateJson;

/// Keeps rejection details short enough to return to clients.
fn sanitize_error_message(message: &str) -> String {
    let lines = message.lines().take(3).collect::<Vec<_>>();
    lines.join(" ").chars().take(200).collect()
}

/// Pulls the field name out of serde messages like ``missing field `path` ``.
fn extract_field_name_from_error(error_message: &str) -> Option<&str> {
    let start = error_message.find('`')?;
    let end = error_message[start + 1..].find('`')?;
    Some(&error_message[start + 1..start + 1 + end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_name_from_serde_message() {
        assert_eq!(
            extract_field_name_from_error("missing field `path`"),
            Some("path")
        );
        assert_eq!(extract_field_name_from_error("invalid type"), None);
    }

    #[test]
    fn sanitize_truncates() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_error_message(&long).len(), 200);
        assert_eq!(sanitize_error_message("a\nb\nc\nd"), "a b c");
    }
}
