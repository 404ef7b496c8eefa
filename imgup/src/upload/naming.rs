//! Stored filename generation.

use std::path::Path;

use chrono::Utc;
use rand::prelude::RngExt;
use rand::rng;

/// Upper bound (exclusive) of the random suffix.
const SUFFIX_RANGE: u32 = 1_000_000_000;

/// Build a stored filename: `{field}-{unix millis}-{random}{.ext}`.
///
/// The extension is taken verbatim from the original name (case preserved, leading dot
/// included). Uniqueness is probabilistic; callers open the target with create-new semantics
/// and call again on collision.
pub fn generate_filename(field_name: &str, original_name: &str) -> String {
    let timestamp = Utc::now().timestamp_millis();
    let suffix = rng().random_range(0..SUFFIX_RANGE);
    format!("{field_name}-{timestamp}-{suffix}{}", extension_of(original_name))
}

/// The original extension with its leading dot, or an empty string.
fn extension_of(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_filename_layout() {
        let name = generate_filename("member_images", "portrait.PNG");
        assert!(name.starts_with("member_images-"));
        assert!(name.ends_with(".PNG"));

        let middle = name.trim_start_matches("member_images-").trim_end_matches(".PNG");
        let (timestamp, suffix) = middle.split_once('-').unwrap();
        assert!(timestamp.parse::<i64>().unwrap() > 0);
        assert!(suffix.parse::<u32>().unwrap() < SUFFIX_RANGE);
    }

    #[test]
    fn test_only_last_extension_is_kept() {
        assert!(generate_filename("member_images", "archive.tar.gif").ends_with(".gif"));
        assert!(!generate_filename("member_images", "../../etc/passwd.jpg").contains('/'));
    }

    #[test]
    fn test_missing_extension() {
        assert_eq!(extension_of("noext"), "");
        assert_eq!(extension_of(".hidden"), "");
    }

    #[test]
    fn test_same_original_name_yields_distinct_names() {
        let names: HashSet<String> = (0..100).map(|_| generate_filename("member_images", "same.jpg")).collect();
        assert_eq!(names.len(), 100);
    }
}
