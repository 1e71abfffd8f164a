pub mod env;
pub mod telemetry;

/// Lowercases `input`, keeps ASCII alphanumerics and collapses every other run of characters
/// into a single `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// First of `base`, `base-2`, `base-3`, ... that is not in `taken`.
pub fn unique_slug(base: &str, taken: &[String]) -> String {
    let base = if base.is_empty() { "untitled" } else { base };
    if !taken.iter().any(|s| s == base) {
        return base.to_string();
    }

    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken.iter().any(|s| s == candidate))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Intro to Rust"), "intro-to-rust");
        assert_eq!(slugify("  C++ & Systems: Part 2!  "), "c-systems-part-2");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_unique_slug_appends_counter() {
        assert_eq!(unique_slug("rust", &[]), "rust");

        let taken = vec!["rust".to_string(), "rust-2".to_string()];
        assert_eq!(unique_slug("rust", &taken), "rust-3");
        assert_eq!(unique_slug("", &[]), "untitled");
    }
}
