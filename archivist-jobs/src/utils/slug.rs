//! Slug generation for new records

/// Lowercase ASCII slug; runs of other characters collapse to one `-`
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for ch in text.chars() {
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

    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Fonds: Smith Family Papers"), "fonds-smith-family-papers");
        assert_eq!(slugify("  --Series 2-- "), "series-2");
        assert_eq!(slugify("!!!"), "untitled");
    }
}
