//! Slug derivation for files and projects.
//!
//! A slug is the URL-safe identity of an entity: the slugified display name
//! plus the first eight hex characters of its UUID. Slugs are set once at
//! creation and never change afterwards.

/// Lowercase a display name into a URL-safe slug: alphanumeric runs joined
/// by single hyphens, everything else dropped.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    if slug.is_empty() {
        slug.push_str("untitled");
    }
    slug
}

/// Slug for a concrete entity. The id suffix keeps slugs of identically-named
/// entities distinct.
pub fn slug_for(name: &str, id: &str) -> String {
    let suffix: String = id
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .take(8)
        .collect::<String>()
        .to_lowercase();
    format!("{}-{}", slugify(name), suffix)
}

/// Fresh 8-hex-character entropy token, appended to slugs of bulk-created
/// projects so identical base names cannot collide within one batch.
pub fn random_suffix() -> String {
    let bytes: [u8; 4] = rand::random();
    hex::encode(bytes)
}
