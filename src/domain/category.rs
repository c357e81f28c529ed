use serde::{Deserialize, Serialize};

use super::normalize::normalize_category_name;

/// A top-level catalog grouping with its own listing pages and schema
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    /// Normalized display name, e.g. `cpu_coolers`
    pub name: String,
    /// Link target as found on the entry page, e.g. `/products/cpu-cooler/`
    pub source_path: String,
}

impl Category {
    pub fn new(display_text: &str, source_path: impl Into<String>) -> Self {
        Self {
            name: normalize_category_name(display_text),
            source_path: source_path.into(),
        }
    }

    /// Build a category straight from a catalog slug, bypassing discovery
    pub fn from_slug(slug: &str, catalog_prefix: &str) -> Self {
        let slug = slug.trim_matches('/');
        Self {
            name: normalize_category_name(&slug.replace('-', " ")),
            source_path: format!("{}/{}/", catalog_prefix.trim_end_matches('/'), slug),
        }
    }

    /// Last non-empty path segment of the source path
    pub fn slug(&self) -> &str {
        self.source_path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .next_back()
            .unwrap_or(self.name.as_str())
    }

    /// Name usable as a single file name component
    ///
    /// Characters outside `[A-Za-z0-9_-]` become `_`, runs of `_` collapse.
    pub fn file_stem(&self) -> String {
        let stem = sanitize_stem(&self.name);
        if !stem.is_empty() {
            return stem;
        }
        let slug = sanitize_stem(self.slug());
        if slug.is_empty() { "category".to_string() } else { slug }
    }

    /// True when `identifier` names this category by normalized name or slug
    pub fn matches(&self, identifier: &str) -> bool {
        let identifier = identifier.trim();
        self.slug().eq_ignore_ascii_case(identifier)
            || self.name == normalize_category_name(identifier)
    }
}

fn sanitize_stem(raw: &str) -> String {
    let mut stem = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c.is_alphanumeric() || c == '-' { c } else { '_' };
        if c == '_' && (stem.is_empty() || stem.ends_with('_')) {
            continue;
        }
        stem.push(c);
    }
    stem.trim_end_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_last_path_segment() {
        let category = Category::new("CPU Coolers", "/products/cpu-cooler/");
        assert_eq!(category.name, "cpu_coolers");
        assert_eq!(category.slug(), "cpu-cooler");

        let with_query = Category::new("Memory", "/products/memory/?sort=price");
        assert_eq!(with_query.slug(), "memory");
    }

    #[test]
    fn matches_by_name_or_slug() {
        let category = Category::new("CPU Coolers", "/products/cpu-cooler/");
        assert!(category.matches("cpu-cooler"));
        assert!(category.matches("cpu_coolers"));
        assert!(category.matches("CPU Coolers"));
        assert!(!category.matches("cpu"));
    }

    #[test]
    fn from_slug_builds_catalog_path() {
        let category = Category::from_slug("video-card", "/products/");
        assert_eq!(category.source_path, "/products/video-card/");
        assert_eq!(category.slug(), "video-card");
        assert_eq!(category.name, "video_card");
    }

    #[test]
    fn file_stem_is_a_single_path_component() {
        let headsets = Category::new("Headphones / Headsets", "/products/headphones/");
        assert_eq!(headsets.name, "headphones_/_headsets");
        assert_eq!(headsets.file_stem(), "headphones_headsets");

        let coolers = Category::new("CPU Coolers", "/products/cpu-cooler/");
        assert_eq!(coolers.file_stem(), "cpu_coolers");

        let dots = Category::new("..", "/products/wired-network/");
        assert_eq!(dots.file_stem(), "wired-network");

        let bare = Category::new("/", "/");
        assert_eq!(bare.file_stem(), "category");
    }
}
