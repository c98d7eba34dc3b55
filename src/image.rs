//! Canonical image selection.
//!
//! An article's representative image is the embedded image that appears
//! earliest in the raw page content. The configured sentinel image (the
//! "finalised" badge) never represents an article, and images that do not
//! occur in the content at all are not considered. When nothing qualifies
//! the caller falls back to the configured default image URL without asking
//! the image API anything.

/// Pick the canonical image title for a page, or `None` when the caller
/// should fall back to the default image.
pub fn select_canonical<'a>(
    content: &str,
    image_titles: &'a [String],
    sentinel: &str,
) -> Option<&'a str> {
    let mut candidates: Vec<(usize, &str)> = image_titles
        .iter()
        .filter(|title| !title.contains(sentinel))
        .filter_map(|title| content.find(title.as_str()).map(|loc| (loc, title.as_str())))
        .collect();

    // Stable sort: listing order breaks location ties
    candidates.sort_by_key(|(location, _)| *location);
    candidates.first().map(|(_, title)| *title)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_earliest_content_position_wins() {
        // B occurs before A in the content even though A is listed first
        let content = "xxxxxB.jpgyA.jpg trailing";
        let images = titles(&["A.jpg", "B.jpg"]);

        assert_eq!(select_canonical(content, &images, "Finalised.jpg"), Some("B.jpg"));
    }

    #[test]
    fn test_absent_images_fall_back() {
        let content = "no embedded files mentioned here";
        let images = titles(&["A.jpg", "B.jpg"]);

        assert_eq!(select_canonical(content, &images, "Finalised.jpg"), None);
    }

    #[test]
    fn test_sentinel_never_selected() {
        let content = "File:Finalised.jpg then File:Photo.jpg";
        let images = titles(&["File:Finalised.jpg", "File:Photo.jpg"]);

        assert_eq!(
            select_canonical(content, &images, "Finalised.jpg"),
            Some("File:Photo.jpg")
        );
    }

    #[test]
    fn test_sentinel_only_falls_back() {
        let content = "badge at File:Finalised.jpg";
        let images = titles(&["File:Finalised.jpg"]);

        assert_eq!(select_canonical(content, &images, "Finalised.jpg"), None);
    }

    #[test]
    fn test_no_images_falls_back() {
        assert_eq!(select_canonical("anything", &[], "Finalised.jpg"), None);
    }

    #[test]
    fn test_listing_order_breaks_ties() {
        // Both titles match at the same offset; the first listed wins
        let content = "File:Same.jpg";
        let images = titles(&["File:Same.jpg", "File:Same"]);

        assert_eq!(
            select_canonical(content, &images, "Finalised.jpg"),
            Some("File:Same.jpg")
        );
    }
}
