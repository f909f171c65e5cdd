//! Element classification

use crate::markup::StartTag;

/// What a start tag means to the preview rewriter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Image,
    ImageInput,
    NoscriptBoundary,
    HeadBoundary,
    BodyBoundary,
    Other,
}

impl ElementKind {
    pub fn is_image(self) -> bool {
        matches!(self, ElementKind::Image | ElementKind::ImageInput)
    }
}

pub fn classify(tag: &StartTag) -> ElementKind {
    match tag.name.to_ascii_lowercase().as_str() {
        "img" => ElementKind::Image,
        "input"
            if tag
                .get_attribute("type")
                .is_some_and(|t| t.trim().eq_ignore_ascii_case("image")) =>
        {
            ElementKind::ImageInput
        }
        "noscript" => ElementKind::NoscriptBoundary,
        "head" => ElementKind::HeadBoundary,
        "body" => ElementKind::BodyBoundary,
        _ => ElementKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify(&StartTag::new("IMG")), ElementKind::Image);
        assert_eq!(
            classify(&StartTag::new("input").with_attribute("type", "Image")),
            ElementKind::ImageInput
        );
        assert_eq!(
            classify(&StartTag::new("input").with_attribute("type", "text")),
            ElementKind::Other
        );
        assert_eq!(classify(&StartTag::new("input")), ElementKind::Other);
        assert_eq!(classify(&StartTag::new("noscript")), ElementKind::NoscriptBoundary);
        assert_eq!(classify(&StartTag::new("head")), ElementKind::HeadBoundary);
        assert_eq!(classify(&StartTag::new("body")), ElementKind::BodyBoundary);
        assert_eq!(classify(&StartTag::new("div")), ElementKind::Other);
    }
}
