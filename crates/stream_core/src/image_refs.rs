//! Scanner for inline image references of the form `![image](<url>)`.
//!
//! Grammar: the literal opener `![image](`, followed by one or more
//! characters other than `)`, followed by `)`. An opener that is never
//! closed, or closed immediately, is not a reference; scanning resumes one
//! character after that opener.

use std::ops::Range;

const OPENER: &str = "![image](";
const CLOSER: char = ')';

/// A single image reference found in a text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef<'a> {
    /// Byte range of the whole reference, opener through closer
    pub span: Range<usize>,
    pub url: &'a str,
}

/// Iterator over the image references of a text, in order of appearance
pub struct ImageRefs<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Iterator for ImageRefs<'a> {
    type Item = ImageRef<'a>;

    fn next(&mut self) -> Option<ImageRef<'a>> {
        while let Some(offset) = self.text.get(self.pos..)?.find(OPENER) {
            let start = self.pos + offset;
            let url_start = start + OPENER.len();
            let close = self.text[url_start..].find(CLOSER)?;
            if close == 0 {
                // `![image]()` has no URL; the opener's first byte is ASCII
                self.pos = start + 1;
                continue;
            }
            let url_end = url_start + close;
            self.pos = url_end + CLOSER.len_utf8();
            return Some(ImageRef {
                span: start..self.pos,
                url: &self.text[url_start..url_end],
            });
        }
        self.pos = self.text.len();
        None
    }
}

/// Scan `text` for image references
pub fn image_refs(text: &str) -> ImageRefs<'_> {
    ImageRefs { text, pos: 0 }
}

/// URLs of all image references in `text`, in order, duplicates included
pub fn image_urls(text: &str) -> impl Iterator<Item = &str> {
    image_refs(text).map(|r| r.url)
}

/// Remove every image reference from `text` and trim the result
pub fn strip_image_refs(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut last = 0;
    for image in image_refs(text) {
        output.push_str(&text[last..image.span.start]);
        last = image.span.end;
    }
    output.push_str(&text[last..]);
    output.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_urls_in_order() {
        let text = "a ![image](http://x/1.png) b ![image](http://x/2.png)";
        let urls: Vec<&str> = image_urls(text).collect();
        assert_eq!(urls, vec!["http://x/1.png", "http://x/2.png"]);
    }

    #[test]
    fn test_span_covers_reference() {
        let text = "pre ![image](u) post";
        let found: Vec<_> = image_refs(text).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(&text[found[0].span.clone()], "![image](u)");
    }

    #[test]
    fn test_unclosed_reference_is_ignored() {
        assert_eq!(image_urls("![image](http://x/1.png").count(), 0);
        assert_eq!(strip_image_refs("see ![image](http://x"), "see ![image](http://x");
    }

    #[test]
    fn test_empty_url_is_not_a_reference() {
        let urls: Vec<&str> = image_urls("![image]() ![image](u)").collect();
        assert_eq!(urls, vec!["u"]);
    }

    #[test]
    fn test_url_may_contain_opener_text() {
        // The URL runs to the first closing paren, like `[^)]+`
        let urls: Vec<&str> = image_urls("![image](a![image](b)").collect();
        assert_eq!(urls, vec!["a![image](b"]);
    }

    #[test]
    fn test_other_alt_text_is_not_matched() {
        assert_eq!(image_urls("![photo](http://x/1.png)").count(), 0);
    }

    #[test]
    fn test_strip_removes_all_references_and_trims() {
        let text = "Here is ![image](http://x/1.png) ";
        assert_eq!(strip_image_refs(text), "Here is");
        assert_eq!(
            strip_image_refs("![image](a)one ![image](b)two"),
            "one two"
        );
    }

    #[test]
    fn test_non_ascii_text_around_references() {
        let text = "\u{56fe}\u{7247} ![image](http://x/\u{e9}.png) \u{5b8c}";
        let urls: Vec<&str> = image_urls(text).collect();
        assert_eq!(urls, vec!["http://x/\u{e9}.png"]);
        assert_eq!(strip_image_refs(text), "\u{56fe}\u{7247}  \u{5b8c}");
    }
}
