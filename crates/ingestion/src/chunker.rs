//! Page-aligned chunking
//!
//! One chunk per page is the unit of the whole pipeline: it keeps every
//! embedding traceable to a page number for citations. Image uploads are
//! already one image per page; plain text carries an explicit page-break
//! sentinel inserted at render time.

use lendscope_common::PAGE_BREAK;

/// Raw input for a document, as uploaded
#[derive(Debug, Clone)]
pub enum PageSource {
    /// Rendered page images (PNG), one per page, in page order
    Images(Vec<Vec<u8>>),

    /// Plain text with `PAGE_BREAK` sentinels between pages
    Text(String),
}

/// Content of a single page
#[derive(Debug, Clone)]
pub enum PageContent {
    Image(Vec<u8>),
    Text(String),
}

/// One page ready for extraction
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-based page number
    pub number: i32,
    pub content: PageContent,
}

/// Split a document source into pages.
///
/// Pages are numbered 1-based in source order. Whitespace-only text pages
/// are dropped before numbering; empty images are kept (the extractor
/// decides what to do with them).
pub fn split_pages(source: PageSource) -> Vec<Page> {
    match source {
        PageSource::Images(images) => images
            .into_iter()
            .enumerate()
            .map(|(i, image)| Page {
                number: (i + 1) as i32,
                content: PageContent::Image(image),
            })
            .collect(),
        PageSource::Text(text) => text
            .split(PAGE_BREAK)
            .filter(|page| !page.trim().is_empty())
            .enumerate()
            .map(|(i, page)| Page {
                number: (i + 1) as i32,
                content: PageContent::Text(page.trim().to_string()),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(page: &Page) -> &str {
        match &page.content {
            PageContent::Text(text) => text,
            PageContent::Image(_) => panic!("expected text page"),
        }
    }

    #[test]
    fn test_splits_text_on_sentinel() {
        let text = format!("page one{}page two{}page three", PAGE_BREAK, PAGE_BREAK);
        let pages = split_pages(PageSource::Text(text));

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].number, 1);
        assert_eq!(text_of(&pages[0]), "page one");
        assert_eq!(pages[2].number, 3);
        assert_eq!(text_of(&pages[2]), "page three");
    }

    #[test]
    fn test_single_page_without_sentinel() {
        let pages = split_pages(PageSource::Text("just one page".into()));
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].number, 1);
    }

    #[test]
    fn test_drops_blank_text_pages() {
        let text = format!("real content{}   \n  {}more content", PAGE_BREAK, PAGE_BREAK);
        let pages = split_pages(PageSource::Text(text));

        assert_eq!(pages.len(), 2);
        assert_eq!(text_of(&pages[0]), "real content");
        assert_eq!(pages[1].number, 2);
        assert_eq!(text_of(&pages[1]), "more content");
    }

    #[test]
    fn test_sentinel_never_survives_splitting() {
        let text = format!("a{}b", PAGE_BREAK);
        let pages = split_pages(PageSource::Text(text));
        for page in &pages {
            assert!(!text_of(page).contains("PAGE_BREAK"));
        }
    }

    #[test]
    fn test_images_number_in_order() {
        let pages = split_pages(PageSource::Images(vec![vec![1], vec![2], vec![3]]));
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[1].number, 2);
        assert!(matches!(&pages[1].content, PageContent::Image(b) if b == &vec![2]));
    }
}
