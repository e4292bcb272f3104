use scraper::{Html, Selector};

/// Text of every `<p>` element, verbatim, first occurrence wins.
/// Whitespace-only paragraphs are left out.
pub fn extract_paragraphs(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let Some(paragraph_sel) = Selector::parse("p").ok() else {
        return Vec::new();
    };

    let mut paragraphs: Vec<String> = Vec::new();
    for element in doc.select(&paragraph_sel) {
        let text: String = element.text().collect();
        if text.trim().is_empty() || paragraphs.contains(&text) {
            continue;
        }
        paragraphs.push(text);
    }
    paragraphs
}
