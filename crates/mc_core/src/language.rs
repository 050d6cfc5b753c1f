use scraper::{Html, Selector};

use crate::types::Language;

pub trait LanguageDetector: Send + Sync {
    fn detect(&self, html: &str) -> Option<Language>;
}

const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("pt", "PORTUGUESE"),
    ("en", "ENGLISH"),
    ("es", "SPANISH"),
    ("fr", "FRENCH"),
    ("it", "ITALIAN"),
    ("de", "GERMAN"),
];

/// Reads the language the page declares about itself.
#[derive(Debug, Clone, Default)]
pub struct MarkupLanguageDetector {
    /// Used when the page declares nothing
    fallback: Option<&'static str>,
}

impl MarkupLanguageDetector {
    pub fn new() -> Self {
        Self { fallback: None }
    }

    pub fn with_fallback(mut self, code: &'static str) -> Self {
        self.fallback = Some(code);
        self
    }

    fn declared_code(document: &Html) -> Option<String> {
        let candidates = [
            ("html[lang]", "lang"),
            ("meta[http-equiv='content-language']", "content"),
            ("meta[property='og:locale']", "content"),
        ];
        candidates.iter().find_map(|(selector, attr)| {
            let selector = Selector::parse(selector).ok()?;
            document
                .select(&selector)
                .filter_map(|el| el.value().attr(attr))
                .map(|value| value.trim())
                .find(|value| !value.is_empty())
                .map(|value| value.to_string())
        })
    }
}

/// `pt-BR`, `pt_BR` and `PT` all become `pt`.
fn primary_subtag(tag: &str) -> String {
    tag.split(|c| c == '-' || c == '_')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

pub fn language_for_code(code: &str) -> Option<Language> {
    let code = primary_subtag(code);
    LANGUAGE_NAMES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(code, name)| Language {
            code: code.to_string(),
            name: name.to_string(),
        })
}

impl LanguageDetector for MarkupLanguageDetector {
    fn detect(&self, html: &str) -> Option<Language> {
        let document = Html::parse_document(html);
        Self::declared_code(&document)
            .and_then(|code| language_for_code(&code))
            .or_else(|| self.fallback.and_then(language_for_code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_html_lang() {
        let detector = MarkupLanguageDetector::new();
        let lang = detector
            .detect(r#"<html lang="pt-BR"><body>Olá</body></html>"#)
            .unwrap();
        assert_eq!(lang.code, "pt");
        assert_eq!(lang.name, "PORTUGUESE");
    }

    #[test]
    fn test_detects_og_locale() {
        let detector = MarkupLanguageDetector::new();
        let html = r#"<html><head><meta property="og:locale" content="en_US"></head></html>"#;
        assert_eq!(detector.detect(html).unwrap().code, "en");
    }

    #[test]
    fn test_undeclared_language() {
        let html = "<html><body>nada</body></html>";
        assert!(MarkupLanguageDetector::new().detect(html).is_none());
        let lang = MarkupLanguageDetector::new()
            .with_fallback("pt")
            .detect(html)
            .unwrap();
        assert_eq!(lang.code, "pt");
    }

    #[test]
    fn test_unknown_code() {
        assert!(language_for_code("xx-YY").is_none());
    }
}
