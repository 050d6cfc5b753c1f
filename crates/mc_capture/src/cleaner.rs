use scraper::{Html, Node, Selector};

/// Noise removed from every page regardless of source.
pub const STANDARD_NOISE: &[&str] = &["header", "figcaption", "script", "code", "iframe"];

/// The parser eats one newline right after these opening tags and the
/// serializer does not write it back.
const NEWLINE_ELEMENTS: &str = "pre, textarea, listing";

/// Strips noise nodes from a page before extraction.
///
/// Cleaning is idempotent: the output of `clean` re-parses into a tree in
/// which none of the rules match, so a second pass changes nothing. Rules
/// that match nothing are not errors.
#[derive(Debug, Clone)]
pub struct ContentCleaner {
    rules: Vec<Selector>,
}

impl ContentCleaner {
    pub fn new(rules: &[&str]) -> Self {
        let rules = rules
            .iter()
            .filter_map(|rule| match Selector::parse(rule) {
                Ok(selector) => Some(selector),
                Err(e) => {
                    tracing::warn!(rule, "Ignoring invalid noise selector: {:?}", e);
                    None
                }
            })
            .collect();
        Self { rules }
    }

    pub fn standard() -> Self {
        Self::new(STANDARD_NOISE)
    }

    /// Standard noise plus site-specific rules.
    pub fn with_rules(extra: &[&str]) -> Self {
        let mut cleaner = Self::standard();
        cleaner.rules.extend(Self::new(extra).rules);
        cleaner
    }

    /// Detach every matching node in place, returning how many were removed.
    pub fn clean_document(&self, document: &mut Html) -> usize {
        let mut removed = 0;
        for rule in &self.rules {
            let ids: Vec<_> = document.select(rule).map(|el| el.id()).collect();
            for id in ids {
                if let Some(mut node) = document.tree.get_mut(id) {
                    node.detach();
                    removed += 1;
                }
            }
        }
        removed
    }

    pub fn clean(&self, html: &str) -> String {
        let mut document = Html::parse_document(html);
        let removed = self.clean_document(&mut document);
        tracing::debug!(removed, "Removed noise nodes");
        Self::keep_leading_newlines(&mut document);
        document.html()
    }

    /// Double a leading newline inside `pre`-like elements so re-parsing
    /// the serialized page yields the same text.
    fn keep_leading_newlines(document: &mut Html) {
        let Ok(selector) = Selector::parse(NEWLINE_ELEMENTS) else {
            return;
        };
        let ids: Vec<_> = document
            .select(&selector)
            .filter_map(|el| el.first_child())
            .filter(|child| child.value().as_text().map_or(false, |t| t.starts_with('\n')))
            .map(|child| child.id())
            .collect();
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                if let Node::Text(text) = node.value() {
                    text.text = format!("\n{}", &*text.text).into();
                }
            }
        }
    }
}

impl Default for ContentCleaner {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><head><script>var tracking = 1;</script></head>
<body>
  <header><nav>Menu</nav></header>
  <h1 class="titulo">Governo anuncia plano</h1>
  <div itemprop="articleBody">
    <p>Primeiro parágrafo.</p>
    <div class="wp-caption"><img src="x.jpg"><p>Legenda</p></div>
    <figure><img src="y.jpg"><figcaption>Foto: Agência</figcaption></figure>
    <p>Segundo parágrafo.</p>
    <div class="relacionadastexto"><a href="/outra">Leia também</a></div>
    <iframe src="http://video"></iframe>
    <code>embed()</code>
  </div>
</body></html>"#;

    fn estadao_cleaner() -> ContentCleaner {
        ContentCleaner::with_rules(&["div.wp-caption", "div.tags", "div.relacionadastexto"])
    }

    #[test]
    fn test_removes_noise_nodes() {
        let cleaned = estadao_cleaner().clean(PAGE);
        for noise in ["Menu", "tracking", "Legenda", "Foto: Agência", "Leia também", "iframe", "embed()"] {
            assert!(!cleaned.contains(noise), "{} survived cleaning", noise);
        }
        assert!(cleaned.contains("Primeiro parágrafo."));
        assert!(cleaned.contains("Segundo parágrafo."));
        assert!(cleaned.contains("Governo anuncia plano"));
    }

    #[test]
    fn test_clean_is_idempotent() {
        let cleaner = estadao_cleaner();
        let once = cleaner.clean(PAGE);
        let twice = cleaner.clean(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_clean_is_idempotent_for_leading_newlines() {
        let cleaner = ContentCleaner::standard();
        for page in [
            "<html><body><pre>\n\nbody<code>x</code></pre></body></html>",
            "<html><body><textarea>\n\nt</textarea></body></html>",
            "<html><body><listing>\n\n\nl</listing></body></html>",
            "<html><body><pre>\nsingle</pre></body></html>",
        ] {
            let once = cleaner.clean(page);
            let twice = cleaner.clean(&once);
            assert_eq!(once, twice, "{:?}", page);
        }
        let once = cleaner.clean("<html><body><pre>\n\nbody</pre></body></html>");
        assert!(once.contains("<pre>\n\nbody</pre>"));
    }

    #[test]
    fn test_clean_without_noise_keeps_content() {
        let page = "<html><head></head><body><article><p>Só texto.</p></article></body></html>";
        let cleaned = ContentCleaner::standard().clean(page);
        assert!(cleaned.contains("<article><p>Só texto.</p></article>"));
        assert_eq!(ContentCleaner::standard().clean(&cleaned), cleaned);
    }

    #[test]
    fn test_nested_noise() {
        let page = "<html><body><header><script>x()</script><iframe></iframe></header><p>ok</p></body></html>";
        let mut document = Html::parse_document(page);
        let removed = ContentCleaner::standard().clean_document(&mut document);
        assert!(removed >= 1);
        let html = document.html();
        assert!(!html.contains("x()"));
        assert!(html.contains("<p>ok</p>"));
    }

    #[test]
    fn test_invalid_rule_is_ignored() {
        let cleaner = ContentCleaner::new(&["div[", "script"]);
        let cleaned = cleaner.clean("<html><body><script>x</script><p>y</p></body></html>");
        assert!(!cleaned.contains("<script>"));
        assert!(cleaned.contains("<p>y</p>"));
    }
}
