//! Field extraction through ordered strategy chains.
//!
//! A [`FallbackChain`] holds the strategies for one field in priority order.
//! Each strategy is a pure function of the parsed page; the first one that
//! produces a non-empty value wins and later ones are never evaluated. When
//! every strategy comes up empty the field is `None` and the miss is logged
//! with the URL and field name.

use std::fmt;

use mc_core::Error;
use scraper::{ElementRef, Html, Selector};

use crate::logging::{ErrorKind, RunLogger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Body,
    PublishedTime,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Title => "title",
            Field::Body => "body_content",
            Field::PublishedTime => "published_time",
        })
    }
}

pub type CustomStrategy = fn(&Html) -> Option<String>;

#[derive(Clone)]
pub enum Strategy {
    /// Whitespace-collapsed text of the first element matching the selector
    Text(&'static str),
    /// Attribute value of the first matching element that carries it
    Attr(&'static str, &'static str),
    /// Text of the immediate children of the first matching container,
    /// see [`assemble_children`]
    Children(&'static str),
    Custom(CustomStrategy),
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Text(s) => write!(f, "Text({})", s),
            Strategy::Attr(s, a) => write!(f, "Attr({}, {})", s, a),
            Strategy::Children(s) => write!(f, "Children({})", s),
            Strategy::Custom(_) => f.write_str("Custom"),
        }
    }
}

fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(selector) => Some(selector),
        Err(e) => {
            tracing::warn!(selector, "Invalid extraction selector: {:?}", e);
            None
        }
    }
}

fn collapse_whitespace(text: &str) -> Option<String> {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

impl Strategy {
    pub fn apply(&self, document: &Html) -> Option<String> {
        match self {
            Strategy::Text(selector) => {
                let selector = parse_selector(selector)?;
                let element = document.select(&selector).next()?;
                collapse_whitespace(&element.text().collect::<String>())
            }
            Strategy::Attr(selector, attr) => {
                let selector = parse_selector(selector)?;
                document
                    .select(&selector)
                    .filter_map(|el| el.value().attr(attr))
                    .find_map(collapse_whitespace)
            }
            Strategy::Children(selector) => {
                let selector = parse_selector(selector)?;
                let container = document.select(&selector).next()?;
                assemble_children(container)
            }
            Strategy::Custom(f) => f(document),
        }
    }
}

/// Body assembly: the trimmed text of each immediate child node of
/// `container`, whitespace-only fragments dropped, joined by single spaces.
pub fn assemble_children(container: ElementRef) -> Option<String> {
    let fragments: Vec<String> = container
        .children()
        .filter_map(|child| {
            if let Some(element) = ElementRef::wrap(child) {
                Some(element.text().collect::<String>())
            } else {
                child.value().as_text().map(|text| text.trim().to_string())
            }
        })
        .map(|fragment| fragment.trim().to_string())
        .filter(|fragment| !fragment.is_empty())
        .collect();

    (!fragments.is_empty()).then(|| fragments.join(" "))
}

#[derive(Debug, Clone)]
pub struct FallbackChain {
    field: Field,
    strategies: Vec<Strategy>,
}

impl FallbackChain {
    pub fn new(field: Field) -> Self {
        Self {
            field,
            strategies: Vec::new(),
        }
    }

    pub fn then(mut self, strategy: Strategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn field(&self) -> Field {
        self.field
    }

    /// First value produced by the chain, without logging.
    pub fn first_match(&self, document: &Html) -> Option<String> {
        self.strategies.iter().find_map(|strategy| strategy.apply(document))
    }

    pub fn extract(&self, document: &Html, url: &str, logger: &RunLogger) -> Option<String> {
        let value = self.first_match(document);
        if value.is_none() {
            let error = Error::FieldParse {
                url: url.to_string(),
                field: self.field.to_string(),
            };
            logger.failure(
                ErrorKind::FieldParse,
                url,
                &format!("{} (tried {:?})", error, self.strategies),
            );
        }
        value
    }
}
