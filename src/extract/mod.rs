//! Declarative field extraction over a parsed results page.
//!
//! Each field is described by a [`SelectorChain`]: an ordered list of
//! [`Rule`]s evaluated top to bottom against one record candidate. The first
//! rule that produces a value surviving normalization wins; an exhausted
//! chain yields [`UNKNOWN`]. Nothing here touches a live browser, so a whole
//! page can be extracted from a serialized DOM fixture.

pub mod candidates;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::error::HarvestError;
use crate::models::{ProductRecord, UNKNOWN};
use crate::normalize::{
    CountKeywords, PriceParts, looks_like_delivery, normalize_count_with, normalize_price,
    normalize_rating, normalize_text,
};

pub use candidates::{Candidate, container_nodes, resolve_candidates};

/// A parsed CSS selector that remembers its source text.
#[derive(Debug, Clone)]
pub struct Locator {
    css: String,
    selector: Selector,
}

impl Locator {
    /// # Errors
    ///
    /// Returns [`HarvestError::InvalidSelector`] when `css` does not parse.
    pub fn parse(css: &str) -> Result<Self, HarvestError> {
        let selector = Selector::parse(css).map_err(|e| HarvestError::InvalidSelector {
            selector: css.to_string(),
            reason: format!("{e:?}"),
        })?;
        Ok(Self {
            css: css.to_string(),
            selector,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.css
    }

    #[must_use]
    pub fn selector(&self) -> &Selector {
        &self.selector
    }
}

/// Parses a list of CSS selectors, failing on the first bad one.
///
/// # Errors
///
/// Returns [`HarvestError::InvalidSelector`] for the first selector that does not parse.
pub fn locators(css: &[&str]) -> Result<Vec<Locator>, HarvestError> {
    css.iter().map(|s| Locator::parse(s)).collect()
}

/// Where a rule reads its raw value from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Read {
    Text,
    Attr(String),
    /// The attribute when present and non-empty, element text otherwise.
    /// Renderers often truncate visible text but keep the full string here.
    AttrOrText(String),
}

/// How a raw value is turned into a field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalize {
    Text,
    Rating,
    Count {
        keywords: CountKeywords,
        allow_bare: bool,
    },
    Delivery,
    /// Resolve against the site base URL and drop query and fragment.
    /// A non-empty `must_contain` requires one of the markers in the raw href.
    Link { must_contain: Vec<String> },
}

/// One step of a [`SelectorChain`].
#[derive(Debug, Clone)]
pub struct Rule {
    /// `None` reads the candidate node itself.
    pub locator: Option<Locator>,
    pub read: Read,
    pub normalize: Normalize,
    /// Try every match of `locator` in document order instead of only the first.
    pub scan: bool,
    /// Raw values longer than this are ignored.
    pub max_len: Option<usize>,
}

impl Rule {
    /// Reads the text of the first descendant matching `css`.
    ///
    /// # Errors
    ///
    /// Returns [`HarvestError::InvalidSelector`] when `css` does not parse.
    pub fn at(css: &str, normalize: Normalize) -> Result<Self, HarvestError> {
        Ok(Self {
            locator: Some(Locator::parse(css)?),
            read: Read::Text,
            normalize,
            scan: false,
            max_len: None,
        })
    }

    /// Reads the candidate node's own full text.
    #[must_use]
    pub fn whole_node(normalize: Normalize) -> Self {
        Self {
            locator: None,
            read: Read::Text,
            normalize,
            scan: false,
            max_len: None,
        }
    }

    #[must_use]
    pub fn reading(mut self, read: Read) -> Self {
        self.read = read;
        self
    }

    #[must_use]
    pub fn scanning(mut self) -> Self {
        self.scan = true;
        self
    }

    #[must_use]
    pub fn max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    fn read_raw(&self, element: ElementRef<'_>) -> Option<String> {
        let raw = match &self.read {
            Read::Text => element_text(element),
            Read::Attr(name) => element.value().attr(name)?.to_string(),
            Read::AttrOrText(name) => match element.value().attr(name) {
                Some(value) if !value.trim().is_empty() => value.to_string(),
                _ => element_text(element),
            },
        };
        let raw = raw.trim();
        if raw.is_empty() || self.max_len.is_some_and(|max| raw.chars().count() > max) {
            return None;
        }
        Some(raw.to_string())
    }

    fn evaluate(&self, node: ElementRef<'_>, base_url: &Url) -> Option<String> {
        let apply = |element: ElementRef<'_>| {
            let raw = self.read_raw(element)?;
            let value = apply_normalize(&self.normalize, &raw, base_url);
            (value != UNKNOWN).then_some(value)
        };

        match &self.locator {
            None => apply(node),
            Some(locator) if self.scan => node.select(locator.selector()).find_map(apply),
            Some(locator) => node.select(locator.selector()).next().and_then(apply),
        }
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

fn apply_normalize(normalize: &Normalize, raw: &str, base_url: &Url) -> String {
    match normalize {
        Normalize::Text => normalize_text(raw),
        Normalize::Rating => normalize_rating(raw),
        Normalize::Count {
            keywords,
            allow_bare,
        } => normalize_count_with(raw, *keywords, *allow_bare),
        Normalize::Delivery => {
            if looks_like_delivery(raw) {
                normalize_text(raw)
            } else {
                UNKNOWN.to_string()
            }
        }
        Normalize::Link { must_contain } => {
            if !must_contain.is_empty() && !must_contain.iter().any(|m| raw.contains(m.as_str())) {
                return UNKNOWN.to_string();
            }
            absolute_product_url(base_url, raw).unwrap_or_else(|| UNKNOWN.to_string())
        }
    }
}

/// Resolves `href` against `base` and strips query string and fragment.
#[must_use]
pub fn absolute_product_url(base: &Url, href: &str) -> Option<String> {
    let mut url = base.join(href.trim()).ok()?;
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

/// Ordered fallback list of rules for one field.
#[derive(Debug, Clone, Default)]
pub struct SelectorChain {
    rules: Vec<Rule>,
}

impl SelectorChain {
    #[must_use]
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// First non-unknown value in priority order, or [`UNKNOWN`].
    #[must_use]
    pub fn evaluate(&self, node: ElementRef<'_>, base_url: &Url) -> String {
        self.rules
            .iter()
            .find_map(|rule| rule.evaluate(node, base_url))
            .unwrap_or_else(|| UNKNOWN.to_string())
    }
}

/// Price extraction: a full pre-rendered string first, then the price
/// rebuilt from its parts, then any looser price text.
#[derive(Debug, Clone)]
pub struct PriceRules {
    pub full: SelectorChain,
    pub whole: Option<Locator>,
    pub symbol: Option<Locator>,
    pub fraction: Option<Locator>,
    pub default_symbol: String,
    pub default_fraction: String,
    pub fallback: SelectorChain,
}

impl PriceRules {
    #[must_use]
    pub fn evaluate(&self, node: ElementRef<'_>, base_url: &Url) -> String {
        let full = self.full.evaluate(node, base_url);
        if full != UNKNOWN {
            return full;
        }

        let first_text = |locator: &Option<Locator>| {
            locator
                .as_ref()
                .and_then(|l| node.select(l.selector()).next())
                .map(element_text)
        };

        if let Some(whole) = first_text(&self.whole) {
            let symbol = first_text(&self.symbol);
            let fraction = first_text(&self.fraction);
            let parts = PriceParts {
                symbol: symbol.as_deref(),
                whole: Some(whole.as_str()),
                fraction: fraction.as_deref(),
            };
            let price = normalize_price(None, &parts, &self.default_symbol, &self.default_fraction);
            if price != UNKNOWN {
                return price;
            }
        }

        self.fallback.evaluate(node, base_url)
    }
}

/// One independent indication that a listing is an advertisement.
#[derive(Debug, Clone)]
pub enum SponsorSignal {
    /// A badge element somewhere inside the node.
    Badge(Locator),
    /// A class on the node itself.
    ClassMarker(String),
    /// An attribute on the node itself with an exact value.
    AttrEquals { name: String, value: String },
    /// Any ancestor matching the locator.
    Ancestor(Locator),
    /// Case-insensitive substring of the node's full text.
    TextContains(String),
}

impl SponsorSignal {
    fn fires(&self, node: ElementRef<'_>, lowered_text: &str) -> bool {
        match self {
            Self::Badge(locator) => node.select(locator.selector()).next().is_some(),
            Self::ClassMarker(class) => node.value().classes().any(|c| c == class),
            Self::AttrEquals { name, value } => node.value().attr(name) == Some(value.as_str()),
            Self::Ancestor(locator) => node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|ancestor| locator.selector().matches(&ancestor)),
            Self::TextContains(needle) => lowered_text.contains(&needle.to_lowercase()),
        }
    }
}

/// True when any signal fires.
#[must_use]
pub fn is_sponsored(signals: &[SponsorSignal], node: ElementRef<'_>) -> bool {
    let lowered = element_text(node).to_lowercase();
    signals.iter().any(|signal| signal.fires(node, &lowered))
}

/// Selector chains for every record field.
#[derive(Debug, Clone)]
pub struct FieldChains {
    pub name: SelectorChain,
    pub url: SelectorChain,
    pub price: PriceRules,
    pub rating: SelectorChain,
    pub rating_count: SelectorChain,
    pub units_sold: SelectorChain,
    pub delivery: SelectorChain,
    pub sponsored: Vec<SponsorSignal>,
}

/// Everything needed to turn one results page into records.
#[derive(Debug, Clone)]
pub struct ExtractionProfile {
    pub base_url: Url,
    /// Container queries in priority order; the first with any match is used.
    pub containers: Vec<Locator>,
    /// Attribute carrying the site-unique product id.
    pub identifier_attr: String,
    /// Template with an `{id}` placeholder used when no product link is found.
    pub url_from_identifier: Option<String>,
    pub fields: FieldChains,
}

/// Counters describing one page's extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub nodes: usize,
    pub skipped_no_identifier: usize,
    pub skipped_duplicate: usize,
    pub skipped_no_url: usize,
    pub added: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PageExtraction {
    pub records: Vec<ProductRecord>,
    pub stats: ExtractionStats,
}

/// Builds one record from a resolved candidate.
///
/// Returns `None` only when no URL can be found or synthesised.
#[must_use]
pub fn extract_record(candidate: &Candidate<'_>, profile: &ExtractionProfile) -> Option<ProductRecord> {
    let node = candidate.node;
    let fields = &profile.fields;
    let base = &profile.base_url;

    let mut url = fields.url.evaluate(node, base);
    if url == UNKNOWN {
        url = profile
            .url_from_identifier
            .as_deref()
            .map(|template| template.replace("{id}", &candidate.identifier))
            .and_then(|synthetic| absolute_product_url(base, &synthetic))?;
    }

    Some(ProductRecord {
        identifier: candidate.identifier.clone(),
        name: fields.name.evaluate(node, base),
        price: fields.price.evaluate(node, base),
        url,
        rating: fields.rating.evaluate(node, base),
        rating_count: fields.rating_count.evaluate(node, base),
        units_sold: fields.units_sold.evaluate(node, base),
        sponsored: is_sponsored(&fields.sponsored, node),
        delivery_estimate: fields.delivery.evaluate(node, base),
    })
}

/// Extracts every record on a page, in document order.
#[must_use]
pub fn extract_page(document: &Html, profile: &ExtractionProfile) -> PageExtraction {
    let nodes = container_nodes(document, &profile.containers);
    let mut stats = ExtractionStats {
        nodes: nodes.len(),
        ..ExtractionStats::default()
    };

    let candidates = resolve_candidates(nodes, &profile.identifier_attr, &mut stats);

    let mut records = Vec::with_capacity(candidates.len());
    for candidate in &candidates {
        match extract_record(candidate, profile) {
            Some(record) => records.push(record),
            None => {
                debug!("Dropping candidate {} without a product URL", candidate.identifier);
                stats.skipped_no_url += 1;
            }
        }
    }
    stats.added = records.len();

    PageExtraction { records, stats }
}
