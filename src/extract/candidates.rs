//! Decides which result nodes are real, unique product listings.

use std::collections::HashSet;

use scraper::{ElementRef, Html};

use super::{ExtractionStats, Locator};

/// A result node carrying a validated site-unique identifier.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub identifier: String,
    pub node: ElementRef<'a>,
}

/// Runs the container queries in priority order and returns the matches of
/// the first query that finds anything.
#[must_use]
pub fn container_nodes<'a>(document: &'a Html, containers: &[Locator]) -> Vec<ElementRef<'a>> {
    containers
        .iter()
        .map(|locator| document.select(locator.selector()).collect::<Vec<_>>())
        .find(|nodes| !nodes.is_empty())
        .unwrap_or_default()
}

/// Keeps nodes with a non-empty `identifier_attr`, first occurrence wins.
///
/// Nodes without an identifier are ad slots or placeholders and are dropped
/// silently. Document order is preserved.
pub fn resolve_candidates<'a>(
    nodes: impl IntoIterator<Item = ElementRef<'a>>,
    identifier_attr: &str,
    stats: &mut ExtractionStats,
) -> Vec<Candidate<'a>> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for node in nodes {
        let Some(identifier) = node
            .value()
            .attr(identifier_attr)
            .map(str::trim)
            .filter(|id| !id.is_empty())
        else {
            stats.skipped_no_identifier += 1;
            continue;
        };

        if !seen.insert(identifier.to_string()) {
            stats.skipped_duplicate += 1;
            continue;
        }

        candidates.push(Candidate {
            identifier: identifier.to_string(),
            node,
        });
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator(css: &str) -> Locator {
        Locator::parse(css).unwrap()
    }

    #[test]
    fn first_occurrence_of_duplicate_identifier_wins() {
        let html = Html::parse_document(
            r#"<div data-asin="ASIN123" id="first"></div>
               <div data-asin="ASIN999"></div>
               <div data-asin="ASIN123" id="second"></div>"#,
        );
        let nodes = container_nodes(&html, &[locator("[data-asin]")]);
        let mut stats = ExtractionStats::default();
        let candidates = resolve_candidates(nodes, "data-asin", &mut stats);

        let ids: Vec<&str> = candidates.iter().map(|c| c.identifier.as_str()).collect();
        assert_eq!(ids, vec!["ASIN123", "ASIN999"]);
        assert_eq!(candidates[0].node.value().attr("id"), Some("first"));
        assert_eq!(stats.skipped_duplicate, 1);
    }

    #[test]
    fn nodes_without_identifier_are_dropped_silently() {
        let html = Html::parse_document(
            r#"<div class="r" data-asin=""></div>
               <div class="r"></div>
               <div class="r" data-asin="  "></div>
               <div class="r" data-asin="B0KEEP"></div>"#,
        );
        let nodes = container_nodes(&html, &[locator("div.r")]);
        let mut stats = ExtractionStats::default();
        let candidates = resolve_candidates(nodes, "data-asin", &mut stats);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].identifier, "B0KEEP");
        assert_eq!(stats.skipped_no_identifier, 3);
    }

    #[test]
    fn container_queries_fall_through_until_one_matches() {
        let html = Html::parse_document(r#"<div data-id="X1"></div><div data-id="X2"></div>"#);
        let nodes = container_nodes(
            &html,
            &[locator(r#"[data-component-type="s-search-result"]"#), locator("div[data-id]")],
        );
        assert_eq!(nodes.len(), 2);

        let none = container_nodes(&html, &[locator("li.result")]);
        assert!(none.is_empty());
    }
}
