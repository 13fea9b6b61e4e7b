//! Pagination planning for postback-driven grids
//!
//! Navigation controls on the grid are anchors of the form
//! `javascript:__doPostBack('target','argument')`. The planner reads them off a
//! page and decides the traversal:
//!
//! 1. An "All" control, if present, is fired first. One request returns the
//!    widest page the grid can render.
//! 2. Whether or not that worked, numbered controls are then visited in
//!    numeric order, skipping page 1 (already in hand).

use crate::document::ParsedDocument;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::hash::{Hash, Hasher};

static POSTBACK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"__doPostBack\('([^']+)'\s*,\s*'([^']*)'\)").expect("hardcoded regex pattern is valid")
});

static TOTAL_RECORDS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Total Records:\s*(\d+)").expect("hardcoded regex pattern is valid")
});

/// A navigation control fired by a postback
///
/// Identity is `(target, argument)`. The label is display text only and takes
/// no part in equality.
#[derive(Debug, Clone, Eq)]
pub struct PaginationTarget {
    /// Control identifier sent as `__EVENTTARGET`
    pub target: String,

    /// Event argument sent as `__EVENTARGUMENT` (often empty)
    pub argument: String,

    /// Anchor text, e.g. `"2"` or `"All"`
    pub label: String,
}

impl PartialEq for PaginationTarget {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target && self.argument == other.argument
    }
}

impl Hash for PaginationTarget {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.target.hash(state);
        self.argument.hash(state);
    }
}

impl PaginationTarget {
    pub fn new(
        target: impl Into<String>,
        argument: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            argument: argument.into(),
            label: label.into(),
        }
    }

    /// True for the control labeled "all" (any case)
    pub fn is_aggregate(&self) -> bool {
        self.label.eq_ignore_ascii_case("all")
    }

    /// Page index if the label is a base-10 integer
    pub fn page_number(&self) -> Option<u64> {
        if self.label.is_empty() || !self.label.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        self.label.parse().ok()
    }
}

/// The traversal chosen for one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalPlan {
    /// The "All" control, if the page has one
    pub aggregate: Option<PaginationTarget>,

    /// Numbered pages to visit, ascending, page 1 excluded
    pub numbered: Vec<PaginationTarget>,
}

impl TraversalPlan {
    /// Targets in the order they are requested: aggregate first
    pub fn ordered(&self) -> Vec<&PaginationTarget> {
        self.aggregate.iter().chain(self.numbered.iter()).collect()
    }

    /// True when the page offers no further navigation
    pub fn is_terminal(&self) -> bool {
        self.aggregate.is_none() && self.numbered.is_empty()
    }
}

/// Extracts every postback control on the page, in document order
pub fn find_postback_targets<D: ParsedDocument + ?Sized>(doc: &D) -> Vec<PaginationTarget> {
    doc.find_links_matching(&POSTBACK_PATTERN)
        .into_iter()
        .filter_map(|link| {
            let captures = POSTBACK_PATTERN.captures(&link.href)?;
            Some(PaginationTarget::new(&captures[1], &captures[2], link.text))
        })
        .collect()
}

/// The first control labeled "all", if any
pub fn aggregate_target(targets: &[PaginationTarget]) -> Option<&PaginationTarget> {
    targets.iter().find(|target| target.is_aggregate())
}

/// Numbered controls, one per page number (first seen wins), ascending, page 1 skipped
pub fn numbered_targets(targets: &[PaginationTarget]) -> Vec<PaginationTarget> {
    let mut queue = PageQueue::new();
    queue.offer(targets);

    let mut numbered = Vec::with_capacity(queue.len());
    while let Some((_, target)) = queue.next_page() {
        numbered.push(target);
    }
    numbered
}

/// Plans the traversal from a single page
///
/// # Example
///
/// ```
/// use propgrid::crawler::plan;
/// use propgrid::document::HtmlDocument;
///
/// let doc = HtmlDocument::parse(r#"
///     <a href="javascript:__doPostBack('grid','Page$10')">10</a>
///     <a href="javascript:__doPostBack('grid','Page$2')">2</a>
///     <a href="javascript:__doPostBack('grid','Page$1')">1</a>
/// "#);
/// let plan = plan(&doc);
/// let labels: Vec<_> = plan.numbered.iter().map(|t| t.label.as_str()).collect();
/// assert_eq!(labels, vec!["2", "10"]);
/// ```
pub fn plan<D: ParsedDocument + ?Sized>(doc: &D) -> TraversalPlan {
    let targets = find_postback_targets(doc);
    TraversalPlan {
        aggregate: aggregate_target(&targets).cloned(),
        numbered: numbered_targets(&targets),
    }
}

/// The record count the grid reports about itself (`Total Records: N`)
pub fn reported_total_records<D: ParsedDocument + ?Sized>(doc: &D) -> Option<u64> {
    TOTAL_RECORDS_PATTERN
        .captures(&doc.text())
        .and_then(|captures| captures[1].parse().ok())
}

/// Numbered pages still to visit during a crawl
///
/// Pages are handed out smallest first. Once a page number has been queued or
/// visited it is never queued again, so pager controls repeated on later pages
/// (top and bottom pagers, links back to earlier pages) are ignored. Page 1 is
/// considered visited from the start.
#[derive(Debug, Clone)]
pub struct PageQueue {
    visited: HashSet<u64>,
    pending: BTreeMap<u64, PaginationTarget>,
}

impl Default for PageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PageQueue {
    pub fn new() -> Self {
        Self {
            visited: HashSet::from([1]),
            pending: BTreeMap::new(),
        }
    }

    /// Queues unseen numbered controls, returns how many were added
    pub fn offer(&mut self, targets: &[PaginationTarget]) -> usize {
        let mut added = 0;
        for target in targets {
            let Some(number) = target.page_number() else {
                continue;
            };
            if self.visited.contains(&number) || self.pending.contains_key(&number) {
                continue;
            }
            tracing::trace!("Queued page {} via {}", number, target.argument);
            self.pending.insert(number, target.clone());
            added += 1;
        }
        added
    }

    /// Next page to visit, marked visited on return
    pub fn next_page(&mut self) -> Option<(u64, PaginationTarget)> {
        let (number, target) = self.pending.pop_first()?;
        self.visited.insert(number);
        Some((number, target))
    }

    /// Number of pages waiting
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::HtmlDocument;

    fn pager(links: &[(&str, &str)]) -> HtmlDocument {
        let anchors: String = links
            .iter()
            .map(|(argument, label)| {
                format!(
                    r#"<a href="javascript:__doPostBack('ctl00$MainContent$gvPropertyList','{}')">{}</a>"#,
                    argument, label
                )
            })
            .collect();
        HtmlDocument::parse(&format!("<html><body><div>{}</div></body></html>", anchors))
    }

    fn labels(targets: &[PaginationTarget]) -> Vec<&str> {
        targets.iter().map(|t| t.label.as_str()).collect()
    }

    #[test]
    fn test_extracts_target_argument_and_label() {
        let doc = HtmlDocument::parse(
            r#"<a href="javascript:__doPostBack('ctl00$gv','Page$2')"> 2 </a>
               <a href="javascript:__doPostBack('ctl00$lnkExport' , '')">Export</a>
               <a href="/propertiesforsale/Home.aspx">Home</a>"#,
        );
        let targets = find_postback_targets(&doc);

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].target, "ctl00$gv");
        assert_eq!(targets[0].argument, "Page$2");
        assert_eq!(targets[0].label, "2");
        assert_eq!(targets[1].argument, "");
        assert_eq!(targets[1].label, "Export");
    }

    #[test]
    fn test_numeric_ordering_skips_page_one() {
        let doc = pager(&[("Page$10", "10"), ("Page$2", "2"), ("Page$1", "1")]);
        let plan = plan(&doc);

        assert_eq!(labels(&plan.numbered), vec!["2", "10"]);
    }

    #[test]
    fn test_duplicate_labels_keep_first_seen() {
        let doc = HtmlDocument::parse(
            r#"<a href="javascript:__doPostBack('topPager','Page$2')">2</a>
               <a href="javascript:__doPostBack('topPager','Page$3')">3</a>
               <a href="javascript:__doPostBack('bottomPager','Page$2')">2</a>"#,
        );
        let numbered = plan(&doc).numbered;

        assert_eq!(labels(&numbered), vec!["2", "3"]);
        assert_eq!(numbered[0].target, "topPager");
    }

    #[test]
    fn test_aggregate_detected_case_insensitively() {
        let doc = pager(&[("Page$2", "2"), ("Page$All", "ALL")]);
        let plan = plan(&doc);

        let aggregate = plan.aggregate.as_ref().unwrap();
        assert_eq!(aggregate.argument, "Page$All");
        assert_eq!(labels(&plan.numbered), vec!["2"]);
    }

    #[test]
    fn test_ordered_puts_aggregate_first() {
        let doc = pager(&[("Page$3", "3"), ("Page$2", "2"), ("Page$All", "All")]);
        let plan = plan(&doc);
        let ordered: Vec<&str> = plan.ordered().iter().map(|t| t.label.as_str()).collect();

        assert_eq!(ordered, vec!["All", "2", "3"]);
    }

    #[test]
    fn test_non_numeric_labels_ignored() {
        let doc = pager(&[("Page$Next", "..."), ("Page$Last", ">>"), ("Sort$Price", "Price")]);
        let plan = plan(&doc);

        assert!(plan.aggregate.is_none());
        assert!(plan.numbered.is_empty());
        assert!(plan.is_terminal());
    }

    #[test]
    fn test_no_controls_is_terminal() {
        let doc = HtmlDocument::parse("<html><body><table></table></body></html>");
        assert!(plan(&doc).is_terminal());
    }

    #[test]
    fn test_identity_ignores_label() {
        let a = PaginationTarget::new("grid", "Page$2", "2");
        let b = PaginationTarget::new("grid", "Page$2", "Two");
        let c = PaginationTarget::new("grid", "Page$3", "2");

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_page_number_parsing() {
        assert_eq!(PaginationTarget::new("g", "", "12").page_number(), Some(12));
        assert_eq!(PaginationTarget::new("g", "", "").page_number(), None);
        assert_eq!(PaginationTarget::new("g", "", "-1").page_number(), None);
        assert_eq!(PaginationTarget::new("g", "", "1.5").page_number(), None);
        assert_eq!(PaginationTarget::new("g", "", "All").page_number(), None);
    }

    #[test]
    fn test_page_queue_never_requeues() {
        let mut queue = PageQueue::new();
        let first = vec![
            PaginationTarget::new("g", "Page$3", "3"),
            PaginationTarget::new("g", "Page$2", "2"),
            PaginationTarget::new("g", "Page$1", "1"),
        ];
        assert_eq!(queue.offer(&first), 2);

        let (number, _) = queue.next_page().unwrap();
        assert_eq!(number, 2);

        // Page 2's pager links back to 1 and 3 and reveals 4
        let second = vec![
            PaginationTarget::new("g", "Page$1", "1"),
            PaginationTarget::new("g", "Page$3", "3"),
            PaginationTarget::new("g", "Page$4", "4"),
            PaginationTarget::new("g", "Page$2", "2"),
        ];
        assert_eq!(queue.offer(&second), 1);

        let rest: Vec<u64> = std::iter::from_fn(|| queue.next_page().map(|(n, _)| n)).collect();
        assert_eq!(rest, vec![3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_reported_total_records() {
        let doc = HtmlDocument::parse("<p>Total Records: <span>312</span></p>");
        assert_eq!(reported_total_records(&doc), Some(312));

        let doc = HtmlDocument::parse("<p>No results</p>");
        assert_eq!(reported_total_records(&doc), None);
    }
}
