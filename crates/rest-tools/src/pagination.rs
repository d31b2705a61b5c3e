//! Pagination windows.
//!
//! [`build_window`] is the only place pagination metadata is computed. There are two call
//! sites, one per upstream paging capability:
//!
//! - [`window_from_server`]: the upstream paged the result; its items are passed straight
//!   through with the client's offset and the server-reported total.
//! - [`window_from_local_slice`]: the upstream returned the whole collection (e.g. children
//!   embedded in a parent object); the page is sliced here first and the full length is the
//!   total.

use serde::Serialize;
use serde_json::Value;

use crate::config::PaginationConfig;
use crate::normalize::{CanonicalCollection, CanonicalRecord};

/// One page of a collection relative to its full size.
///
/// `has_more == (total > offset + count)`, and `next_offset` is `Some(offset + count)` exactly
/// when `has_more`. `total` is advisory: a stale upstream count is reported as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginationWindow {
    pub items: Vec<CanonicalRecord>,
    pub total: usize,
    pub count: usize,
    pub offset: usize,
    pub has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<usize>,
}

#[must_use]
pub fn build_window(items: Vec<CanonicalRecord>, total: usize, offset: usize) -> PaginationWindow {
    let count = items.len();
    let end = offset.saturating_add(count);
    let has_more = total > end;
    PaginationWindow {
        items,
        total,
        count,
        offset,
        has_more,
        next_offset: has_more.then_some(end),
    }
}

/// Window over a page the upstream already sized to `page.limit`.
#[must_use]
pub fn window_from_server(collection: CanonicalCollection, page: PageRequest) -> PaginationWindow {
    build_window(collection.items, collection.total, page.offset)
}

/// Slice `page` out of a complete collection, then window it.
#[must_use]
pub fn window_from_local_slice(all: Vec<CanonicalRecord>, page: PageRequest) -> PaginationWindow {
    let total = all.len();
    let items: Vec<CanonicalRecord> = all
        .into_iter()
        .skip(page.offset)
        .take(page.limit)
        .collect();
    build_window(items, total, page.offset)
}

/// Offset/limit requested by a tool caller, after defaults and clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

impl PageRequest {
    /// `limit` falls back to the configured default and is clamped to `1..=max_limit`.
    #[must_use]
    pub fn new(offset: Option<usize>, limit: Option<usize>, cfg: &PaginationConfig) -> Self {
        let max = cfg.max_limit.max(1);
        let limit = limit.unwrap_or(cfg.default_limit).clamp(1, max);
        Self {
            offset: offset.unwrap_or(0),
            limit,
        }
    }

    /// Read `offset`/`limit` from tool arguments. Missing, negative or non-integer values use
    /// the defaults.
    #[must_use]
    pub fn from_arguments(arguments: &Value, cfg: &PaginationConfig) -> Self {
        let read = |key: &str| {
            arguments
                .get(key)
                .and_then(Value::as_u64)
                .and_then(|n| usize::try_from(n).ok())
        };
        Self::new(read("offset"), read("limit"), cfg)
    }

    /// Upstream query pairs for a server-paginated request.
    #[must_use]
    pub fn query_pairs(&self, cfg: &PaginationConfig) -> Vec<(String, String)> {
        vec![
            (cfg.limit_param.clone(), self.limit.to_string()),
            (cfg.offset_param.clone(), self.offset.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{Normalized, flatten_record, normalize};
    use serde_json::json;

    fn records(n: usize) -> Vec<CanonicalRecord> {
        (0..n)
            .map(|i| flatten_record(&json!({ "id": i, "attributes": { "n": i } })))
            .collect()
    }

    #[test]
    fn window_reports_more_when_total_exceeds_page_end() {
        let w = build_window(records(2), 10, 4);
        assert_eq!(w.count, 2);
        assert!(w.has_more);
        assert_eq!(w.next_offset, Some(6));
    }

    #[test]
    fn window_has_no_more_at_or_past_the_end() {
        for (total, offset, n) in [(6, 4, 2), (0, 0, 0), (3, 0, 3), (2, 10, 0), (1, 0, 5)] {
            let w = build_window(records(n), total, offset);
            assert!(!w.has_more, "total={total} offset={offset} n={n}");
            assert_eq!(w.next_offset, None);
        }
    }

    #[test]
    fn window_invariant_holds_over_a_grid() {
        for total in 0..8 {
            for offset in 0..8 {
                for n in 0..4 {
                    let w = build_window(records(n), total, offset);
                    assert_eq!(w.has_more, total > offset + n);
                    assert_eq!(w.next_offset.is_some(), w.has_more);
                    if let Some(next) = w.next_offset {
                        assert_eq!(next, offset + n);
                    }
                }
            }
        }
    }

    #[test]
    fn window_serializes_without_next_offset_on_last_page() {
        let v = serde_json::to_value(build_window(records(1), 1, 0)).expect("serialize");
        assert!(v.get("next_offset").is_none());
        assert_eq!(v["has_more"], json!(false));
        assert_eq!(v["count"], json!(1));

        let v = serde_json::to_value(build_window(records(1), 5, 0)).expect("serialize");
        assert_eq!(v["next_offset"], json!(1));
    }

    #[test]
    fn server_mode_uses_reported_total() {
        let body = json!({
            "data": [
                { "id": "a", "attributes": { "name": "A" } },
                { "id": "b", "attributes": { "name": "B" } }
            ],
            "meta": { "page": { "total": 10 } }
        });
        let Normalized::Collection(collection) = normalize(body) else {
            panic!("expected collection");
        };
        assert_eq!(collection.total, 10);

        let page = PageRequest::new(Some(0), Some(2), &PaginationConfig::default());
        let w = window_from_server(collection, page);
        assert_eq!(w.count, 2);
        assert!(w.has_more);
        assert_eq!(w.next_offset, Some(2));
    }

    #[test]
    fn local_slice_mode_pages_through_full_collection() {
        let cfg = PaginationConfig::default();

        let w = window_from_local_slice(records(7), PageRequest::new(Some(0), Some(3), &cfg));
        assert_eq!((w.count, w.total, w.next_offset), (3, 7, Some(3)));
        assert_eq!(w.items[0].id(), &json!(0));

        let w = window_from_local_slice(records(7), PageRequest::new(Some(6), Some(3), &cfg));
        assert_eq!((w.count, w.total, w.has_more), (1, 7, false));
        assert_eq!(w.items[0].id(), &json!(6));

        let w = window_from_local_slice(records(7), PageRequest::new(Some(20), Some(3), &cfg));
        assert_eq!((w.count, w.has_more), (0, false));
    }

    #[test]
    fn page_request_defaults_and_clamps() {
        let cfg = PaginationConfig::default();
        assert_eq!(
            PageRequest::new(None, None, &cfg),
            PageRequest {
                offset: 0,
                limit: 20
            }
        );
        assert_eq!(PageRequest::new(None, Some(0), &cfg).limit, 1);
        assert_eq!(PageRequest::new(None, Some(5000), &cfg).limit, 100);

        let p = PageRequest::from_arguments(&json!({ "offset": 40, "limit": -1 }), &cfg);
        assert_eq!(p.offset, 40);
        assert_eq!(p.limit, 20);
    }

    #[test]
    fn query_pairs_use_configured_parameter_names() {
        let cfg = PaginationConfig {
            limit_param: "page[size]".to_string(),
            offset_param: "page[offset]".to_string(),
            ..PaginationConfig::default()
        };
        let pairs = PageRequest::new(Some(10), Some(5), &cfg).query_pairs(&cfg);
        assert_eq!(
            pairs,
            vec![
                ("page[size]".to_string(), "5".to_string()),
                ("page[offset]".to_string(), "10".to_string()),
            ]
        );
    }
}
