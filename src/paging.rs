//! Paged-listing collection.
//!
//! The backend reports list endpoints in more than one envelope shape: an
//! object with a `results` array and a `totalCount`, an object with some
//! other array-valued key, or a bare array. [`PageEnvelope`] is the single
//! coercion point for all of them; [`collect_paged`] drains a listing into
//! one in-memory set using the same stop rule at every call site.
//!
//! The collector is deliberately sequential: each page fetch completes
//! before the next is issued, and a failed fetch aborts the whole
//! collection with nothing returned.

use serde_json::Value;

/// Alternate array-valued keys some endpoints use instead of `results`.
const ALTERNATE_ITEM_KEYS: [&str; 3] = ["titles", "items", "data"];

/// A page response normalized into one of the shapes the backend produces.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEnvelope {
    /// Object with an array of items and, when the backend reports one, a
    /// total count for the whole listing.
    Keyed { items: Vec<Value>, total: Option<u64> },

    /// Bare array of items; no total is ever reported for this shape.
    Array(Vec<Value>),

    /// Nothing recognizable as a list of items.
    Empty,
}

impl PageEnvelope {
    /// Coerce a raw response into an envelope.
    ///
    /// An object with a list-valued field wins over a bare list; an object
    /// with no known array key coerces to [`PageEnvelope::Empty`].
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => {
                if let Some(Value::Array(results)) = map.get("results") {
                    let total = map.get("totalCount").and_then(Value::as_u64);
                    return PageEnvelope::Keyed {
                        items: results.clone(),
                        total,
                    };
                }
                for key in ALTERNATE_ITEM_KEYS {
                    if let Some(Value::Array(items)) = map.get(key) {
                        return PageEnvelope::Keyed {
                            items: items.clone(),
                            total: None,
                        };
                    }
                }
                PageEnvelope::Empty
            }
            Value::Array(items) => PageEnvelope::Array(items.clone()),
            _ => PageEnvelope::Empty,
        }
    }

    /// Split into `(items, reported_total)`.
    fn into_parts(self) -> (Vec<Value>, Option<u64>) {
        match self {
            PageEnvelope::Keyed { items, total } => (items, total),
            PageEnvelope::Array(items) => (items, None),
            PageEnvelope::Empty => (Vec::new(), None),
        }
    }
}

/// Drain a paged listing into a complete in-memory set.
///
/// `fetch` is called with `(page_index, page_size)` starting at page 0.
/// Collection stops once the accumulated count reaches the backend-reported
/// total, or as soon as a page yields zero items; the latter guards
/// against backends whose reported total is wrong, so the loop finishes
/// within one page past the reported total regardless. Shapes that report
/// no total stop after their first page.
///
/// Any fetch error aborts the collection; partial results are discarded.
pub async fn collect_paged<F, E>(page_size: u32, mut fetch: F) -> Result<Vec<Value>, E>
where
    F: AsyncFnMut(u32, u32) -> Result<Value, E>,
{
    let mut items: Vec<Value> = Vec::new();
    let mut page: u32 = 0;

    loop {
        let raw = fetch(page, page_size).await?;
        let (page_items, reported_total) = PageEnvelope::from_value(&raw).into_parts();

        if page_items.is_empty() {
            break;
        }
        items.extend(page_items);

        let total_estimate = reported_total.unwrap_or(items.len() as u64);
        if items.len() as u64 >= total_estimate {
            break;
        }
        page += 1;
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_keyed_results() {
        let envelope = PageEnvelope::from_value(&json!({
            "results": [1, 2, 3],
            "totalCount": 7
        }));
        assert_eq!(
            envelope,
            PageEnvelope::Keyed {
                items: vec![json!(1), json!(2), json!(3)],
                total: Some(7)
            }
        );
    }

    #[test]
    fn test_coerce_alternate_keys() {
        for key in ["titles", "items", "data"] {
            let envelope = PageEnvelope::from_value(&json!({ key: ["a"] }));
            assert_eq!(
                envelope,
                PageEnvelope::Keyed {
                    items: vec![json!("a")],
                    total: None
                }
            );
        }
    }

    #[test]
    fn test_coerce_bare_array_and_junk() {
        assert_eq!(
            PageEnvelope::from_value(&json!(["x"])),
            PageEnvelope::Array(vec![json!("x")])
        );
        assert_eq!(PageEnvelope::from_value(&json!({"ok": true})), PageEnvelope::Empty);
        assert_eq!(PageEnvelope::from_value(&json!(null)), PageEnvelope::Empty);
        assert_eq!(PageEnvelope::from_value(&json!("nope")), PageEnvelope::Empty);
    }

    #[test]
    fn test_collect_until_total() {
        let pages = vec![
            json!({"results": ["a", "b"], "totalCount": 3}),
            json!({"results": ["c"], "totalCount": 3}),
        ];
        let items = tokio_test::block_on(collect_paged(2, async |page: u32, _size: u32| {
            Ok::<Value, String>(pages[page as usize].clone())
        }))
        .unwrap();

        assert_eq!(items, vec![json!("a"), json!("b"), json!("c")]);
    }

    #[test]
    fn test_collect_stops_on_empty_page_despite_wrong_total() {
        // Backend claims far more items than it will ever return.
        let items = tokio_test::block_on(collect_paged(2, async |page: u32, _size: u32| {
            let body = if page < 2 {
                json!({"results": ["x", "y"], "totalCount": 1000})
            } else {
                json!({"results": [], "totalCount": 1000})
            };
            Ok::<Value, String>(body)
        }))
        .unwrap();

        assert_eq!(items.len(), 4);
    }

    #[test]
    fn test_collect_bare_array_is_single_page() {
        let mut calls = 0u32;
        let items = tokio_test::block_on(collect_paged(50, async |_page: u32, _size: u32| {
            calls += 1;
            Ok::<Value, String>(json!(["only", "page"]))
        }))
        .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_fetch_error_discards_partial_results() {
        let result = tokio_test::block_on(collect_paged(2, async |page: u32, _size: u32| {
            if page == 0 {
                Ok(json!({"results": ["a", "b"], "totalCount": 10}))
            } else {
                Err("HTTP 500".to_string())
            }
        }));

        assert_eq!(result, Err("HTTP 500".to_string()));
    }
}
