//! Pagination over query and scan results.
//!
//! The remote store delivers discrete, size-limited pages; a
//! [`Paginator`] presents them as one logical sequence. The state is
//! explicit: `Fetching` (a page request is about to be issued),
//! `Draining` (iterating the buffered page), `Exhausted` (terminal).
//! Page fetches are pull-based: the next request is only issued once
//! the current buffer is fully consumed and another element is asked
//! for.
//!
//! If the original request already carried a caller-supplied start key,
//! the paginator serves exactly one page and stops. Auto-continuation
//! only engages when the caller did not control pagination themselves.

use crate::errors::Error;
use crate::value::{from_attribute_value, Item, Row, Value};

/// One page of results plus the continuation cursor, if any.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Item>,
    /// Opaque cursor to echo back as the next request's exclusive start
    /// key. Absent once the traversal has reached its end.
    pub last_evaluated_key: Option<Item>,
}

/// Anything that can fetch one page given an optional start key.
///
/// Production sources wrap a query or scan request template; tests use
/// an in-memory fake.
pub trait PageSource {
    fn fetch(&mut self, start_key: Option<Item>) -> Result<Page, Error>;
}

enum PagerState {
    Fetching { start_key: Option<Item> },
    Draining {
        buffer: std::vec::IntoIter<Item>,
        next_key: Option<Item>,
    },
    Exhausted,
}

/// Lazy, forward-only, single-pass traversal of paged results.
///
/// Not restartable: a second traversal requires a new paginator built
/// from the original request parameters. Any fetch error is yielded at
/// the triggering pull and terminates the traversal.
pub struct Paginator<S: PageSource> {
    source: S,
    state: PagerState,
    auto_continue: bool,
    pages_fetched: usize,
}

impl<S: PageSource> Paginator<S> {
    /// Build a paginator. `start_key` is the caller's own exclusive
    /// start key; supplying one disables auto-continuation.
    pub fn new(source: S, start_key: Option<Item>) -> Self {
        let auto_continue = start_key.is_none();
        Paginator {
            source,
            state: PagerState::Fetching { start_key },
            auto_continue,
            pages_fetched: 0,
        }
    }

    /// Number of page requests issued so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Eagerly drain every remaining page into one ordered collection.
    /// Items arrive in page-then-intra-page order.
    pub fn collect_all(mut self) -> Result<Vec<Item>, Error> {
        let mut items = Vec::new();
        for item in &mut self {
            items.push(item?);
        }
        Ok(items)
    }
}

impl<S: PageSource> Iterator for Paginator<S> {
    type Item = Result<Item, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match &mut self.state {
                PagerState::Fetching { start_key } => {
                    let start_key = start_key.take();
                    match self.source.fetch(start_key) {
                        Ok(page) => {
                            self.pages_fetched += 1;
                            self.state = PagerState::Draining {
                                buffer: page.items.into_iter(),
                                next_key: page.last_evaluated_key,
                            };
                        }
                        Err(e) => {
                            self.state = PagerState::Exhausted;
                            return Some(Err(e));
                        }
                    }
                }
                PagerState::Draining { buffer, next_key } => match buffer.next() {
                    Some(item) => return Some(Ok(item)),
                    None => match next_key.take() {
                        Some(cursor) if self.auto_continue => {
                            self.state = PagerState::Fetching {
                                start_key: Some(cursor),
                            };
                        }
                        _ => {
                            self.state = PagerState::Exhausted;
                            return None;
                        }
                    },
                },
                PagerState::Exhausted => return None,
            }
        }
    }
}

/// A column-oriented view over a window of items.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TableData {
    /// Union of attribute names across the window, in first-seen order.
    pub columns: Vec<String>,
    /// One row per item; one possibly-absent cell per column.
    pub rows: Vec<Vec<Option<Value>>>,
}

/// Build a column-oriented table over the window
/// `[offset, offset + count)` of already-fetched rows.
///
/// This is a structural transpose: the column set is the union of
/// attribute names across the windowed rows, ordered by first
/// appearance. Rows are ordered attribute pairs rather than items
/// precisely so that first appearance is well defined; [`Mapper::to_row`]
/// produces them in schema declaration order. Output rows keep the input
/// order and fill missing attributes with `None`.
///
/// [`Mapper::to_row`]: crate::mapper::Mapper::to_row
pub fn extract_data(rows: &[Row], offset: usize, count: usize) -> Result<TableData, Error> {
    let window: Vec<&Row> = rows.iter().skip(offset).take(count).collect();

    let mut columns: Vec<String> = Vec::new();
    for row in &window {
        for (name, _) in row.iter() {
            if !columns.iter().any(|c| c == name) {
                columns.push(name.clone());
            }
        }
    }

    let mut out = Vec::with_capacity(window.len());
    for row in &window {
        let mut cells = Vec::with_capacity(columns.len());
        for column in &columns {
            match row.iter().find(|(name, _)| name == column) {
                Some((_, attr)) => cells.push(Some(from_attribute_value(attr)?)),
                None => cells.push(None),
            }
        }
        out.push(cells);
    }

    Ok(TableData { columns, rows: out })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::types::AttributeValue;

    /// In-memory page source: serves predefined pages keyed by position.
    /// Cursors are single-attribute items holding the next page index.
    struct FakeSource {
        pages: Vec<Vec<Item>>,
        fetches: usize,
        /// When set, every page carries a cursor, even the last one.
        cursor_on_last: bool,
    }

    impl FakeSource {
        fn new(sizes: &[usize]) -> Self {
            let mut next_id = 0;
            let pages = sizes
                .iter()
                .map(|&n| {
                    (0..n)
                        .map(|_| {
                            let mut item = Item::new();
                            item.insert(
                                "id".to_string(),
                                AttributeValue::N(next_id.to_string()),
                            );
                            next_id += 1;
                            item
                        })
                        .collect()
                })
                .collect();
            FakeSource {
                pages,
                fetches: 0,
                cursor_on_last: false,
            }
        }

        fn cursor(index: usize) -> Item {
            let mut key = Item::new();
            key.insert("page".to_string(), AttributeValue::N(index.to_string()));
            key
        }
    }

    impl PageSource for FakeSource {
        fn fetch(&mut self, start_key: Option<Item>) -> Result<Page, Error> {
            self.fetches += 1;
            let index = match start_key {
                None => 0,
                Some(key) => match &key["page"] {
                    AttributeValue::N(n) => n.parse::<usize>().unwrap(),
                    _ => unreachable!(),
                },
            };

            let is_last = index + 1 == self.pages.len();
            let cursor = if is_last && !self.cursor_on_last {
                None
            } else if index + 1 < self.pages.len() || self.cursor_on_last {
                Some(Self::cursor(index + 1))
            } else {
                None
            };

            Ok(Page {
                items: self.pages[index].clone(),
                last_evaluated_key: cursor,
            })
        }
    }

    fn ids(items: &[Item]) -> Vec<String> {
        items
            .iter()
            .map(|item| match &item["id"] {
                AttributeValue::N(n) => n.clone(),
                _ => unreachable!(),
            })
            .collect()
    }

    #[test]
    fn eager_drain_yields_all_pages_in_order() {
        let source = FakeSource::new(&[3, 3, 2]);
        let items = Paginator::new(source, None).collect_all().unwrap();
        assert_eq!(ids(&items), vec!["0", "1", "2", "3", "4", "5", "6", "7"]);
    }

    #[test]
    fn lazy_traversal_defers_fetches_until_buffer_is_drained() {
        let source = FakeSource::new(&[3, 3, 2]);
        let mut paginator = Paginator::new(source, None);

        // First pull issues exactly one fetch.
        let first = paginator.next().unwrap().unwrap();
        assert_eq!(ids(&[first]), vec!["0"]);
        assert_eq!(paginator.pages_fetched(), 1);

        // Draining the rest of the page issues no further fetch.
        paginator.next().unwrap().unwrap();
        paginator.next().unwrap().unwrap();
        assert_eq!(paginator.pages_fetched(), 1);

        // The fourth pull crosses the page boundary.
        paginator.next().unwrap().unwrap();
        assert_eq!(paginator.pages_fetched(), 2);

        let rest: Vec<_> = paginator.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(ids(&rest), vec!["4", "5", "6", "7"]);
        assert_eq!(paginator.pages_fetched(), 3);

        // Single pass, not restartable: further pulls yield nothing.
        assert!(paginator.next().is_none());
    }

    #[test]
    fn caller_supplied_start_key_disables_auto_continuation() {
        let mut source = FakeSource::new(&[3, 3, 2]);
        // Even with a cursor on every page, a caller-controlled start
        // key limits the traversal to the single fetched page.
        source.cursor_on_last = true;
        let items = Paginator::new(source, Some(FakeSource::cursor(1)))
            .collect_all()
            .unwrap();
        assert_eq!(ids(&items), vec!["3", "4", "5"]);
    }

    #[test]
    fn fetch_error_propagates_at_the_triggering_pull() {
        struct FailingSource {
            served: bool,
        }

        impl PageSource for FailingSource {
            fn fetch(&mut self, _start_key: Option<Item>) -> Result<Page, Error> {
                if self.served {
                    return Err(Error::Service {
                        code: Some("ThrottlingException".to_string()),
                        message: "slow down".to_string(),
                    });
                }
                self.served = true;
                let mut item = Item::new();
                item.insert("id".to_string(), AttributeValue::N("0".to_string()));
                let mut cursor = Item::new();
                cursor.insert("page".to_string(), AttributeValue::N("1".to_string()));
                Ok(Page {
                    items: vec![item],
                    last_evaluated_key: Some(cursor),
                })
            }
        }

        let mut paginator = Paginator::new(FailingSource { served: false }, None);
        assert!(paginator.next().unwrap().is_ok());

        let err = paginator.next().unwrap().unwrap_err();
        assert_eq!(err.service_code(), Some("ThrottlingException"));

        // The traversal is terminal after an error.
        assert!(paginator.next().is_none());
    }

    fn n(name: &str, value: i64) -> (String, AttributeValue) {
        (name.to_string(), AttributeValue::N(value.to_string()))
    }

    #[test]
    fn extract_data_transposes_with_first_seen_column_order() {
        let first: Row = vec![n("a", 1), n("b", 2)];
        let second: Row = vec![n("b", 3), n("c", 4)];

        let table = extract_data(&[first, second], 0, 2).unwrap();

        assert_eq!(table.columns, vec!["a", "b", "c"]);
        assert_eq!(table.rows.len(), 2);

        assert_eq!(table.rows[0][0], Some(Value::Number("1".to_string())));
        assert_eq!(table.rows[0][1], Some(Value::Number("2".to_string())));
        assert_eq!(table.rows[0][2], None);
        assert_eq!(table.rows[1][0], None);
        assert_eq!(table.rows[1][1], Some(Value::Number("3".to_string())));
        assert_eq!(table.rows[1][2], Some(Value::Number("4".to_string())));
    }

    #[test]
    fn column_order_is_stable_across_many_attributes() {
        let names: Vec<String> = (0..12).map(|i| format!("col{:02}", i)).collect();
        let row: Row = names
            .iter()
            .enumerate()
            .map(|(i, name)| n(name, i as i64))
            .collect();

        let table = extract_data(&[row], 0, 1).unwrap();
        assert_eq!(table.columns, names);
    }

    #[test]
    fn extract_data_respects_the_window() {
        let rows: Vec<Row> = (0..5).map(|i| vec![n("id", i)]).collect();

        let table = extract_data(&rows, 1, 2).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0], Some(Value::Number("1".to_string())));
        assert_eq!(table.rows[1][0], Some(Value::Number("2".to_string())));
    }
}
