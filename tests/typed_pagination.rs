//! End-to-end test of the typed mapping and pagination flow, using an
//! in-memory page source in place of the remote store.

use aws_sdk_dynamodb::types::AttributeValue;
use dynamap::paginate::{extract_data, Page, PageSource, Paginator};
use dynamap::schema::{Entity, EntitySchema, FieldDescriptor, Tracked};
use dynamap::value::{FromValue, Item, Value};
use dynamap::{Error, Mapper};

#[derive(Debug, Default, Clone, PartialEq)]
struct Order {
    order_id: String,
    amount: i64,
    note: Option<String>,
}

static ORDER_SCHEMA: EntitySchema<Order> = EntitySchema {
    entity: "Order",
    fields: &[
        FieldDescriptor {
            name: "order_id",
            column: None,
            key: true,
            get: |o| Some(Value::String(o.order_id.clone())),
            set: |o, v| {
                o.order_id = FromValue::from_value(v)?;
                Ok(())
            },
        },
        FieldDescriptor {
            name: "amount",
            column: None,
            key: false,
            get: |o| Some(Value::Number(o.amount.to_string())),
            set: |o, v| {
                o.amount = FromValue::from_value(v)?;
                Ok(())
            },
        },
        FieldDescriptor {
            name: "note",
            column: None,
            key: false,
            get: |o| o.note.clone().map(Value::String),
            set: |o, v| {
                o.note = Some(FromValue::from_value(v)?);
                Ok(())
            },
        },
    ],
};

impl Entity for Order {
    fn schema() -> &'static EntitySchema<Self> {
        &ORDER_SCHEMA
    }
}

/// Serves pre-encoded items in fixed-size pages with cursors between
/// them.
struct PagedOrders {
    pages: Vec<Vec<Item>>,
}

impl PagedOrders {
    fn new(orders: &[Order], page_size: usize) -> Self {
        let mapper = Mapper::<Order>::new("orders").unwrap();
        let pages = orders
            .chunks(page_size)
            .map(|chunk| chunk.iter().map(|o| mapper.to_item(o)).collect())
            .collect();
        PagedOrders { pages }
    }
}

impl PageSource for PagedOrders {
    fn fetch(&mut self, start_key: Option<Item>) -> Result<Page, Error> {
        let index = start_key
            .map(|key| match &key["next"] {
                AttributeValue::N(n) => n.parse::<usize>().unwrap(),
                _ => unreachable!(),
            })
            .unwrap_or(0);

        let cursor = if index + 1 < self.pages.len() {
            let mut key = Item::new();
            key.insert(
                "next".to_string(),
                AttributeValue::N((index + 1).to_string()),
            );
            Some(key)
        } else {
            None
        };

        Ok(Page {
            items: self.pages[index].clone(),
            last_evaluated_key: cursor,
        })
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn sample_orders(n: usize) -> Vec<Order> {
    (0..n)
        .map(|i| Order {
            order_id: format!("o{}", i),
            amount: (i as i64) * 10,
            note: if i % 2 == 0 {
                Some(format!("note {}", i))
            } else {
                None
            },
        })
        .collect()
}

#[test]
fn full_traversal_decodes_every_entity_in_order() {
    init_tracing();
    let orders = sample_orders(8);
    let mapper = Mapper::<Order>::new("orders").unwrap();

    let items = Paginator::new(PagedOrders::new(&orders, 3), None)
        .collect_all()
        .unwrap();
    assert_eq!(items.len(), 8);

    let decoded: Vec<Order> = items
        .iter()
        .map(|item| mapper.to_entity(Some(item)).unwrap().unwrap())
        .collect();
    assert_eq!(decoded, orders);
}

#[test]
fn lazy_traversal_fetches_three_pages_for_eight_items() {
    let orders = sample_orders(8);
    let mut paginator = Paginator::new(PagedOrders::new(&orders, 3), None);

    let count = paginator.by_ref().map(|r| r.unwrap()).count();
    assert_eq!(count, 8);
    assert_eq!(paginator.pages_fetched(), 3);
}

#[test]
fn windowed_extraction_over_paginated_results() {
    let orders = sample_orders(5);
    let mapper = Mapper::<Order>::new("orders").unwrap();
    let items = Paginator::new(PagedOrders::new(&orders, 2), None)
        .collect_all()
        .unwrap();

    // Decode into entities and re-encode as rows, so attribute order
    // follows the schema declaration.
    let rows: Vec<_> = items
        .iter()
        .map(|item| {
            let order = mapper.to_entity(Some(item)).unwrap().unwrap();
            mapper.to_row(&order)
        })
        .collect();

    let table = extract_data(&rows, 0, rows.len()).unwrap();

    // Odd-numbered orders omit `note`, so the column set is the union
    // and those rows carry a null cell for it.
    assert_eq!(table.columns, vec!["order_id", "amount", "note"]);
    assert_eq!(table.rows.len(), 5);

    assert!(table.rows[0][2].is_some());
    assert!(table.rows[1][2].is_none());
}

#[test]
fn dirty_tracking_drives_partial_updates() {
    let mapper = Mapper::<Order>::new("orders").unwrap();
    let orders = sample_orders(1);

    // Simulate a load: decode then wrap; the entity starts clean.
    let item = mapper.to_item(&orders[0]);
    let mut tracked: Tracked<Order> = mapper.to_entity_tracked(Some(&item)).unwrap().unwrap();
    assert!(mapper.to_update_item_tracked(&tracked).is_empty());

    tracked.set("amount", Value::number(99)).unwrap();
    let updates = mapper.to_update_item_tracked(&tracked);
    assert_eq!(updates.len(), 1);
    assert!(updates.contains_key("amount"));
}
