//! Async DynamoDB operations.
//!
//! Free functions over `aws_sdk_dynamodb::Client`, one per store
//! operation. These are the asynchronous surface of the crate; the
//! blocking facade in [`crate::client`] delegates here and passes
//! results and errors through unchanged. No retry, no backoff, no
//! error translation happens at this layer.

use aws_sdk_dynamodb::types::{DeleteRequest, KeysAndAttributes, PutRequest, WriteRequest};
use aws_sdk_dynamodb::Client;
use tracing::debug;

use crate::condition::Filter;
use crate::errors::{map_sdk_error, Error};
use crate::mapper::UpdateItem;
use crate::paginate::Page;
use crate::value::Item;

/// DynamoDB caps BatchWriteItem at 25 write requests per call.
const BATCH_WRITE_LIMIT: usize = 25;
/// DynamoDB caps BatchGetItem at 100 keys per call.
const BATCH_GET_LIMIT: usize = 100;

/// Parameters for a query traversal. Cloneable so a paginator can hold
/// the template while issuing continuation requests.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub table: String,
    pub key_condition: Filter,
    pub filter: Option<Filter>,
    pub limit: Option<i32>,
    /// Caller-controlled start key. When set, pagination never
    /// auto-continues past the first page.
    pub exclusive_start_key: Option<Item>,
    pub scan_index_forward: Option<bool>,
    pub index_name: Option<String>,
    pub consistent_read: bool,
}

impl QueryRequest {
    pub fn new(table: impl Into<String>, key_condition: Filter) -> Self {
        QueryRequest {
            table: table.into(),
            key_condition,
            filter: None,
            limit: None,
            exclusive_start_key: None,
            scan_index_forward: None,
            index_name: None,
            consistent_read: false,
        }
    }
}

/// Parameters for a scan traversal.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub table: String,
    pub filter: Option<Filter>,
    /// Attribute names to project. Empty means all attributes.
    pub projection: Vec<String>,
    pub limit: Option<i32>,
    pub exclusive_start_key: Option<Item>,
    pub index_name: Option<String>,
    pub consistent_read: bool,
}

impl ScanRequest {
    pub fn new(table: impl Into<String>) -> Self {
        ScanRequest {
            table: table.into(),
            filter: None,
            projection: Vec::new(),
            limit: None,
            exclusive_start_key: None,
            index_name: None,
            consistent_read: false,
        }
    }
}

/// Put an item into a table, optionally guarded by a condition.
pub async fn put_item(
    client: &Client,
    table: &str,
    item: Item,
    condition: Option<&Filter>,
) -> Result<(), Error> {
    debug!(table, attributes = item.len(), "put_item");

    let mut request = client.put_item().table_name(table).set_item(Some(item));

    if let Some(filter) = condition {
        let rendered = filter.render_prefixed("c", "c");
        request = request
            .condition_expression(rendered.expression)
            .set_expression_attribute_names(Some(rendered.names))
            .set_expression_attribute_values(none_if_empty(rendered.values));
    }

    request
        .send()
        .await
        .map_err(|e| map_sdk_error(e, Some(table)))?;
    Ok(())
}

/// Get an item by key. `consistent` is passed straight through to the
/// store; this layer enforces nothing about it.
pub async fn get_item(
    client: &Client,
    table: &str,
    key: Item,
    consistent: bool,
) -> Result<Option<Item>, Error> {
    debug!(table, consistent, "get_item");

    let output = client
        .get_item()
        .table_name(table)
        .set_key(Some(key))
        .consistent_read(consistent)
        .send()
        .await
        .map_err(|e| map_sdk_error(e, Some(table)))?;

    Ok(output.item)
}

/// Delete an item by key, optionally guarded by a condition.
pub async fn delete_item(
    client: &Client,
    table: &str,
    key: Item,
    condition: Option<&Filter>,
) -> Result<(), Error> {
    debug!(table, "delete_item");

    let mut request = client.delete_item().table_name(table).set_key(Some(key));

    if let Some(filter) = condition {
        let rendered = filter.render_prefixed("c", "c");
        request = request
            .condition_expression(rendered.expression)
            .set_expression_attribute_names(Some(rendered.names))
            .set_expression_attribute_values(none_if_empty(rendered.values));
    }

    request
        .send()
        .await
        .map_err(|e| map_sdk_error(e, Some(table)))?;
    Ok(())
}

/// Apply an attribute-updates map to an item. The updates carry their
/// own per-attribute actions (PUT by default, see
/// [`crate::mapper::Mapper::to_update_item`]).
pub async fn update_item(
    client: &Client,
    table: &str,
    key: Item,
    updates: UpdateItem,
) -> Result<(), Error> {
    debug!(table, attributes = updates.len(), "update_item");

    client
        .update_item()
        .table_name(table)
        .set_key(Some(key))
        .set_attribute_updates(Some(updates))
        .send()
        .await
        .map_err(|e| map_sdk_error(e, Some(table)))?;
    Ok(())
}

/// Fetch one page of query results. `start_key` overrides the
/// request's own exclusive start key; the paginator uses this for
/// continuation.
pub async fn query_page(
    client: &Client,
    request: &QueryRequest,
    start_key: Option<Item>,
) -> Result<Page, Error> {
    debug!(table = %request.table, "query_page");

    let key = request.key_condition.render_prefixed("k", "k");
    let mut names = key.names;
    let mut values = key.values;

    let mut builder = client
        .query()
        .table_name(&request.table)
        .key_condition_expression(key.expression)
        .consistent_read(request.consistent_read);

    if let Some(filter) = &request.filter {
        let rendered = filter.render();
        builder = builder.filter_expression(rendered.expression);
        names.extend(rendered.names);
        values.extend(rendered.values);
    }

    builder = builder
        .set_expression_attribute_names(Some(names))
        .set_expression_attribute_values(none_if_empty(values));

    if let Some(limit) = request.limit {
        builder = builder.limit(limit);
    }
    if let Some(forward) = request.scan_index_forward {
        builder = builder.scan_index_forward(forward);
    }
    if let Some(index) = &request.index_name {
        builder = builder.index_name(index);
    }

    let start = start_key.or_else(|| request.exclusive_start_key.clone());
    builder = builder.set_exclusive_start_key(start);

    let output = builder
        .send()
        .await
        .map_err(|e| map_sdk_error(e, Some(&request.table)))?;

    Ok(Page {
        items: output.items.unwrap_or_default(),
        last_evaluated_key: output.last_evaluated_key,
    })
}

/// Fetch one page of scan results.
pub async fn scan_page(
    client: &Client,
    request: &ScanRequest,
    start_key: Option<Item>,
) -> Result<Page, Error> {
    debug!(table = %request.table, "scan_page");

    let mut builder = client
        .scan()
        .table_name(&request.table)
        .consistent_read(request.consistent_read);

    let mut names = std::collections::HashMap::new();
    let mut values = std::collections::HashMap::new();

    if let Some(filter) = &request.filter {
        let rendered = filter.render();
        builder = builder.filter_expression(rendered.expression);
        names.extend(rendered.names);
        values.extend(rendered.values);
    }

    if !request.projection.is_empty() {
        let mut parts = Vec::with_capacity(request.projection.len());
        for (i, attribute) in request.projection.iter().enumerate() {
            let placeholder = format!("#p{}", i);
            parts.push(placeholder.clone());
            names.insert(placeholder, attribute.clone());
        }
        builder = builder.projection_expression(parts.join(", "));
    }

    builder = builder
        .set_expression_attribute_names(none_if_empty(names))
        .set_expression_attribute_values(none_if_empty(values));

    if let Some(limit) = request.limit {
        builder = builder.limit(limit);
    }
    if let Some(index) = &request.index_name {
        builder = builder.index_name(index);
    }

    let start = start_key.or_else(|| request.exclusive_start_key.clone());
    builder = builder.set_exclusive_start_key(start);

    let output = builder
        .send()
        .await
        .map_err(|e| map_sdk_error(e, Some(&request.table)))?;

    Ok(Page {
        items: output.items.unwrap_or_default(),
        last_evaluated_key: output.last_evaluated_key,
    })
}

/// Get multiple items by key, splitting requests to respect the
/// 100-key limit per call. Unprocessed keys are resubmitted as-is,
/// with no backoff; persistent throttling surfaces as the service
/// error it is.
pub async fn batch_get_item(
    client: &Client,
    table: &str,
    keys: Vec<Item>,
) -> Result<Vec<Item>, Error> {
    debug!(table, keys = keys.len(), "batch_get_item");

    let mut found = Vec::new();

    for chunk in keys.chunks(BATCH_GET_LIMIT) {
        let mut pending = chunk.to_vec();

        while !pending.is_empty() {
            let request = KeysAndAttributes::builder()
                .set_keys(Some(pending.clone()))
                .build()
                .map_err(|e| Error::Encoding(format!("invalid batch get request: {}", e)))?;

            let output = client
                .batch_get_item()
                .request_items(table, request)
                .send()
                .await
                .map_err(|e| map_sdk_error(e, Some(table)))?;

            if let Some(mut responses) = output.responses {
                if let Some(items) = responses.remove(table) {
                    found.extend(items);
                }
            }

            pending = output
                .unprocessed_keys
                .and_then(|mut u| u.remove(table))
                .map(|k| k.keys)
                .unwrap_or_default();
        }
    }

    Ok(found)
}

/// Write (put and/or delete) multiple items, splitting requests to
/// respect the 25-request limit per call. Unprocessed entries are
/// resubmitted as-is, with no backoff.
pub async fn batch_write_item(
    client: &Client,
    table: &str,
    puts: Vec<Item>,
    deletes: Vec<Item>,
) -> Result<(), Error> {
    debug!(table, puts = puts.len(), deletes = deletes.len(), "batch_write_item");

    let mut requests = Vec::with_capacity(puts.len() + deletes.len());

    for item in puts {
        let put = PutRequest::builder()
            .set_item(Some(item))
            .build()
            .map_err(|e| Error::Encoding(format!("invalid batch put request: {}", e)))?;
        requests.push(WriteRequest::builder().put_request(put).build());
    }

    for key in deletes {
        let delete = DeleteRequest::builder()
            .set_key(Some(key))
            .build()
            .map_err(|e| Error::Encoding(format!("invalid batch delete request: {}", e)))?;
        requests.push(WriteRequest::builder().delete_request(delete).build());
    }

    for chunk in requests.chunks(BATCH_WRITE_LIMIT) {
        let mut pending = chunk.to_vec();

        while !pending.is_empty() {
            let output = client
                .batch_write_item()
                .request_items(table, pending)
                .send()
                .await
                .map_err(|e| map_sdk_error(e, Some(table)))?;

            pending = output
                .unprocessed_items
                .and_then(|mut u| u.remove(table))
                .unwrap_or_default();
        }
    }

    Ok(())
}

fn none_if_empty<V>(
    map: std::collections::HashMap<String, V>,
) -> Option<std::collections::HashMap<String, V>> {
    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}
