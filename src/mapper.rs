//! Entity to item conversion, key building, and table binding.
//!
//! A [`Mapper`] is bound to one table and one entity type. Construction
//! validates the schema (exactly one key field); everything after that
//! is pure conversion with no I/O.

use aws_sdk_dynamodb::types::{AttributeAction, AttributeValueUpdate};

use crate::errors::Error;
use crate::schema::{Entity, FieldDescriptor, NamingPolicy, Tracked};
use crate::value::{from_attribute_value, to_attribute_value, FromValue, Item, Row, Value};

/// Attribute-updates map for a partial update request.
pub type UpdateItem = std::collections::HashMap<String, AttributeValueUpdate>;

/// Typed mapper bound to a table.
pub struct Mapper<E: Entity> {
    table: String,
    naming: NamingPolicy,
    key_field: &'static FieldDescriptor<E>,
}

impl<E: Entity> Mapper<E> {
    /// Bind a mapper to a table with the default (identity) naming
    /// policy.
    ///
    /// Fails with a configuration error unless the entity schema
    /// declares exactly one key field.
    pub fn new(table: impl Into<String>) -> Result<Self, Error> {
        Self::with_naming(table, NamingPolicy::default())
    }

    /// Bind a mapper with an explicit naming policy.
    pub fn with_naming(table: impl Into<String>, naming: NamingPolicy) -> Result<Self, Error> {
        let schema = E::schema();
        let keys: Vec<_> = schema.key_fields().collect();
        if keys.len() != 1 {
            return Err(Error::Configuration {
                entity: schema.entity,
                count: keys.len(),
            });
        }

        Ok(Mapper {
            table: table.into(),
            naming,
            key_field: keys[0],
        })
    }

    /// The table this mapper is bound to.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Reject a request whose table name conflicts with the bound one.
    pub fn check_table(&self, requested: &str) -> Result<(), Error> {
        if requested != self.table {
            return Err(Error::Validation {
                requested: requested.to_string(),
                bound: self.table.clone(),
            });
        }
        Ok(())
    }

    /// The attribute name for a field: the explicit column override when
    /// present, otherwise the naming-policy transform of the field name.
    fn attribute_name(&self, field: &FieldDescriptor<E>) -> String {
        match field.column {
            Some(column) => column.to_string(),
            None => self.naming.apply(field.name),
        }
    }

    /// Encode an entity as an item.
    ///
    /// Fields are visited in declaration order; unset (`None`) fields
    /// are omitted entirely, never encoded as NULL.
    pub fn to_item(&self, entity: &E) -> Item {
        let mut item = Item::new();
        for field in E::schema().fields {
            if let Some(value) = (field.get)(entity) {
                item.insert(self.attribute_name(field), to_attribute_value(&value));
            }
        }
        item
    }

    /// Encode an entity as an ordered attribute row.
    ///
    /// Same attribute set as [`Mapper::to_item`], but attributes keep
    /// the schema's declaration order, so the row is fit for tabular
    /// extraction.
    pub fn to_row(&self, entity: &E) -> Row {
        let mut row = Row::new();
        for field in E::schema().fields {
            if let Some(value) = (field.get)(entity) {
                row.push((self.attribute_name(field), to_attribute_value(&value)));
            }
        }
        row
    }

    /// Encode only the dirty subset of a tracked entity, regardless of
    /// null-ness. An unset dirty field encodes as NULL so the partial
    /// update can clear it.
    pub fn to_item_tracked(&self, tracked: &Tracked<E>) -> Item {
        let mut item = Item::new();
        for field in E::schema().fields {
            if tracked.dirty_fields().any(|name| name == field.name) {
                let value = (field.get)(tracked.get()).unwrap_or(Value::Null);
                item.insert(self.attribute_name(field), to_attribute_value(&value));
            }
        }
        item
    }

    /// Encode an entity as an attribute-updates map with action PUT.
    pub fn to_update_item(&self, entity: &E) -> UpdateItem {
        self.to_item(entity)
            .into_iter()
            .map(|(name, value)| (name, put_update(value)))
            .collect()
    }

    /// Encode the dirty subset of a tracked entity as an
    /// attribute-updates map with action PUT.
    pub fn to_update_item_tracked(&self, tracked: &Tracked<E>) -> UpdateItem {
        self.to_item_tracked(tracked)
            .into_iter()
            .map(|(name, value)| (name, put_update(value)))
            .collect()
    }

    /// Decode an item into an entity.
    ///
    /// An absent or empty item decodes to `None`, not an empty entity.
    /// Attributes resolve to fields by exact attribute-name match, then
    /// through the column-override alias; unmatched attributes are
    /// ignored so newer schema versions remain readable.
    pub fn to_entity(&self, item: Option<&Item>) -> Result<Option<E>, Error> {
        let item = match item {
            Some(item) if !item.is_empty() => item,
            _ => return Ok(None),
        };

        let mut entity = E::default();
        for (name, attr) in item {
            let field = self.resolve_field(name);
            if let Some(field) = field {
                let value = from_attribute_value(attr)?;
                // A NULL attribute means "unset"; leave the field at its default.
                if value.is_null() {
                    continue;
                }
                (field.set)(&mut entity, value)?;
            }
        }
        Ok(Some(entity))
    }

    /// Decode an item into a tracked entity. The result starts clean.
    pub fn to_entity_tracked(&self, item: Option<&Item>) -> Result<Option<Tracked<E>>, Error> {
        Ok(self.to_entity(item)?.map(Tracked::new))
    }

    /// Decode the first attribute of an item into a scalar. An empty
    /// item yields the type's default value.
    pub fn to_scalar<T: FromValue + Default>(&self, item: &Item) -> Result<T, Error> {
        match item.values().next() {
            Some(attr) => T::from_value(from_attribute_value(attr)?),
            None => Ok(T::default()),
        }
    }

    /// Build the minimal item holding just the entity's key.
    ///
    /// An unset key value is a client-side precondition failure; no
    /// request is dispatched for it.
    pub fn create_key(&self, entity: &E) -> Result<Item, Error> {
        let value = (self.key_field.get)(entity).ok_or(Error::MissingKey {
            entity: E::schema().entity,
            field: self.key_field.name,
        })?;
        if value.is_null() {
            return Err(Error::MissingKey {
                entity: E::schema().entity,
                field: self.key_field.name,
            });
        }

        let mut key = Item::new();
        key.insert(
            self.attribute_name(self.key_field),
            to_attribute_value(&value),
        );
        Ok(key)
    }

    /// Resolve an attribute name to a field: exact field-name match
    /// first, then the declared column overrides.
    fn resolve_field(&self, attribute: &str) -> Option<&'static FieldDescriptor<E>> {
        let schema = E::schema();
        schema
            .fields
            .iter()
            .find(|f| self.naming.apply(f.name) == attribute)
            .or_else(|| schema.fields.iter().find(|f| f.column == Some(attribute)))
    }
}

fn put_update(value: aws_sdk_dynamodb::types::AttributeValue) -> AttributeValueUpdate {
    AttributeValueUpdate::builder()
        .value(value)
        .action(AttributeAction::Put)
        .build()
}

/// Encode generic ordered (name, value) pairs as an item under a naming
/// policy. Keys pass through unchanged under the default policy.
pub fn map_to_item(entries: &[(String, Value)], naming: NamingPolicy) -> Item {
    entries
        .iter()
        .map(|(name, value)| (naming.apply(name), to_attribute_value(value)))
        .collect()
}

/// Decode every attribute of an item into ordered (name, value) pairs,
/// keeping the original attribute names.
pub fn item_to_map(item: &Item) -> Result<Vec<(String, Value)>, Error> {
    let mut entries = Vec::with_capacity(item.len());
    for (name, attr) in item {
        entries.push((name.clone(), from_attribute_value(attr)?));
    }
    Ok(entries)
}
