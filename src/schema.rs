//! Entity schemas, naming policies, and change tracking.
//!
//! Entities declare their fields through a static descriptor table
//! instead of runtime reflection: each field carries its name, an
//! optional attribute-name override, a key flag, and getter/setter
//! function pointers. The table is built once, at program start, as a
//! `static`.
//!
//! ```
//! use dynamap::schema::{Entity, EntitySchema, FieldDescriptor};
//! use dynamap::value::{FromValue, Value};
//!
//! #[derive(Debug, Default, Clone, PartialEq)]
//! struct User {
//!     id: String,
//!     age: i64,
//! }
//!
//! static USER_SCHEMA: EntitySchema<User> = EntitySchema {
//!     entity: "User",
//!     fields: &[
//!         FieldDescriptor {
//!             name: "id",
//!             column: None,
//!             key: true,
//!             get: |u| Some(Value::String(u.id.clone())),
//!             set: |u, v| {
//!                 u.id = FromValue::from_value(v)?;
//!                 Ok(())
//!             },
//!         },
//!         FieldDescriptor {
//!             name: "age",
//!             column: None,
//!             key: false,
//!             get: |u| Some(Value::Number(u.age.to_string())),
//!             set: |u, v| {
//!                 u.age = FromValue::from_value(v)?;
//!                 Ok(())
//!             },
//!         },
//!     ],
//! };
//!
//! impl Entity for User {
//!     fn schema() -> &'static EntitySchema<Self> {
//!         &USER_SCHEMA
//!     }
//! }
//! ```

use std::collections::BTreeSet;

use crate::errors::Error;
use crate::value::Value;

/// One declared field of an entity type.
pub struct FieldDescriptor<E> {
    /// The field name as declared on the entity.
    pub name: &'static str,
    /// Explicit attribute-name override. When set, it wins over the
    /// naming policy.
    pub column: Option<&'static str>,
    /// Whether this field is the entity's identifying key.
    pub key: bool,
    /// Read the field as a host value. `None` means the field is unset.
    pub get: fn(&E) -> Option<Value>,
    /// Write the field from a decoded host value, coercing through the
    /// field type's own string-parsing rule.
    pub set: fn(&mut E, Value) -> Result<(), Error>,
}

/// The static descriptor table for an entity type, in declaration order.
pub struct EntitySchema<E: 'static> {
    /// Entity type name, used in error messages.
    pub entity: &'static str,
    pub fields: &'static [FieldDescriptor<E>],
}

impl<E> EntitySchema<E> {
    /// Look up a field by its declared name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor<E>> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// All fields flagged as keys.
    pub fn key_fields(&self) -> impl Iterator<Item = &FieldDescriptor<E>> {
        self.fields.iter().filter(|f| f.key)
    }
}

/// A typed domain object with a statically declared schema. The
/// `'static` bound lets the descriptor table live in a `static`.
pub trait Entity: Default + 'static {
    fn schema() -> &'static EntitySchema<Self>;
}

/// The transform from field name to attribute name.
///
/// `Identity` is the default: attribute names equal field names. The
/// other policies convert between case conventions; an explicit column
/// override on a field always bypasses the policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NamingPolicy {
    #[default]
    Identity,
    /// `created_at` becomes `createdAt`.
    LowerCamelCase,
    /// `createdAt` becomes `created_at`.
    SnakeCase,
}

impl NamingPolicy {
    /// Apply the policy to a field name.
    pub fn apply(&self, name: &str) -> String {
        match self {
            NamingPolicy::Identity => name.to_string(),
            NamingPolicy::LowerCamelCase => {
                let mut out = String::with_capacity(name.len());
                let mut upper_next = false;
                for ch in name.chars() {
                    if ch == '_' {
                        upper_next = true;
                    } else if upper_next {
                        out.extend(ch.to_uppercase());
                        upper_next = false;
                    } else {
                        out.push(ch);
                    }
                }
                out
            }
            NamingPolicy::SnakeCase => {
                let mut out = String::with_capacity(name.len() + 4);
                for ch in name.chars() {
                    if ch.is_uppercase() {
                        out.push('_');
                        out.extend(ch.to_lowercase());
                    } else {
                        out.push(ch);
                    }
                }
                out
            }
        }
    }
}

/// Change-tracking decorator around an entity.
///
/// Records which fields have been written through it since construction
/// or the last [`clear_dirty`](Tracked::clear_dirty). A freshly loaded
/// entity is clean; encoding a `Tracked` value includes only the dirty
/// subset, which is what gives "update only what changed" semantics
/// without the caller computing a diff.
pub struct Tracked<E: Entity> {
    inner: E,
    dirty: BTreeSet<&'static str>,
}

impl<E: Entity> Tracked<E> {
    /// Wrap an entity with an empty dirty set.
    pub fn new(inner: E) -> Self {
        Tracked {
            inner,
            dirty: BTreeSet::new(),
        }
    }

    /// The wrapped entity.
    pub fn get(&self) -> &E {
        &self.inner
    }

    /// Unwrap, discarding the dirty set.
    pub fn into_inner(self) -> E {
        self.inner
    }

    /// Write a field by name, coercing the value through the field's
    /// setter, and mark it dirty.
    pub fn set(&mut self, field: &str, value: Value) -> Result<(), Error> {
        let descriptor = E::schema().field(field).ok_or_else(|| {
            Error::Encoding(format!(
                "entity `{}` has no field named `{}`",
                E::schema().entity,
                field
            ))
        })?;
        (descriptor.set)(&mut self.inner, value)?;
        self.dirty.insert(descriptor.name);
        Ok(())
    }

    /// Mark a field dirty without writing it, for callers that mutate
    /// the inner entity directly.
    pub fn mark_dirty(&mut self, field: &str) -> Result<(), Error> {
        let descriptor = E::schema().field(field).ok_or_else(|| {
            Error::Encoding(format!(
                "entity `{}` has no field named `{}`",
                E::schema().entity,
                field
            ))
        })?;
        self.dirty.insert(descriptor.name);
        Ok(())
    }

    /// Names of the fields written since the last clear, in declaration
    /// order.
    pub fn dirty_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        E::schema()
            .fields
            .iter()
            .map(|f| f.name)
            .filter(move |name| self.dirty.contains(name))
    }

    /// Whether any field is dirty.
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Forget all recorded changes. Called after a load or a successful
    /// partial update.
    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }
}


#[cfg(test)]
mod tests {
    use super::test_entities::User;
    use super::*;

    #[test]
    fn naming_policies() {
        assert_eq!(NamingPolicy::Identity.apply("created_at"), "created_at");
        assert_eq!(NamingPolicy::LowerCamelCase.apply("created_at"), "createdAt");
        assert_eq!(NamingPolicy::SnakeCase.apply("createdAt"), "created_at");
    }

    #[test]
    fn tracked_starts_clean() {
        let tracked = Tracked::new(User::default());
        assert!(!tracked.is_dirty());
        assert_eq!(tracked.dirty_fields().count(), 0);
    }

    #[test]
    fn set_marks_exactly_one_field_dirty() {
        let mut tracked = Tracked::new(User::default());
        tracked
            .set("name", Value::String("alice".to_string()))
            .unwrap();

        assert_eq!(tracked.get().name, "alice");
        let dirty: Vec<_> = tracked.dirty_fields().collect();
        assert_eq!(dirty, vec!["name"]);
    }

    #[test]
    fn clear_dirty_forgets_changes() {
        let mut tracked = Tracked::new(User::default());
        tracked.set("age", Value::number(30)).unwrap();
        tracked.clear_dirty();
        assert!(!tracked.is_dirty());
    }

    #[test]
    fn set_unknown_field_is_an_error() {
        let mut tracked = Tracked::new(User::default());
        let err = tracked.set("nope", Value::Null).unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
    }

    #[test]
    fn dirty_fields_follow_declaration_order() {
        let mut tracked = Tracked::new(User::default());
        tracked.set("age", Value::number(1)).unwrap();
        tracked.set("id", Value::String("u1".to_string())).unwrap();
        let dirty: Vec<_> = tracked.dirty_fields().collect();
        assert_eq!(dirty, vec!["id", "age"]);
    }
}
