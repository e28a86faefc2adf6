//! Condition and filter building.
//!
//! Conditions are plain data: a comparison operator plus its operands,
//! keyed by attribute name. A [`Filter`] accumulates them and renders a
//! DynamoDB filter expression with `#f{i}` / `:v{i}` placeholders, so
//! callers never hand-write expression strings.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;

use crate::value::{to_attribute_value, Value};

/// A comparison operator for scan and query filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Between,
    /// Attribute does not exist.
    Null,
    /// Attribute exists.
    NotNull,
    Contains,
    NotContains,
    BeginsWith,
    In,
}

/// A comparison with zero or more operands.
///
/// Fields are private: the constructors are the only way to build one,
/// and each enforces the operand count its operator renders with.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Condition {
    comparison: Comparison,
    operands: Vec<Value>,
}

impl Condition {
    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    pub fn operands(&self) -> &[Value] {
        &self.operands
    }

    fn unary(comparison: Comparison, operand: impl Into<Value>) -> Self {
        Condition {
            comparison,
            operands: vec![operand.into()],
        }
    }

    pub fn eq(value: impl Into<Value>) -> Self {
        Self::unary(Comparison::Eq, value)
    }

    pub fn ne(value: impl Into<Value>) -> Self {
        Self::unary(Comparison::Ne, value)
    }

    pub fn lt(value: impl Into<Value>) -> Self {
        Self::unary(Comparison::Lt, value)
    }

    pub fn le(value: impl Into<Value>) -> Self {
        Self::unary(Comparison::Le, value)
    }

    pub fn gt(value: impl Into<Value>) -> Self {
        Self::unary(Comparison::Gt, value)
    }

    pub fn ge(value: impl Into<Value>) -> Self {
        Self::unary(Comparison::Ge, value)
    }

    pub fn between(low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Condition {
            comparison: Comparison::Between,
            operands: vec![low.into(), high.into()],
        }
    }

    pub fn null() -> Self {
        Condition {
            comparison: Comparison::Null,
            operands: vec![],
        }
    }

    pub fn not_null() -> Self {
        Condition {
            comparison: Comparison::NotNull,
            operands: vec![],
        }
    }

    pub fn contains(value: impl Into<Value>) -> Self {
        Self::unary(Comparison::Contains, value)
    }

    pub fn not_contains(value: impl Into<Value>) -> Self {
        Self::unary(Comparison::NotContains, value)
    }

    pub fn begins_with(prefix: impl Into<Value>) -> Self {
        Self::unary(Comparison::BeginsWith, prefix)
    }

    /// Membership in a set of candidate values. Operand order is
    /// preserved and duplicates are not removed.
    pub fn is_in(values: impl IntoIterator<Item = Value>) -> Self {
        Condition {
            comparison: Comparison::In,
            operands: values.into_iter().collect(),
        }
    }
}

/// A rendered filter: the expression string plus its placeholder maps,
/// ready to attach to a query or scan request.
#[derive(Debug, Clone, Default)]
pub struct FilterExpression {
    pub expression: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

/// Fluent accumulator of per-attribute conditions, combined with AND.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<(String, Condition)>,
}

impl Filter {
    pub fn new() -> Self {
        Filter::default()
    }

    /// Add a condition on an attribute.
    pub fn attr(mut self, attribute: impl Into<String>, condition: Condition) -> Self {
        self.conditions.push((attribute.into(), condition));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Render the accumulated conditions as an expression with
    /// positional placeholders.
    pub fn render(&self) -> FilterExpression {
        self.render_prefixed("f", "v")
    }

    /// Render with explicit placeholder prefixes, so a key condition and
    /// a filter attached to the same request cannot collide.
    pub fn render_prefixed(&self, name_tag: &str, value_tag: &str) -> FilterExpression {
        let mut parts = Vec::with_capacity(self.conditions.len());
        let mut names = HashMap::new();
        let mut values = HashMap::new();

        for (i, (attribute, condition)) in self.conditions.iter().enumerate() {
            let name = format!("#{}{}", name_tag, i);
            names.insert(name.clone(), attribute.clone());

            let mut operand = |suffix: &str, value: &Value| -> String {
                let placeholder = format!(":{}{}{}", value_tag, i, suffix);
                values.insert(placeholder.clone(), to_attribute_value(value));
                placeholder
            };

            let part = match condition.comparison {
                Comparison::Eq => format!("{} = {}", name, operand("", &condition.operands[0])),
                Comparison::Ne => format!("{} <> {}", name, operand("", &condition.operands[0])),
                Comparison::Lt => format!("{} < {}", name, operand("", &condition.operands[0])),
                Comparison::Le => format!("{} <= {}", name, operand("", &condition.operands[0])),
                Comparison::Gt => format!("{} > {}", name, operand("", &condition.operands[0])),
                Comparison::Ge => format!("{} >= {}", name, operand("", &condition.operands[0])),
                Comparison::Between => format!(
                    "{} BETWEEN {} AND {}",
                    name,
                    operand("_lo", &condition.operands[0]),
                    operand("_hi", &condition.operands[1])
                ),
                Comparison::Null => format!("attribute_not_exists({})", name),
                Comparison::NotNull => format!("attribute_exists({})", name),
                Comparison::Contains => {
                    format!("contains({}, {})", name, operand("", &condition.operands[0]))
                }
                Comparison::NotContains => format!(
                    "NOT contains({}, {})",
                    name,
                    operand("", &condition.operands[0])
                ),
                Comparison::BeginsWith => format!(
                    "begins_with({}, {})",
                    name,
                    operand("", &condition.operands[0])
                ),
                Comparison::In => {
                    let members: Vec<String> = condition
                        .operands
                        .iter()
                        .enumerate()
                        .map(|(j, v)| operand(&format!("_{}", j), v))
                        .collect();
                    format!("{} IN ({})", name, members.join(", "))
                }
            };
            parts.push(part);
        }

        FilterExpression {
            expression: parts.join(" AND "),
            names,
            values,
        }
    }
}
