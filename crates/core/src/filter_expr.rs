use serde_json::Value;

/// Filter constraint tree, serialized to the backend's textual filter
/// syntax as an array-of-arrays: outer elements are AND-ed, inner arrays
/// are OR-groups of predicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterExpr {
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Eq { attribute: String, value: String },
    NotNull { attribute: String },
}

impl FilterExpr {
    pub fn eq(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        FilterExpr::Eq {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn not_null(attribute: impl Into<String>) -> Self {
        FilterExpr::NotNull {
            attribute: attribute.into(),
        }
    }

    fn predicate(&self) -> Option<String> {
        match self {
            FilterExpr::Eq { attribute, value } => {
                Some(format!("{attribute} = \"{}\"", escape(value)))
            }
            FilterExpr::NotNull { attribute } => Some(format!("{attribute} IS NOT NULL")),
            FilterExpr::And(_) | FilterExpr::Or(_) => None,
        }
    }

    /// One AND-ed element of the outer filter array. Groups nested inside
    /// an OR flatten to their leaf predicates; the wire syntax supports a
    /// single level of grouping.
    pub fn to_value(&self) -> Value {
        match self {
            FilterExpr::Eq { .. } | FilterExpr::NotNull { .. } => {
                Value::String(self.predicate().unwrap_or_default())
            }
            FilterExpr::Or(items) | FilterExpr::And(items) => Value::Array(
                items
                    .iter()
                    .flat_map(FilterExpr::leaf_predicates)
                    .map(Value::String)
                    .collect(),
            ),
        }
    }

    fn leaf_predicates(&self) -> Vec<String> {
        match self {
            FilterExpr::And(items) | FilterExpr::Or(items) => {
                items.iter().flat_map(FilterExpr::leaf_predicates).collect()
            }
            leaf => leaf.predicate().into_iter().collect(),
        }
    }
}

/// Serializes AND-ed constraint groups into the outer filter array.
/// An empty slice yields `null`, which callers omit from the wire body.
pub fn serialize_filter(groups: &[FilterExpr]) -> Value {
    if groups.is_empty() {
        return Value::Null;
    }
    Value::Array(groups.iter().map(FilterExpr::to_value).collect())
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn predicates_serialize_to_quoted_equalities() {
        let expr = FilterExpr::eq("block_type", "html");
        assert_eq!(expr.to_value(), json!("block_type = \"html\""));

        let expr = FilterExpr::not_null("last_published");
        assert_eq!(expr.to_value(), json!("last_published IS NOT NULL"));
    }

    #[test]
    fn quotes_in_values_are_escaped() {
        let expr = FilterExpr::eq("tags.level0", "Subject > \"Quoted\"");
        assert_eq!(
            expr.to_value(),
            json!("tags.level0 = \"Subject > \\\"Quoted\\\"\"")
        );
    }

    #[test]
    fn or_group_becomes_inner_array() {
        let group = FilterExpr::Or(vec![
            FilterExpr::eq("block_type", "html"),
            FilterExpr::eq("block_type", "problem"),
        ]);
        assert_eq!(
            group.to_value(),
            json!(["block_type = \"html\"", "block_type = \"problem\""])
        );
    }

    #[test]
    fn and_groups_form_the_outer_array() {
        let filter = serialize_filter(&[
            FilterExpr::Or(vec![
                FilterExpr::eq("block_type", "html"),
                FilterExpr::eq("content.problem_types", "mcq"),
            ]),
            FilterExpr::eq("tags.level0", "Subject > Math"),
        ]);
        assert_eq!(
            filter,
            json!([
                ["block_type = \"html\"", "content.problem_types = \"mcq\""],
                "tags.level0 = \"Subject > Math\"",
            ])
        );
    }

    #[test]
    fn empty_filter_serializes_to_null() {
        assert_eq!(serialize_filter(&[]), Value::Null);
    }
}
