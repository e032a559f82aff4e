// src/hubspot/filters.rs
// Search predicate construction for the CRM search endpoint

use serde::Serialize;

/// Operator applied to a single search term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterOperator {
    #[serde(rename = "EQ")]
    Eq,
    #[serde(rename = "CONTAINS_TOKEN")]
    ContainsToken,
}

/// One key-value predicate; terms are ANDed together by the search API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterTerm {
    pub property_name: String,
    pub operator: FilterOperator,
    pub value: String,
}

/// Fields matched by token containment rather than exact equality.
const CONTAINS_FIELDS: &[&str] = &[
    "dealname",
    "email",
    "firstname",
    "lastname",
    "company",
    "name",
    "domain",
    "industry",
    "country",
];

/// Fields holding identifiers, matched exactly.
const EQUALS_FIELDS: &[&str] = &["owner_id", "hubspot_owner_id", "dealstage", "pipeline"];

/// Pick the operator for a filter field. Text-like fields use token
/// containment; identifier-like fields use equality. When a field is in
/// neither class, containment wins.
pub fn operator_for(field: &str) -> FilterOperator {
    if CONTAINS_FIELDS.contains(&field) {
        FilterOperator::ContainsToken
    } else if EQUALS_FIELDS.contains(&field) {
        FilterOperator::Eq
    } else {
        FilterOperator::ContainsToken
    }
}

/// Wire name for a filter field. The public tool surface says `owner_id`;
/// the CRM property is `hubspot_owner_id`.
fn property_name_for(field: &str) -> &str {
    match field {
        "owner_id" => "hubspot_owner_id",
        other => other,
    }
}

/// Build AND-of-terms from (field, value) pairs, skipping empty values.
pub fn terms_from_pairs<'a, I>(pairs: I) -> Vec<FilterTerm>
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    pairs
        .into_iter()
        .filter_map(|(field, value)| {
            let value = value?.trim();
            if value.is_empty() {
                return None;
            }
            Some(FilterTerm {
                property_name: property_name_for(field).to_string(),
                operator: operator_for(field),
                value: value.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_selection() {
        assert_eq!(operator_for("dealname"), FilterOperator::ContainsToken);
        assert_eq!(operator_for("email"), FilterOperator::ContainsToken);
        assert_eq!(operator_for("dealstage"), FilterOperator::Eq);
        assert_eq!(operator_for("pipeline"), FilterOperator::Eq);
        assert_eq!(operator_for("owner_id"), FilterOperator::Eq);
        // unknown fields fall back to containment
        assert_eq!(operator_for("nickname"), FilterOperator::ContainsToken);
    }

    #[test]
    fn test_terms_skip_empty_values() {
        let terms = terms_from_pairs([
            ("dealname", Some("Premium")),
            ("owner_id", Some("42")),
            ("pipeline", Some("  ")),
            ("dealstage", None),
        ]);
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].property_name, "dealname");
        assert_eq!(terms[0].operator, FilterOperator::ContainsToken);
        assert_eq!(terms[1].property_name, "hubspot_owner_id");
        assert_eq!(terms[1].operator, FilterOperator::Eq);
    }

    #[test]
    fn test_term_wire_shape() {
        let terms = terms_from_pairs([("dealstage", Some("proposal"))]);
        let json = serde_json::to_value(&terms).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "propertyName": "dealstage",
                "operator": "EQ",
                "value": "proposal"
            }])
        );
    }
}
