// src/index/text.rs
// Textual serialization of CRM records for embedding input

use crate::hubspot::{EntityKind, Record};

/// Fixed per-kind field templates. Order matters: the serialization must
/// be deterministic so identical source data embeds identically.
fn template(kind: EntityKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        EntityKind::Contact => &[
            ("First Name", "firstname"),
            ("Last Name", "lastname"),
            ("Email", "email"),
            ("Phone", "phone"),
            ("Job Title", "jobtitle"),
            ("Company", "company"),
            ("Lifecycle Stage", "lifecyclestage"),
            ("City", "city"),
            ("Country", "country"),
            ("Created", "createdate"),
        ],
        EntityKind::Company => &[
            ("Name", "name"),
            ("Domain", "domain"),
            ("Industry", "industry"),
            ("Employees", "numberofemployees"),
            ("City", "city"),
            ("Country", "country"),
            ("Description", "description"),
            ("Created", "createdate"),
        ],
        EntityKind::Deal => &[
            ("Deal Name", "dealname"),
            ("Amount", "amount"),
            ("Stage", "dealstage"),
            ("Pipeline", "pipeline"),
            ("Close Date", "closedate"),
            ("Owner", "hubspot_owner_id"),
            ("Description", "description"),
            ("Created", "createdate"),
        ],
        EntityKind::Engagement => &[
            ("Type", "engagementType"),
            ("Subject", "subject"),
            ("Body", "body"),
            ("Created", "createdate"),
            ("Updated", "updatedAt"),
            ("Owner", "ownerId"),
        ],
    }
}

/// `Label: value` lines for the populated subset of the template fields.
/// Null and missing values are omitted.
pub fn serialize_record(record: &Record) -> String {
    template(record.kind)
        .iter()
        .filter_map(|(label, prop)| {
            record.prop(prop).map(|value| format!("{label}: {value}"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(kind: EntityKind, props: &[(&str, &str)]) -> Record {
        Record {
            id: "1".into(),
            kind,
            properties: props
                .iter()
                .map(|(k, v)| (k.to_string(), Some(v.to_string())))
                .collect::<BTreeMap<_, _>>(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_deal_serialization_order_is_fixed() {
        let text = serialize_record(&record(
            EntityKind::Deal,
            &[
                ("pipeline", "enterprise"),
                ("dealname", "Enterprise Renewal"),
                ("amount", "45000"),
            ],
        ));
        assert_eq!(
            text,
            "Deal Name: Enterprise Renewal\nAmount: 45000\nPipeline: enterprise"
        );
    }

    #[test]
    fn test_missing_and_null_fields_are_omitted() {
        let mut r = record(EntityKind::Contact, &[("firstname", "Ada")]);
        r.properties.insert("email".into(), None);
        assert_eq!(serialize_record(&r), "First Name: Ada");
    }

    #[test]
    fn test_empty_record_serializes_empty() {
        assert_eq!(serialize_record(&record(EntityKind::Company, &[])), "");
    }
}
