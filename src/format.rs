// src/format.rs
// Deterministic Markdown renderings for tool results

use std::collections::BTreeMap;

use serde::Serialize;

use crate::hubspot::{EntityKind, PropertyDescriptor, PropertyType, Record};

/// Composite tool output: a Markdown summary and the raw records it was
/// rendered from. Transports send both, the Markdown first.
#[derive(Debug, Clone, Serialize)]
pub struct ToolReply {
    pub markdown: String,
    pub raw: serde_json::Value,
}

impl ToolReply {
    pub fn new(markdown: String, raw: serde_json::Value) -> Self {
        Self { markdown, raw }
    }

    /// The second content block: the raw records in a fenced JSON block.
    pub fn json_block(&self) -> String {
        render_json_block(&self.raw)
    }
}

/// Title line + one stanza per record. Field order is fixed per kind; the
/// fenced JSON block elsewhere carries the full records, so omitting an
/// empty property here loses nothing.
pub fn render_list(kind: EntityKind, records: &[Record]) -> String {
    let mut out = format!(
        "{} **{}** ({} found)\n",
        kind.emoji(),
        kind.plural_label(),
        records.len()
    );
    for record in records {
        out.push('\n');
        out.push_str(&render_record(record));
    }
    out
}

/// One record as a bolded title line plus `- Label: value` rows.
pub fn render_record(record: &Record) -> String {
    let mut out = format!("**{}**\n", record_title(record));
    for (label, value) in record_fields(record) {
        out.push_str(&format!("- {label}: {value}\n"));
    }
    out.push_str(&format!("- ID: {}\n", record.id));
    out
}

/// Not-found block with a reason line.
pub fn render_not_found(what: &str, reason: &str) -> String {
    format!("❌ **{what} Not Found**\n\n{reason}\n")
}

/// Property schema grouped by `group_name`; groups and rows are sorted so
/// the rendering is stable across calls.
pub fn render_properties(kind: EntityKind, descriptors: &[PropertyDescriptor]) -> String {
    let mut groups: BTreeMap<&str, Vec<&PropertyDescriptor>> = BTreeMap::new();
    for descriptor in descriptors {
        groups
            .entry(descriptor.group_name.as_str())
            .or_default()
            .push(descriptor);
    }

    let mut out = format!(
        "🔧 **{} Properties** ({} total)\n",
        kind.label(),
        descriptors.len()
    );
    for (group, mut members) in groups {
        members.sort_by(|a, b| a.label.cmp(&b.label));
        let group = if group.is_empty() { "ungrouped" } else { group };
        out.push_str(&format!("\n**{group}**\n"));
        for descriptor in members {
            out.push_str(&render_property_row(descriptor));
        }
    }
    out
}

fn render_property_row(descriptor: &PropertyDescriptor) -> String {
    let mut row = format!(
        "- **{}** (`{}`, {})",
        descriptor.label,
        descriptor.name,
        property_type_name(descriptor.property_type)
    );
    if !descriptor.description.is_empty() {
        row.push_str(": ");
        row.push_str(&descriptor.description);
    }
    if descriptor.property_type == PropertyType::Enumeration && !descriptor.options.is_empty() {
        let shown: Vec<&str> = descriptor
            .options
            .iter()
            .take(3)
            .map(|o| o.label.as_str())
            .collect();
        row.push_str(&format!("; options: {}", shown.join(", ")));
        let hidden = descriptor.options.len().saturating_sub(3);
        if hidden > 0 {
            row.push_str(&format!(" … and {hidden} others"));
        }
    }
    row.push('\n');
    row
}

fn property_type_name(property_type: PropertyType) -> &'static str {
    match property_type {
        PropertyType::String => "string",
        PropertyType::Number => "number",
        PropertyType::Date => "date",
        PropertyType::Datetime => "datetime",
        PropertyType::Enumeration => "enumeration",
        PropertyType::Boolean => "boolean",
        PropertyType::Other => "other",
    }
}

/// Fenced JSON block carrying the raw records verbatim.
pub fn render_json_block(value: &serde_json::Value) -> String {
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    format!("```json\n{pretty}\n```")
}

fn record_title(record: &Record) -> String {
    match record.kind {
        EntityKind::Contact => {
            let name = [record.prop("firstname"), record.prop("lastname")]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            if name.is_empty() {
                record
                    .prop("email")
                    .unwrap_or("(unnamed contact)")
                    .to_string()
            } else {
                name
            }
        }
        EntityKind::Company => record
            .prop("name")
            .unwrap_or("(unnamed company)")
            .to_string(),
        EntityKind::Deal => record.prop("dealname").unwrap_or("(unnamed deal)").to_string(),
        EntityKind::Engagement => record
            .prop("subject")
            .or_else(|| record.prop("engagementType"))
            .unwrap_or("(engagement)")
            .to_string(),
    }
}

/// (label, rendered value) pairs in the fixed per-kind order. Values that
/// are null or missing are omitted.
fn record_fields(record: &Record) -> Vec<(&'static str, String)> {
    let fields: &[(&'static str, &'static str)] = match record.kind {
        EntityKind::Contact => &[
            ("Email", "email"),
            ("Phone", "phone"),
            ("Title", "jobtitle"),
            ("Company", "company"),
            ("Lifecycle Stage", "lifecyclestage"),
            ("City", "city"),
            ("Country", "country"),
            ("Created", "createdate"),
        ],
        EntityKind::Company => &[
            ("Domain", "domain"),
            ("Industry", "industry"),
            ("Employees", "numberofemployees"),
            ("City", "city"),
            ("Country", "country"),
            ("Description", "description"),
            ("Created", "createdate"),
        ],
        EntityKind::Deal => &[
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
    };

    fields
        .iter()
        .filter_map(|(label, prop)| {
            let value = record.prop(prop)?;
            let rendered = if record.kind == EntityKind::Deal && *prop == "amount" {
                render_amount(value, record.prop("deal_currency_code"))
            } else {
                value.to_string()
            };
            Some((*label, rendered))
        })
        .collect()
}

/// Amount with the record's currency symbol when the code is known,
/// else the euro default.
pub fn render_amount(raw: &str, currency_code: Option<&str>) -> String {
    let symbol = match currency_code {
        Some("USD") => "$".to_string(),
        Some("GBP") => "£".to_string(),
        Some("JPY") => "¥".to_string(),
        Some("EUR") | None => "€".to_string(),
        Some(other) => format!("{other} "),
    };
    match raw.parse::<f64>() {
        Ok(value) => format!("{symbol}{}", group_thousands(value)),
        Err(_) => format!("{symbol}{raw}"),
    }
}

/// `45000` → `45,000.00`
fn group_thousands(value: f64) -> String {
    let negative = value < 0.0;
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((&formatted, "00"));

    let mut grouped = String::new();
    let digits: Vec<char> = int_part.chars().collect();
    for (i, ch) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*ch);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}
