// src/hubspot/types.rs
// CRM entity kinds, records, and property schema types

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four CRM record kinds the server understands.
///
/// Declaration order doubles as the tie-break ordering for merged search
/// results (contact < company < deal < engagement).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Contact,
    Company,
    Deal,
    Engagement,
}

impl EntityKind {
    pub fn all() -> [EntityKind; 4] {
        [
            EntityKind::Contact,
            EntityKind::Company,
            EntityKind::Deal,
            EntityKind::Engagement,
        ]
    }

    /// The three kinds rebuilt by the force-reindex admin endpoint.
    pub fn primary() -> [EntityKind; 3] {
        [EntityKind::Contact, EntityKind::Company, EntityKind::Deal]
    }

    /// Path segment in the CRM objects API (`/crm/v3/objects/{path}`).
    pub fn object_path(&self) -> &'static str {
        match self {
            EntityKind::Contact => "contacts",
            EntityKind::Company => "companies",
            EntityKind::Deal => "deals",
            EntityKind::Engagement => "engagements",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Contact => "Contact",
            EntityKind::Company => "Company",
            EntityKind::Deal => "Deal",
            EntityKind::Engagement => "Engagement",
        }
    }

    pub fn plural_label(&self) -> &'static str {
        match self {
            EntityKind::Contact => "Contacts",
            EntityKind::Company => "Companies",
            EntityKind::Deal => "Deals",
            EntityKind::Engagement => "Engagements",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            EntityKind::Contact => "👤",
            EntityKind::Company => "🏢",
            EntityKind::Deal => "💼",
            EntityKind::Engagement => "📝",
        }
    }

    /// Curated property subset fetched by default, in render order.
    pub fn default_properties(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Contact => &[
                "firstname",
                "lastname",
                "email",
                "phone",
                "jobtitle",
                "company",
                "lifecyclestage",
                "city",
                "country",
                "createdate",
            ],
            EntityKind::Company => &[
                "name",
                "domain",
                "industry",
                "numberofemployees",
                "city",
                "country",
                "description",
                "createdate",
            ],
            EntityKind::Deal => &[
                "dealname",
                "amount",
                "dealstage",
                "pipeline",
                "closedate",
                "hubspot_owner_id",
                "description",
                "createdate",
                "deal_currency_code",
            ],
            EntityKind::Engagement => &[
                "engagementType",
                "subject",
                "body",
                "createdate",
                "updatedAt",
                "ownerId",
            ],
        }
    }

    /// Parse a user-supplied kind name; accepts singular and plural forms.
    pub fn parse(s: &str) -> Option<EntityKind> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contact" | "contacts" => Some(EntityKind::Contact),
            "company" | "companies" => Some(EntityKind::Company),
            "deal" | "deals" => Some(EntityKind::Deal),
            "engagement" | "engagements" => Some(EntityKind::Engagement),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.object_path())
    }
}

/// A CRM record. Properties are an open map; their meaning comes from the
/// property schema. IDs are unique within a kind, not across kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub kind: EntityKind,
    pub properties: BTreeMap<String, Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    /// Property value, treating null and missing alike.
    pub fn prop(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)
            .and_then(|v| v.as_deref())
            .filter(|v| !v.is_empty())
    }
}

/// Wire shape of a CRM object as returned by the v3 API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawObject {
    pub id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RawObject {
    pub fn into_record(self, kind: EntityKind) -> Record {
        Record {
            id: self.id,
            kind,
            properties: self.properties,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawPage {
    #[serde(default)]
    pub results: Vec<RawObject>,
    #[serde(default)]
    pub paging: Option<RawPaging>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawPaging {
    #[serde(default)]
    pub next: Option<RawPagingNext>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawPagingNext {
    pub after: String,
}

/// One page of records plus the cursor for the next page, if any.
#[derive(Debug, Clone, Serialize)]
pub struct ListPage {
    pub records: Vec<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_after: Option<String>,
}

/// Value type of a CRM property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Number,
    Date,
    Datetime,
    Enumeration,
    Boolean,
    /// Anything the CRM adds that we do not model explicitly
    Other,
}

impl<'de> Deserialize<'de> for PropertyType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(match name.as_str() {
            "string" => PropertyType::String,
            "number" => PropertyType::Number,
            "date" => PropertyType::Date,
            "datetime" => PropertyType::Datetime,
            "enumeration" => PropertyType::Enumeration,
            "bool" | "boolean" => PropertyType::Boolean,
            _ => PropertyType::Other,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyOption {
    pub label: String,
    pub value: String,
}

/// Schema descriptor for one CRM property.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default)]
    pub field_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub options: Vec<PropertyOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawPropertiesResponse {
    #[serde(default)]
    pub results: Vec<PropertyDescriptor>,
}
