// src/index/hybrid.rs
// Deterministic query-term extraction and semantic/API result merging

use serde::Serialize;

use crate::hubspot::{EntityKind, FilterOperator, FilterTerm, Record};

use super::manager::SearchHit;
use super::text::serialize_record;

/// Terms extracted from a natural-language query: quoted substrings become
/// exact predicates, bare words become containment predicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryTerms {
    pub phrases: Vec<String>,
    pub words: Vec<String>,
}

impl QueryTerms {
    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty() && self.words.is_empty()
    }
}

pub fn extract_query_terms(query: &str) -> QueryTerms {
    let mut terms = QueryTerms::default();
    let mut rest = String::new();
    let mut in_quotes = false;
    let mut current = String::new();

    for ch in query.chars() {
        if ch == '"' {
            if in_quotes {
                let phrase = current.trim().to_string();
                if !phrase.is_empty() {
                    terms.phrases.push(phrase);
                }
                current.clear();
            }
            in_quotes = !in_quotes;
        } else if in_quotes {
            current.push(ch);
        } else {
            rest.push(ch);
        }
    }
    // an unterminated quote falls back to bare words
    if in_quotes && !current.trim().is_empty() {
        rest.push_str(&current);
    }

    terms.words = rest
        .split(|c: char| !c.is_alphanumeric() && c != '@' && c != '.')
        .map(|w| w.trim_matches('.'))
        .filter(|w| w.chars().any(|c| c.is_alphanumeric()))
        .map(str::to_string)
        .collect();
    terms
}

/// Map extracted terms to the kind's primary searchable property.
/// Engagements have no structured search surface; they contribute only
/// through the semantic side.
pub fn api_terms_for_kind(kind: EntityKind, terms: &QueryTerms) -> Vec<FilterTerm> {
    let mut filters = Vec::new();
    for phrase in &terms.phrases {
        if let Some(property) = primary_property(kind, phrase) {
            filters.push(FilterTerm {
                property_name: property.to_string(),
                operator: FilterOperator::Eq,
                value: phrase.clone(),
            });
        }
    }
    for word in &terms.words {
        if let Some(property) = primary_property(kind, word) {
            filters.push(FilterTerm {
                property_name: property.to_string(),
                operator: FilterOperator::ContainsToken,
                value: word.clone(),
            });
        }
    }
    filters
}

fn primary_property(kind: EntityKind, token: &str) -> Option<&'static str> {
    match kind {
        EntityKind::Contact => Some(if token.contains('@') { "email" } else { "firstname" }),
        EntityKind::Company => Some("name"),
        EntityKind::Deal => Some("dealname"),
        EntityKind::Engagement => None,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridHit {
    pub id: String,
    pub kind: EntityKind,
    pub score: f32,
    pub source: &'static str,
    pub snippet: String,
}

/// Weighted merge: `w·vectorScore + (1−w)·apiRank` where apiRank for the
/// i-th of n API results is `1 − i/n`. An entry found by only one side
/// keeps that side's contribution.
pub fn merge_hybrid(
    semantic: Vec<SearchHit>,
    api: Vec<Record>,
    semantic_weight: f32,
    k: usize,
) -> Vec<HybridHit> {
    let weight = semantic_weight.clamp(0.0, 1.0);
    let mut merged: Vec<HybridHit> = Vec::new();

    for hit in semantic {
        merged.push(HybridHit {
            id: hit.id,
            kind: hit.kind,
            score: weight * hit.score,
            source: "semantic",
            snippet: hit.snippet,
        });
    }

    let api_len = api.len();
    for (rank, record) in api.into_iter().enumerate() {
        let api_score = (1.0 - weight) * (1.0 - rank as f32 / api_len as f32);
        if let Some(existing) = merged
            .iter_mut()
            .find(|hit| hit.kind == record.kind && hit.id == record.id)
        {
            existing.score += api_score;
            existing.source = "hybrid";
        } else {
            let text = serialize_record(&record);
            let snippet = text.lines().next().unwrap_or_default().to_string();
            merged.push(HybridHit {
                id: record.id,
                kind: record.kind,
                score: api_score,
                source: "api",
                snippet,
            });
        }
    }

    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.kind.cmp(&b.kind))
            .then_with(|| a.id.cmp(&b.id))
    });
    merged.truncate(k);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn hit(id: &str, score: f32) -> SearchHit {
        SearchHit {
            id: id.into(),
            kind: EntityKind::Deal,
            score,
            snippet: String::new(),
        }
    }

    fn deal(id: &str, name: &str) -> Record {
        Record {
            id: id.into(),
            kind: EntityKind::Deal,
            properties: BTreeMap::from([("dealname".to_string(), Some(name.to_string()))]),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_extract_quoted_and_bare_terms() {
        let terms = extract_query_terms(r#"deals for "Acme Corp" renewal 2024"#);
        assert_eq!(terms.phrases, vec!["Acme Corp"]);
        assert_eq!(terms.words, vec!["deals", "for", "renewal", "2024"]);
    }

    #[test]
    fn test_extract_unterminated_quote_degrades_to_words() {
        let terms = extract_query_terms(r#"find "half open"#);
        assert!(terms.phrases.is_empty());
        assert_eq!(terms.words, vec!["find", "half", "open"]);
    }

    #[test]
    fn test_extract_empty_query() {
        assert!(extract_query_terms("  ,,  ").is_empty());
    }

    #[test]
    fn test_api_terms_use_primary_property() {
        let terms = extract_query_terms(r#""Premium Contract" renewal"#);
        let filters = api_terms_for_kind(EntityKind::Deal, &terms);
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].property_name, "dealname");
        assert_eq!(filters[0].operator, FilterOperator::Eq);
        assert_eq!(filters[1].operator, FilterOperator::ContainsToken);

        // email-shaped tokens route to the email property
        let terms = extract_query_terms("ada@example.com");
        let filters = api_terms_for_kind(EntityKind::Contact, &terms);
        assert_eq!(filters[0].property_name, "email");

        assert!(api_terms_for_kind(EntityKind::Engagement, &terms).is_empty());
    }

    #[test]
    fn test_merge_weights_both_sides() {
        let semantic = vec![hit("1", 0.9), hit("2", 0.4)];
        let api = vec![deal("2", "Two"), deal("3", "Three")];
        let merged = merge_hybrid(semantic, api, 0.7, 10);

        // id 2: 0.7*0.4 + 0.3*(1 - 0/2) = 0.58 ; id 1: 0.7*0.9 = 0.63
        assert_eq!(merged[0].id, "1");
        assert_eq!(merged[0].source, "semantic");
        assert_eq!(merged[1].id, "2");
        assert_eq!(merged[1].source, "hybrid");
        assert!((merged[1].score - 0.58).abs() < 1e-5);
        // id 3: 0.3*(1 - 1/2) = 0.15
        assert_eq!(merged[2].id, "3");
        assert_eq!(merged[2].source, "api");
        assert!((merged[2].score - 0.15).abs() < 1e-5);
    }

    #[test]
    fn test_merge_truncates_to_k() {
        let api: Vec<Record> = (0..10).map(|i| deal(&i.to_string(), "D")).collect();
        let merged = merge_hybrid(Vec::new(), api, 0.5, 3);
        assert_eq!(merged.len(), 3);
    }
}
