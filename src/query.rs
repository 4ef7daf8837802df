// query.rs
// Filter/sort descriptors and the builder that turns submitted values into a
// safe MongoDB query. Values are always bound as BSON, never spliced into
// strings; free-text search goes through regex::escape before becoming a
// case-insensitive $regex.

use chrono::NaiveDate;
use mongodb::bson::{Bson, DateTime, Document, doc, oid::ObjectId};
use std::collections::HashMap;

pub const DEFAULT_PER_PAGE: i64 = 15;
pub const MAX_PER_PAGE: i64 = 100;

/// How a submitted value is interpreted against its target field.
#[derive(Debug, Clone, Copy)]
pub enum FilterKind {
    /// Free text; `exact` compares whole values, otherwise a contains match.
    Text { exact: bool },
    /// Closed set of accepted values; anything else is dropped.
    Select { choices: &'static [&'static str] },
    /// Range filter; accepts `{name}_de` and `{name}_ate` keys (inclusive).
    Date,
    Number,
    Flag,
    /// ObjectId reference.
    Id,
}

/// A named, typed search field.
#[derive(Debug, Clone, Copy)]
pub struct FilterField {
    /// Query-string key.
    pub name: &'static str,
    /// BSON field the predicate binds to.
    pub path: &'static str,
    pub kind: FilterKind,
}

/// A named sortable field. The first descriptor of a slice is the default.
#[derive(Debug, Clone, Copy)]
pub struct SortField {
    pub name: &'static str,
    pub path: &'static str,
    pub descending: bool,
}

/// Built query, ready to hand to the collection.
#[derive(Debug)]
pub struct ListQuery {
    pub filter: Document,
    pub sort: Document,
    pub skip: u64,
    pub limit: i64,
    /// Echo of the filter values that actually became predicates, so the UI
    /// can re-render the search form in its submitted state.
    pub active: Vec<(String, String)>,
    pub page: i64,
    pub per_page: i64,
}

/// Combines descriptors and submitted values into one AND query plus a single
/// ORDER BY. Unknown keys are ignored, empty values are skipped, an
/// unrecognized sort name falls back to the default descriptor.
pub fn build_list_query(
    filters: &[FilterField],
    sorts: &[SortField],
    params: &HashMap<String, String>,
) -> ListQuery {
    let mut filter = Document::new();
    let mut active = Vec::new();

    for field in filters {
        match field.kind {
            FilterKind::Date => {
                let mut range = Document::new();
                let from_key = format!("{}_de", field.name);
                let to_key = format!("{}_ate", field.name);
                if let Some(value) = submitted(params, &from_key)
                    && let Some(dt) = parse_day_start(value)
                {
                    range.insert("$gte", dt);
                    active.push((from_key, value.to_string()));
                }
                if let Some(value) = submitted(params, &to_key)
                    && let Some(dt) = parse_day_end(value)
                {
                    range.insert("$lte", dt);
                    active.push((to_key, value.to_string()));
                }
                if !range.is_empty() {
                    filter.insert(field.path, range);
                }
            }
            _ => {
                let Some(value) = submitted(params, field.name) else {
                    continue;
                };
                if let Some(predicate) = bind_value(field.kind, value) {
                    filter.insert(field.path, predicate);
                    active.push((field.name.to_string(), value.to_string()));
                }
            }
        }
    }

    let sort = resolve_sort(sorts, params);
    let (page, per_page, skip) = resolve_page(params);

    ListQuery {
        filter,
        sort,
        skip,
        limit: per_page,
        active,
        page,
        per_page,
    }
}

fn submitted<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn bind_value(kind: FilterKind, value: &str) -> Option<Bson> {
    match kind {
        FilterKind::Text { exact: true } => Some(Bson::String(value.to_string())),
        FilterKind::Text { exact: false } => Some(Bson::Document(doc! {
            "$regex": regex::escape(value),
            "$options": "i",
        })),
        FilterKind::Select { choices } => choices
            .contains(&value)
            .then(|| Bson::String(value.to_string())),
        FilterKind::Number => value.parse::<f64>().ok().map(Bson::Double),
        FilterKind::Flag => parse_flag(value).map(Bson::Boolean),
        FilterKind::Id => ObjectId::parse_str(value).ok().map(Bson::ObjectId),
        FilterKind::Date => None,
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "sim" => Some(true),
        "0" | "false" | "nao" | "não" => Some(false),
        _ => None,
    }
}

fn parse_day_start(value: &str) -> Option<DateTime> {
    let day = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    let start = day.and_hms_opt(0, 0, 0)?.and_utc();
    Some(DateTime::from_chrono(start))
}

fn parse_day_end(value: &str) -> Option<DateTime> {
    let day = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    let end = day.and_hms_milli_opt(23, 59, 59, 999)?.and_utc();
    Some(DateTime::from_chrono(end))
}

fn resolve_sort(sorts: &[SortField], params: &HashMap<String, String>) -> Document {
    let chosen = submitted(params, "sort")
        .and_then(|name| sorts.iter().find(|s| s.name == name))
        .or_else(|| sorts.first());

    let Some(field) = chosen else {
        return Document::new();
    };

    let mut descending = field.descending;
    if let Some(dir) = submitted(params, "dir") {
        match dir {
            "asc" => descending = false,
            "desc" => descending = true,
            _ => {}
        }
    }
    doc! { field.path: if descending { -1 } else { 1 } }
}

fn resolve_page(params: &HashMap<String, String>) -> (i64, i64, u64) {
    let page = submitted(params, "page")
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1);
    let per_page = submitted(params, "per_page")
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(DEFAULT_PER_PAGE)
        .min(MAX_PER_PAGE);
    // An absurd page number is still a valid request; it skips past the end
    // and yields an empty page.
    let skip = page
        .checked_sub(1)
        .and_then(|p| p.checked_mul(per_page))
        .map_or(u64::MAX, |s| s as u64);
    (page, per_page, skip)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILTERS: &[FilterField] = &[
        FilterField {
            name: "nome",
            path: "nome",
            kind: FilterKind::Text { exact: false },
        },
        FilterField {
            name: "status",
            path: "status",
            kind: FilterKind::Select {
                choices: &["aberto", "pago"],
            },
        },
        FilterField {
            name: "vencimento",
            path: "data_vencimento",
            kind: FilterKind::Date,
        },
        FilterField {
            name: "ativo",
            path: "ativo",
            kind: FilterKind::Flag,
        },
    ];

    const SORTS: &[SortField] = &[
        SortField {
            name: "vencimento",
            path: "data_vencimento",
            descending: false,
        },
        SortField {
            name: "valor",
            path: "valor",
            descending: true,
        },
    ];

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let q = build_list_query(FILTERS, SORTS, &params(&[("desconhecido", "x")]));
        assert!(q.filter.is_empty());
        assert!(q.active.is_empty());
    }

    #[test]
    fn empty_values_do_not_become_predicates() {
        let q = build_list_query(FILTERS, SORTS, &params(&[("nome", "   ")]));
        assert!(q.filter.is_empty());
    }

    #[test]
    fn text_filter_escapes_regex_metacharacters() {
        let q = build_list_query(FILTERS, SORTS, &params(&[("nome", "a.b(c)")]));
        let predicate = q.filter.get_document("nome").unwrap();
        assert_eq!(predicate.get_str("$regex").unwrap(), r"a\.b\(c\)");
        assert_eq!(predicate.get_str("$options").unwrap(), "i");
    }

    #[test]
    fn select_outside_choices_is_dropped() {
        let q = build_list_query(FILTERS, SORTS, &params(&[("status", "invalido")]));
        assert!(q.filter.is_empty());
        let q = build_list_query(FILTERS, SORTS, &params(&[("status", "aberto")]));
        assert_eq!(q.filter.get_str("status").unwrap(), "aberto");
    }

    #[test]
    fn date_range_builds_inclusive_bounds() {
        let q = build_list_query(
            FILTERS,
            SORTS,
            &params(&[("vencimento_de", "2024-05-01"), ("vencimento_ate", "2024-05-31")]),
        );
        let range = q.filter.get_document("data_vencimento").unwrap();
        assert!(range.contains_key("$gte"));
        assert!(range.contains_key("$lte"));
        assert_eq!(q.active.len(), 2);
    }

    #[test]
    fn bad_date_is_skipped_not_an_error() {
        let q = build_list_query(FILTERS, SORTS, &params(&[("vencimento_de", "31/05/2024")]));
        assert!(q.filter.is_empty());
    }

    #[test]
    fn fewer_filters_mean_weaker_query() {
        // Monotonicity: the one-filter query is a strict subset of the
        // two-filter query's predicates.
        let narrow = build_list_query(
            FILTERS,
            SORTS,
            &params(&[("nome", "silva"), ("status", "aberto")]),
        );
        let wide = build_list_query(FILTERS, SORTS, &params(&[("nome", "silva")]));
        assert_eq!(narrow.filter.len(), 2);
        assert_eq!(wide.filter.len(), 1);
        for key in wide.filter.keys() {
            assert!(narrow.filter.contains_key(key));
        }
    }

    #[test]
    fn unrecognized_sort_falls_back_to_default() {
        let q = build_list_query(FILTERS, SORTS, &params(&[("sort", "inexistente")]));
        assert_eq!(q.sort, doc! { "data_vencimento": 1 });
    }

    #[test]
    fn chosen_sort_and_direction_override() {
        let q = build_list_query(FILTERS, SORTS, &params(&[("sort", "valor")]));
        assert_eq!(q.sort, doc! { "valor": -1 });
        let q = build_list_query(
            FILTERS,
            SORTS,
            &params(&[("sort", "valor"), ("dir", "asc")]),
        );
        assert_eq!(q.sort, doc! { "valor": 1 });
    }

    #[test]
    fn pagination_defaults_and_caps() {
        let q = build_list_query(FILTERS, SORTS, &params(&[]));
        assert_eq!((q.page, q.per_page, q.skip), (1, DEFAULT_PER_PAGE, 0));

        let q = build_list_query(
            FILTERS,
            SORTS,
            &params(&[("page", "3"), ("per_page", "500")]),
        );
        assert_eq!(q.per_page, MAX_PER_PAGE);
        assert_eq!(q.skip, 200);

        let q = build_list_query(FILTERS, SORTS, &params(&[("page", "0")]));
        assert_eq!(q.page, 1);
    }

    #[test]
    fn absurd_page_numbers_skip_past_the_end_without_panicking() {
        let q = build_list_query(
            FILTERS,
            SORTS,
            &params(&[("page", &i64::MAX.to_string())]),
        );
        assert_eq!(q.page, i64::MAX);
        assert_eq!(q.skip, u64::MAX);

        let q = build_list_query(
            FILTERS,
            SORTS,
            &params(&[("page", &i64::MAX.to_string()), ("per_page", "100")]),
        );
        assert_eq!(q.skip, u64::MAX);
    }
}
