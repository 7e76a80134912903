/// List query features: filtering, sorting, projection and pagination
///
/// A `ListQuery` is parsed from query-string pairs against an entity's field
/// catalog, then handed to a repository. The PostgreSQL store renders it into
/// SQL; the in-memory store evaluates it with [`ListQuery::apply`].
///
/// # Query String Syntax
///
/// ```text
/// ?difficulty=easy&price[lt]=1500    # filters (eq, gt, gte, lt, lte)
/// ?duration=5&duration=9             # repeated key -> any-of
/// ?sort=-ratingsAverage,price        # multi-key sort, '-' for descending
/// ?fields=name,price                 # projection ('id' always kept)
/// ?page=2&limit=10                   # pagination
/// ```
///
/// # Example
///
/// ```
/// use natourex_shared::query::{FieldKind, FieldSpec, ListQuery};
///
/// const FIELDS: &[FieldSpec] = &[
///     FieldSpec::new("price", "price", FieldKind::Number),
///     FieldSpec::new("createdAt", "created_at", FieldKind::Timestamp),
/// ];
///
/// let pairs = vec![
///     ("price[gte]".to_string(), "500".to_string()),
///     ("sort".to_string(), "-price".to_string()),
/// ];
/// let query = ListQuery::parse(&pairs, FIELDS, "-createdAt").unwrap();
/// assert_eq!(query.filters.len(), 1);
/// assert!(query.sort[0].descending);
/// ```

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::cmp::Ordering;
use uuid::Uuid;

/// Query-string keys that control the query instead of filtering
pub const RESERVED_PARAMS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// Page size when `limit` is absent or invalid
pub const DEFAULT_LIMIT: u32 = 100;

/// Largest accepted page size
pub const MAX_LIMIT: u32 = 100;

/// Errors raised while parsing a list query
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum QueryError {
    /// Filter or sort on a field the entity does not expose
    #[error("Unknown field '{0}'")]
    UnknownField(String),

    /// Operator inside brackets is not one of gt, gte, lt, lte
    #[error("Unknown operator '{0}'")]
    UnknownOperator(String),

    /// Value cannot be converted to the field's type
    #[error("Invalid value '{value}' for field '{field}'")]
    InvalidValue { field: String, value: String },
}

/// Storage type of a queryable field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    Text,
    Bool,
    Id,
    Timestamp,
}

/// A queryable field: public (camelCase) name, column and type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Name used in the query string and JSON output
    pub name: &'static str,

    /// Column name in the database
    pub column: &'static str,

    /// Value type
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn new(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self { name, column, kind }
    }
}

/// Looks up a field by its public name
pub fn find_field(catalog: &[FieldSpec], name: &str) -> Option<FieldSpec> {
    catalog.iter().find(|f| f.name == name).copied()
}

/// A typed field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Bool(bool),
    Id(Uuid),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// Parses a raw query-string value according to the field kind
    pub fn parse(kind: FieldKind, raw: &str) -> Option<Self> {
        match kind {
            FieldKind::Number => raw.trim().parse::<f64>().ok().filter(|n| n.is_finite()).map(FieldValue::Number),
            FieldKind::Text => Some(FieldValue::Text(raw.to_string())),
            FieldKind::Bool => match raw {
                "true" => Some(FieldValue::Bool(true)),
                "false" => Some(FieldValue::Bool(false)),
                _ => None,
            },
            FieldKind::Id => Uuid::parse_str(raw).ok().map(FieldValue::Id),
            FieldKind::Timestamp => parse_timestamp(raw).map(FieldValue::Timestamp),
        }
    }

    /// Orders two values of the same variant; `None` across variants
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Number(a), FieldValue::Number(b)) => a.partial_cmp(b),
            (FieldValue::Text(a), FieldValue::Text(b)) => Some(a.cmp(b)),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => Some(a.cmp(b)),
            (FieldValue::Id(a), FieldValue::Id(b)) => Some(a.cmp(b)),
            (FieldValue::Timestamp(a), FieldValue::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC)
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Comparison operator of a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    fn from_operator(op: &str) -> Option<Self> {
        match op {
            "gt" => Some(Comparison::Gt),
            "gte" => Some(Comparison::Gte),
            "lt" => Some(Comparison::Lt),
            "lte" => Some(Comparison::Lte),
            _ => None,
        }
    }

    /// SQL operator
    pub fn sql(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Comparison::Eq => ordering == Ordering::Equal,
            Comparison::Gt => ordering == Ordering::Greater,
            Comparison::Gte => ordering != Ordering::Less,
            Comparison::Lt => ordering == Ordering::Less,
            Comparison::Lte => ordering != Ordering::Greater,
        }
    }
}

/// One filter condition
///
/// Equality filters may carry several values, meaning any-of.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: FieldSpec,
    pub comparison: Comparison,
    pub values: Vec<FieldValue>,
}

impl Filter {
    /// Equality filter on a single value
    pub fn equals(field: FieldSpec, value: FieldValue) -> Self {
        Self {
            field,
            comparison: Comparison::Eq,
            values: vec![value],
        }
    }

    /// Evaluates the filter against a field value (missing values never match)
    pub fn matches(&self, actual: Option<&FieldValue>) -> bool {
        let Some(actual) = actual else {
            return false;
        };

        self.values.iter().any(|expected| {
            actual
                .compare(expected)
                .map(|ord| self.comparison.accepts(ord))
                .unwrap_or(false)
        })
    }
}

/// One sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: FieldSpec,
    pub descending: bool,
}

/// Preset overriding limit, sort and projection of a listing
#[derive(Debug, Clone, Copy)]
pub struct AliasQuery {
    pub limit: u32,
    pub sort: &'static str,
    pub fields: &'static str,
}

impl AliasQuery {
    /// Replaces `limit`, `sort` and `fields` in the pairs, keeping filters
    pub fn apply(&self, pairs: &mut Vec<(String, String)>) {
        pairs.retain(|(key, _)| !matches!(key.as_str(), "limit" | "sort" | "fields"));
        pairs.push(("limit".to_string(), self.limit.to_string()));
        pairs.push(("sort".to_string(), self.sort.to_string()));
        pairs.push(("fields".to_string(), self.fields.to_string()));
    }
}

/// Parsed list query
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    pub sort: Vec<SortKey>,
    pub fields: Option<Vec<String>>,
    pub page: u32,
    pub limit: u32,
}

impl ListQuery {
    /// Parses query-string pairs against a field catalog
    ///
    /// # Errors
    ///
    /// Returns `QueryError` for unknown fields or operators and for values
    /// that do not fit the field type. Invalid `page`/`limit` values fall back
    /// to their defaults.
    pub fn parse(
        pairs: &[(String, String)],
        catalog: &[FieldSpec],
        default_sort: &str,
    ) -> Result<Self, QueryError> {
        let mut filters: Vec<Filter> = Vec::new();
        let mut sort_raw: Option<&str> = None;
        let mut fields: Option<Vec<String>> = None;
        let mut page = 1;
        let mut limit = DEFAULT_LIMIT;

        for (key, value) in pairs {
            match key.as_str() {
                "page" => page = value.parse::<u32>().ok().filter(|p| *p > 0).unwrap_or(1),
                "limit" => {
                    limit = value
                        .parse::<u32>()
                        .ok()
                        .filter(|l| *l > 0)
                        .unwrap_or(DEFAULT_LIMIT)
                        .min(MAX_LIMIT)
                }
                "sort" => sort_raw = Some(value.as_str()),
                "fields" => {
                    let list: Vec<String> = split_list(value).map(str::to_string).collect();
                    fields = if list.is_empty() { None } else { Some(list) };
                }
                _ => {
                    let (name, comparison) = split_operator(key)?;
                    let field = find_field(catalog, name)
                        .ok_or_else(|| QueryError::UnknownField(name.to_string()))?;
                    let parsed = FieldValue::parse(field.kind, value).ok_or_else(|| {
                        QueryError::InvalidValue {
                            field: name.to_string(),
                            value: value.clone(),
                        }
                    })?;

                    // Repeated equality on one field collapses into any-of
                    let existing = filters
                        .iter_mut()
                        .find(|f| f.field == field && f.comparison == Comparison::Eq);
                    match (comparison, existing) {
                        (Comparison::Eq, Some(filter)) => filter.values.push(parsed),
                        _ => filters.push(Filter {
                            field,
                            comparison,
                            values: vec![parsed],
                        }),
                    }
                }
            }
        }

        let sort = parse_sort(sort_raw.unwrap_or(default_sort), catalog)?;

        Ok(Self {
            filters,
            sort,
            fields,
            page,
            limit,
        })
    }

    /// Adds a filter, e.g. a parent-resource constraint on nested routes
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Number of rows to skip
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Evaluates filters, sort and pagination over in-memory items
    pub fn apply<T, F>(&self, items: Vec<T>, value_of: F) -> Vec<T>
    where
        F: Fn(&T, &str) -> Option<FieldValue>,
    {
        let mut matched: Vec<T> = items
            .into_iter()
            .filter(|item| {
                self.filters
                    .iter()
                    .all(|f| f.matches(value_of(item, f.field.name).as_ref()))
            })
            .collect();

        matched.sort_by(|a, b| {
            for key in &self.sort {
                let ord = compare_optional(
                    value_of(a, key.field.name).as_ref(),
                    value_of(b, key.field.name).as_ref(),
                );
                let ord = if key.descending { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        matched
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.limit as usize)
            .collect()
    }

    /// Keeps only the requested fields (plus `id`) of a serialized item
    pub fn project(&self, value: Value) -> Value {
        let Some(fields) = &self.fields else {
            return value;
        };

        match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .filter(|(key, _)| key == "id" || fields.iter().any(|f| f == key))
                    .collect(),
            ),
            other => other,
        }
    }
}

/// Missing values sort before present ones
fn compare_optional(a: Option<&FieldValue>, b: Option<&FieldValue>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.compare(b).unwrap_or(Ordering::Equal),
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Splits `price[gte]` into (`price`, Gte)
fn split_operator(key: &str) -> Result<(&str, Comparison), QueryError> {
    match key.split_once('[') {
        None => Ok((key, Comparison::Eq)),
        Some((name, rest)) => {
            let op = rest
                .strip_suffix(']')
                .ok_or_else(|| QueryError::UnknownOperator(rest.to_string()))?;
            let comparison = Comparison::from_operator(op)
                .ok_or_else(|| QueryError::UnknownOperator(op.to_string()))?;
            Ok((name, comparison))
        }
    }
}

fn parse_sort(raw: &str, catalog: &[FieldSpec]) -> Result<Vec<SortKey>, QueryError> {
    split_list(raw)
        .map(|item| {
            let (name, descending) = match item.strip_prefix('-') {
                Some(name) => (name, true),
                None => (item, false),
            };
            let field =
                find_field(catalog, name).ok_or_else(|| QueryError::UnknownField(name.to_string()))?;
            Ok(SortKey { field, descending })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIELDS: &[FieldSpec] = &[
        FieldSpec::new("name", "name", FieldKind::Text),
        FieldSpec::new("price", "price", FieldKind::Number),
        FieldSpec::new("ratingsAverage", "ratings_average", FieldKind::Number),
        FieldSpec::new("duration", "duration", FieldKind::Number),
        FieldSpec::new("secretTour", "secret_tour", FieldKind::Bool),
        FieldSpec::new("createdAt", "created_at", FieldKind::Timestamp),
    ];

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[derive(Debug, Clone)]
    struct Item {
        name: &'static str,
        price: f64,
        rating: f64,
    }

    fn value_of(item: &Item, field: &str) -> Option<FieldValue> {
        match field {
            "name" => Some(FieldValue::Text(item.name.to_string())),
            "price" => Some(FieldValue::Number(item.price)),
            "ratingsAverage" => Some(FieldValue::Number(item.rating)),
            _ => None,
        }
    }

    #[test]
    fn test_parse_defaults() {
        let query = ListQuery::parse(&[], FIELDS, "-createdAt").unwrap();
        assert!(query.filters.is_empty());
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, DEFAULT_LIMIT);
        assert_eq!(query.sort.len(), 1);
        assert_eq!(query.sort[0].field.name, "createdAt");
        assert!(query.sort[0].descending);
        assert!(query.fields.is_none());
    }

    #[test]
    fn test_parse_operators() {
        let query = ListQuery::parse(
            &pairs(&[("price[gte]", "500"), ("duration[lt]", "10"), ("name", "The Forest Hiker")]),
            FIELDS,
            "-createdAt",
        )
        .unwrap();

        assert_eq!(query.filters.len(), 3);
        assert_eq!(query.filters[0].comparison, Comparison::Gte);
        assert_eq!(query.filters[0].values, vec![FieldValue::Number(500.0)]);
        assert_eq!(query.filters[1].comparison, Comparison::Lt);
        assert_eq!(query.filters[2].values, vec![FieldValue::Text("The Forest Hiker".into())]);
    }

    #[test]
    fn test_repeated_equality_becomes_any_of() {
        let query = ListQuery::parse(
            &pairs(&[("duration", "5"), ("duration", "9")]),
            FIELDS,
            "-createdAt",
        )
        .unwrap();

        assert_eq!(query.filters.len(), 1);
        assert_eq!(
            query.filters[0].values,
            vec![FieldValue::Number(5.0), FieldValue::Number(9.0)]
        );
    }

    #[test]
    fn test_unknown_field_and_operator_rejected() {
        assert_eq!(
            ListQuery::parse(&pairs(&[("password", "x")]), FIELDS, "-createdAt"),
            Err(QueryError::UnknownField("password".into()))
        );
        assert_eq!(
            ListQuery::parse(&pairs(&[("price[ne]", "1")]), FIELDS, "-createdAt"),
            Err(QueryError::UnknownOperator("ne".into()))
        );
        assert_eq!(
            ListQuery::parse(&pairs(&[("sort", "-bogus")]), FIELDS, "-createdAt"),
            Err(QueryError::UnknownField("bogus".into()))
        );
        assert!(matches!(
            ListQuery::parse(&pairs(&[("price", "cheap")]), FIELDS, "-createdAt"),
            Err(QueryError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_pagination_and_limit_bounds() {
        let query =
            ListQuery::parse(&pairs(&[("page", "3"), ("limit", "10")]), FIELDS, "-createdAt").unwrap();
        assert_eq!(query.offset(), 20);

        let query =
            ListQuery::parse(&pairs(&[("page", "0"), ("limit", "abc")]), FIELDS, "-createdAt").unwrap();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, DEFAULT_LIMIT);

        let query = ListQuery::parse(&pairs(&[("limit", "5000")]), FIELDS, "-createdAt").unwrap();
        assert_eq!(query.limit, MAX_LIMIT);
    }

    #[test]
    fn test_apply_sorts_desc_then_asc_and_limits() {
        let items = vec![
            Item { name: "a", price: 997.0, rating: 4.8 },
            Item { name: "b", price: 397.0, rating: 4.8 },
            Item { name: "c", price: 1497.0, rating: 4.9 },
            Item { name: "d", price: 497.0, rating: 4.5 },
        ];

        let query = ListQuery::parse(
            &pairs(&[("sort", "-ratingsAverage,price"), ("limit", "3")]),
            FIELDS,
            "-createdAt",
        )
        .unwrap();
        let names: Vec<&str> = query.apply(items, value_of).iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_apply_filters() {
        let items = vec![
            Item { name: "a", price: 997.0, rating: 4.8 },
            Item { name: "b", price: 397.0, rating: 4.8 },
        ];
        let query =
            ListQuery::parse(&pairs(&[("price[lt]", "500")]), FIELDS, "name").unwrap();
        let result = query.apply(items, value_of);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "b");
    }

    #[test]
    fn test_alias_overrides_controls_and_keeps_filters() {
        let alias = AliasQuery {
            limit: 5,
            sort: "-ratingsAverage,price",
            fields: "name,price",
        };
        let mut raw = pairs(&[("limit", "50"), ("difficulty", "easy")]);
        alias.apply(&mut raw);

        assert!(raw.contains(&("difficulty".to_string(), "easy".to_string())));
        assert!(raw.contains(&("limit".to_string(), "5".to_string())));
        assert!(!raw.contains(&("limit".to_string(), "50".to_string())));
    }

    #[test]
    fn test_project_keeps_id() {
        let query = ListQuery::parse(&pairs(&[("fields", "name,price")]), FIELDS, "name").unwrap();
        let projected = query.project(json!({
            "id": "x",
            "name": "Tour",
            "price": 10,
            "summary": "hidden"
        }));
        assert_eq!(projected, json!({ "id": "x", "name": "Tour", "price": 10 }));
    }

    #[test]
    fn test_timestamp_values() {
        assert!(FieldValue::parse(FieldKind::Timestamp, "2021-06-19").is_some());
        assert!(FieldValue::parse(FieldKind::Timestamp, "2021-06-19T09:00:00Z").is_some());
        assert!(FieldValue::parse(FieldKind::Timestamp, "June").is_none());
    }
}
