// Row filter builder.
//
// Renders column filters, ordering, and limits into the query-string
// form the row API expects (`user_id=eq.<uuid>&order=created_at.desc`).

use std::fmt::Display;

/// Sort direction for [`Query::order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// A row selection: filters plus optional projection, ordering and limit.
///
/// Filters are ANDed. An empty query matches every row visible to the
/// caller, so mutating calls (`update`, `delete`) should always carry
/// at least one filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column projection, including embedded resources
    /// (e.g. `"*,smart_home_platforms(platform_name)"`).
    pub fn select(self, columns: &str) -> Self {
        self.set("select", columns.to_owned())
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.push(column, format!("eq.{value}"))
    }

    pub fn neq(self, column: &str, value: impl Display) -> Self {
        self.push(column, format!("neq.{value}"))
    }

    pub fn lt(self, column: &str, value: impl Display) -> Self {
        self.push(column, format!("lt.{value}"))
    }

    /// `column IN (values…)`.
    pub fn in_list<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Display,
    {
        let joined = join(values);
        self.push(column, format!("in.({joined})"))
    }

    /// `column NOT IN (values…)`.
    pub fn not_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Display,
    {
        let joined = join(values);
        self.push(column, format!("not.in.({joined})"))
    }

    pub fn order(self, column: &str, order: Order) -> Self {
        self.set("order", format!("{column}.{}", order.as_str()))
    }

    pub fn limit(self, limit: usize) -> Self {
        self.set("limit", limit.to_string())
    }

    /// Whether any column filter (as opposed to select/order/limit) is present.
    pub fn has_filter(&self) -> bool {
        self.params
            .iter()
            .any(|(k, _)| !matches!(k.as_str(), "select" | "order" | "limit"))
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    fn push(mut self, key: &str, value: String) -> Self {
        self.params.push((key.to_owned(), value));
        self
    }

    fn set(mut self, key: &str, value: String) -> Self {
        self.params.retain(|(k, _)| k != key);
        self.params.push((key.to_owned(), value));
        self
    }
}

fn join<I, V>(values: I) -> String
where
    I: IntoIterator<Item = V>,
    V: Display,
{
    values
        .into_iter()
        .map(|v| quote_list_item(&v.to_string()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Double-quote list items containing characters reserved by the filter
/// grammar.
fn quote_list_item(raw: &str) -> String {
    if raw.is_empty() || raw.contains([',', '(', ')', '"', '\\', ':', ' ']) {
        let escaped = raw.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    } else {
        raw.to_owned()
    }
}
