//! Table query description, rendered as PostgREST query parameters.

use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Equality filter on a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    pub column: String,
    pub order: SortOrder,
}

/// Rows of a named table narrowed by `eq` filters and an optional sort.
///
/// ```ignore
/// let query = TableQuery::new("schedules")
///     .eq("user_id", user.id)
///     .order("start_time", SortOrder::Ascending);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    pub table: String,
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Option<Ordering>,
}

impl TableQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: "*".to_string(),
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Display) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            value: value.to_string(),
        });
        self
    }

    pub fn order(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order = Some(Ordering {
            column: column.into(),
            order,
        });
        self
    }

    /// Value of the `eq` filter on `column`, if any.
    pub fn filter_value(&self, column: &str) -> Option<&str> {
        self.filters
            .iter()
            .find(|f| f.column == column)
            .map(|f| f.value.as_str())
    }

    /// Filter parameters only, as sent with `PATCH` and `DELETE`.
    pub fn filter_pairs(&self) -> Vec<(String, String)> {
        self.filters
            .iter()
            .map(|f| (f.column.clone(), format!("eq.{}", f.value)))
            .collect()
    }

    /// Full parameter list for a `GET`.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.columns.clone())];
        pairs.extend(self.filter_pairs());

        if let Some(ordering) = &self.order {
            let direction = match ordering.order {
                SortOrder::Ascending => "asc",
                SortOrder::Descending => "desc",
            };
            pairs.push((
                "order".to_string(),
                format!("{}.{}", ordering.column, direction),
            ));
        }

        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_pairs() {
        let query = TableQuery::new("schedules")
            .eq("user_id", "abc")
            .order("start_time", SortOrder::Ascending);

        assert_eq!(
            query.query_pairs(),
            vec![
                ("select".to_string(), "*".to_string()),
                ("user_id".to_string(), "eq.abc".to_string()),
                ("order".to_string(), "start_time.asc".to_string()),
            ]
        );
        assert_eq!(query.filter_value("user_id"), Some("abc"));
        assert_eq!(query.filter_value("id"), None);
    }

    #[test]
    fn test_filter_pairs_skip_select_and_order() {
        let query = TableQuery::new("schedules")
            .select("id,title")
            .eq("id", 7)
            .order("title", SortOrder::Descending);

        assert_eq!(
            query.filter_pairs(),
            vec![("id".to_string(), "eq.7".to_string())]
        );
        assert_eq!(query.query_pairs().last().unwrap().1, "title.desc");
    }
}
