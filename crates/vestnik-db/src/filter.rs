//! Request-side description of which news items to return and how to
//! order and paginate them.

/// Items per page everywhere: LIMIT, OFFSET, and the pagination envelope.
pub const PAGE_SIZE: i64 = 10;

/// News selection filter. The zero value selects everything, newest first,
/// without pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    /// Title search terms, AND-combined.
    pub title_search: Vec<String>,
    /// Terms excluded from the title search, AND-NOT-combined.
    pub exclude: Vec<String>,
    pub sort_by: SortBy,
    /// 1-based page number; values below 1 disable LIMIT/OFFSET.
    pub page: i64,
    /// Publication-date bound, or the exact date with [`TimeOp::Eq`].
    pub date: Option<TimeFilter>,
    /// Closing bound of a date range; only meaningful together with `date`
    /// and restricted to `<` / `<=` at the API boundary.
    pub end_date: Option<TimeFilter>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    #[default]
    Unset,
    Date,
    Title,
    Rank,
}

impl SortBy {
    /// Column backing the sort.
    pub(crate) fn column(self) -> &'static str {
        match self {
            SortBy::Unset | SortBy::Date => "pub_date",
            SortBy::Title => "title",
            SortBy::Rank => "rank",
        }
    }
}

/// Unix timestamp plus a comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeFilter {
    pub value: i64,
    pub op: TimeOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl TimeOp {
    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            TimeOp::Eq => "=",
            TimeOp::Lt => "<",
            TimeOp::Le => "<=",
            TimeOp::Gt => ">",
            TimeOp::Ge => ">=",
        }
    }
}

/// Render the filter's search terms as a `to_tsquery` argument:
/// terms joined by `&`, then `&!`-joined exclusions.
pub(crate) fn search_str(f: &Filter) -> String {
    let mut s = f.title_search.join("&");
    if !f.exclude.is_empty() {
        s.push_str("&!");
        s.push_str(&f.exclude.join("&!"));
    }
    s
}

/// Number of pages needed for `total` matching items.
pub fn total_pages(total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    (total + PAGE_SIZE - 1) / PAGE_SIZE
}
