//! News CRUD and the parameterized statement builder.
//!
//! The builder appends clauses in a fixed order (WHERE, ORDER BY, LIMIT,
//! OFFSET), numbering each placeholder as one past the count of already
//! bound arguments. Callers depend on the resulting query shape being
//! deterministic, so the order and numbering discipline must not change.

use sqlx::PgPool;
use vestnik_core::Item;

use crate::filter::{search_str, Filter, SortBy, PAGE_SIZE};
use crate::DbError;

const SELECT_ITEMS: &str = "SELECT id, title, description, pub_date, link FROM news";
const COUNT_ITEMS: &str = "SELECT COUNT(id) FROM news";

const INSERT_ITEM: &str = "INSERT INTO news(title, description, pub_date, link) \
     VALUES ($1, $2, $3, $4) ON CONFLICT (link) DO NOTHING";

#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Int(i64),
    Text(String),
}

#[derive(Debug)]
struct Statement {
    sql: String,
    args: Vec<Arg>,
}

impl Statement {
    fn new(base: &str) -> Self {
        Self {
            sql: base.to_string(),
            args: Vec::new(),
        }
    }

    fn next_placeholder(&self) -> usize {
        self.args.len() + 1
    }

    fn push_where(&mut self, f: &Filter) {
        if !f.title_search.is_empty() {
            self.sql.push_str(&format!(
                " WHERE title_search @@ to_tsquery('russian', ${})",
                self.next_placeholder()
            ));
            self.args.push(Arg::Text(search_str(f)));
        }
        if let Some(date) = f.date {
            let keyword = if self.args.is_empty() { "WHERE" } else { "AND" };
            self.sql.push_str(&format!(
                " {keyword} pub_date {} ${}",
                date.op.as_sql(),
                self.next_placeholder()
            ));
            self.args.push(Arg::Int(date.value));

            if let Some(end) = f.end_date {
                self.sql.push_str(&format!(
                    " AND pub_date {} ${}",
                    end.op.as_sql(),
                    self.next_placeholder()
                ));
                self.args.push(Arg::Int(end.value));
            }
        }
    }

    fn push_order_by(&mut self, f: &Filter) {
        match f.sort_by {
            SortBy::Rank if !f.title_search.is_empty() => {
                self.sql.push_str(&format!(
                    " ORDER BY ts_rank(title_search, to_tsquery('russian', ${})) DESC",
                    self.next_placeholder()
                ));
                self.args.push(Arg::Text(search_str(f)));
            }
            // Rank ordering without a search is meaningless (there is
            // nothing to rank against); fall back to newest-first.
            SortBy::Unset | SortBy::Rank => {
                self.sql.push_str(" ORDER BY pub_date DESC");
            }
            sort => {
                self.sql
                    .push_str(&format!(" ORDER BY {} DESC", sort.column()));
            }
        }
    }

    fn push_limit_offset(&mut self, f: &Filter) {
        if f.page < 1 {
            return;
        }
        self.sql
            .push_str(&format!(" LIMIT ${}", self.next_placeholder()));
        self.args.push(Arg::Int(PAGE_SIZE));

        let offset = (f.page - 1) * PAGE_SIZE;
        if offset > 0 {
            self.sql
                .push_str(&format!(" OFFSET ${}", self.next_placeholder()));
            self.args.push(Arg::Int(offset));
        }
    }

}

/// Items matching the filter, ordered and paginated.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn items(pool: &PgPool, filter: &Filter) -> Result<Vec<Item>, DbError> {
    let mut stmt = Statement::new(SELECT_ITEMS);
    stmt.push_where(filter);
    stmt.push_order_by(filter);
    stmt.push_limit_offset(filter);

    let mut query = sqlx::query_as::<_, Item>(&stmt.sql);
    for arg in &stmt.args {
        query = match arg {
            Arg::Int(n) => query.bind(*n),
            Arg::Text(s) => query.bind(s.as_str()),
        };
    }
    Ok(query.fetch_all(pool).await?)
}

/// Total number of items matching the filter, independent of pagination.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_items(pool: &PgPool, filter: &Filter) -> Result<i64, DbError> {
    let mut stmt = Statement::new(COUNT_ITEMS);
    stmt.push_where(filter);

    let mut query = sqlx::query_scalar::<_, i64>(&stmt.sql);
    for arg in &stmt.args {
        query = match arg {
            Arg::Int(n) => query.bind(*n),
            Arg::Text(s) => query.bind(s.as_str()),
        };
    }
    Ok(query.fetch_one(pool).await?)
}

/// One item by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] when the id is absent.
pub async fn item(pool: &PgPool, id: i64) -> Result<Item, DbError> {
    sqlx::query_as::<_, Item>(&format!("{SELECT_ITEMS} WHERE id = $1"))
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(not_found)
}

/// One item by its link (the dedup key).
///
/// # Errors
///
/// Returns [`DbError::NotFound`] when the link is absent.
pub async fn item_by_link(pool: &PgPool, link: &str) -> Result<Item, DbError> {
    sqlx::query_as::<_, Item>(&format!("{SELECT_ITEMS} WHERE link = $1"))
        .bind(link)
        .fetch_one(pool)
        .await
        .map_err(not_found)
}

/// Insert a batch of items inside a single transaction. Items whose link is
/// already stored are dropped by `ON CONFLICT (link) DO NOTHING`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; the whole batch is
/// rolled back.
pub async fn add_items(pool: &PgPool, items: &[Item]) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;
    for item in items {
        sqlx::query(INSERT_ITEM)
            .bind(&item.title)
            .bind(&item.description)
            .bind(item.pub_date)
            .bind(&item.link)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

fn not_found(e: sqlx::Error) -> DbError {
    match e {
        sqlx::Error::RowNotFound => DbError::NotFound,
        e => DbError::Sqlx(e),
    }
}
