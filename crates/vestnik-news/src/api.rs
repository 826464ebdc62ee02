//! News REST API: paginated filtered listing and reads by id.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;

use vestnik_core::Item;
use vestnik_db::{total_pages, DbError, Filter, SortBy, TimeFilter, TimeOp, PAGE_SIZE};
use vestnik_http::{access_log, request_id, ApiError, RequestId};

const DATE_LAYOUT: &str = "%Y-%m-%d";

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
}

/// Pagination envelope wrapping every news listing.
#[derive(Debug, Serialize)]
struct Pagination {
    total_pages: i64,
    page_size: i64,
    page_number: i64,
    page: Vec<Item>,
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/news", get(items_handler))
        .route("/news/{id}", get(item_handler))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(access_log))
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn items_handler(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let filter = parse_filter(&params)?;

    let (total, items) = tokio::try_join!(
        vestnik_db::count_items(&state.pool, &filter),
        vestnik_db::items(&state.pool, &filter),
    )
    .map_err(|e| map_db_error(&req_id, e))?;

    let status = if items.is_empty() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::OK
    };
    let envelope = Pagination {
        total_pages: total_pages(total),
        page_size: PAGE_SIZE,
        page_number: filter.page,
        page: items,
    };
    Ok((status, Json(envelope)).into_response())
}

async fn item_handler(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<Item>, ApiError> {
    let item = vestnik_db::item(&state.pool, id)
        .await
        .map_err(|e| map_db_error(&req_id, e))?;
    Ok(Json(item))
}

fn map_db_error(req_id: &RequestId, e: DbError) -> ApiError {
    match e {
        DbError::NotFound => ApiError::NotFound,
        e => ApiError::internal(req_id, e),
    }
}

/// Turn the raw query pairs into a [`Filter`].
///
/// Recognized parameters: `page`, `sortBy`, `date`, `dateEnd`, `s` (repeated
/// search terms), `exc` (repeated exclusions). Unknown parameters are
/// ignored so `request-id` and friends pass through proxies unharmed.
fn parse_filter(params: &[(String, String)]) -> Result<Filter, ApiError> {
    let mut filter = Filter {
        page: 1,
        ..Filter::default()
    };
    let mut date_end: Option<&str> = None;

    for (key, value) in params {
        match key.as_str() {
            "page" => {
                filter.page = value.parse().map_err(|_| {
                    ApiError::bad_request("bad \"page\" parameter: must be: page=NUM")
                })?;
            }
            "sortBy" => filter.sort_by = parse_sort(value)?,
            "date" => filter.date = Some(parse_time_filter(value, "date")?),
            "dateEnd" => date_end = Some(value),
            "s" => filter.title_search.push(value.clone()),
            "exc" => filter.exclude.push(value.clone()),
            _ => {}
        }
    }

    if let Some(raw) = date_end {
        let tf = parse_time_filter(raw, "dateEnd")?;
        if !matches!(tf.op, TimeOp::Lt | TimeOp::Le) {
            return Err(ApiError::bad_request(
                "bad \"dateEnd\" parameter: only 'lt:' or 'lte:' is allowed",
            ));
        }
        if filter.date.is_none() {
            return Err(ApiError::bad_request(
                "bad \"dateEnd\" parameter: you can't use it alone without \"date\", \
                 if you want to search by date use just date=[lte:gte:]YYYY-MM-DD",
            ));
        }
        filter.end_date = Some(tf);
    }

    Ok(filter)
}

fn parse_sort(raw: &str) -> Result<SortBy, ApiError> {
    match raw {
        "" => Ok(SortBy::Unset),
        "date" => Ok(SortBy::Date),
        "title" => Ok(SortBy::Title),
        "match" => Ok(SortBy::Rank),
        _ => Err(ApiError::bad_request(
            "bad \"sortBy\" parameter, must be either: 'date', 'title' or 'match'",
        )),
    }
}

/// Parse `[gte:|lte:|gt:|lt:]YYYY-MM-DD`; no prefix means exact match.
fn parse_time_filter(raw: &str, param: &str) -> Result<TimeFilter, ApiError> {
    let (op, date_part) = match raw.split_once(':') {
        Some(("gte", rest)) => (TimeOp::Ge, rest),
        Some(("lte", rest)) => (TimeOp::Le, rest),
        Some(("gt", rest)) => (TimeOp::Gt, rest),
        Some(("lt", rest)) => (TimeOp::Lt, rest),
        _ => (TimeOp::Eq, raw),
    };

    let date = NaiveDate::parse_from_str(date_part, DATE_LAYOUT).map_err(|_| {
        ApiError::bad_request(format!(
            "bad {param:?} parameter: must be of the form: YYYY-MM-DD"
        ))
    })?;

    Ok(TimeFilter {
        value: date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp(),
        op,
    })
}
