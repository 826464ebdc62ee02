//! Integration tests against a live Postgres news store.
//!
//! Ignored by default: run with a reachable `DATABASE_URL` and
//! `cargo test -p vestnik-db -- --ignored`.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vestnik_core::Item;
use vestnik_db::{Filter, SortBy, TimeFilter, TimeOp};

fn fixture_items() -> Vec<Item> {
    vec![
        Item {
            id: 1,
            title: "Заголовок 1; go go go go".to_string(),
            description: "Описание 1".to_string(),
            pub_date: 1_659_603_700,
            link: "https://test.com/14987527".to_string(),
        },
        Item {
            id: 2,
            title: "Заголовок 2; база данных база данных база данных go go".to_string(),
            description: "Описание 2".to_string(),
            pub_date: 1_659_517_300,
            link: "https://test.com/14987528".to_string(),
        },
        Item {
            id: 3,
            title: "Заголовок 3; голэнг go".to_string(),
            description: "Описание 3".to_string(),
            pub_date: 1_659_430_900,
            link: "https://test.com/14987529".to_string(),
        },
        Item {
            id: 4,
            title: "Заголовок 4; индепотентность".to_string(),
            description: "Описание 4".to_string(),
            pub_date: 1_659_344_500,
            link: "https://test.com/149875210".to_string(),
        },
    ]
}

async fn seed(pool: &sqlx::PgPool) -> Vec<Item> {
    let items = fixture_items();
    vestnik_db::add_items(pool, &items).await.expect("seed");
    items
}

#[sqlx::test(migrations = "../../migrations/news")]
#[ignore = "needs a live Postgres instance (DATABASE_URL)"]
async fn add_items_then_read_back_newest_first(pool: sqlx::PgPool) {
    let want = seed(&pool).await;

    let got = vestnik_db::items(
        &pool,
        &Filter {
            page: 1,
            ..Filter::default()
        },
    )
    .await
    .expect("items");

    assert_eq!(got, want, "default order must be pub_date DESC");
}

#[sqlx::test(migrations = "../../migrations/news")]
#[ignore = "needs a live Postgres instance (DATABASE_URL)"]
async fn item_and_item_by_link_round_trip(pool: sqlx::PgPool) {
    let want = seed(&pool).await;

    let by_link = vestnik_db::item_by_link(&pool, &want[0].link)
        .await
        .expect("item_by_link");
    assert_eq!(by_link, want[0]);

    let by_id = vestnik_db::item(&pool, by_link.id).await.expect("item");
    assert_eq!(by_id, want[0]);

    let missing = vestnik_db::item(&pool, 100_500).await;
    assert!(matches!(missing, Err(vestnik_db::DbError::NotFound)));
}

#[sqlx::test(migrations = "../../migrations/news")]
#[ignore = "needs a live Postgres instance (DATABASE_URL)"]
async fn title_search_is_and_combined(pool: sqlx::PgPool) {
    let want = seed(&pool).await;

    let got = vestnik_db::items(
        &pool,
        &Filter {
            title_search: vec!["голэнг".to_string(), "go".to_string()],
            ..Filter::default()
        },
    )
    .await
    .expect("items");

    assert_eq!(got, vec![want[2].clone()]);
}

#[sqlx::test(migrations = "../../migrations/news")]
#[ignore = "needs a live Postgres instance (DATABASE_URL)"]
async fn title_search_with_exclusion(pool: sqlx::PgPool) {
    let want = seed(&pool).await;

    let got = vestnik_db::items(
        &pool,
        &Filter {
            title_search: vec!["go".to_string()],
            exclude: vec!["голэнг".to_string()],
            ..Filter::default()
        },
    )
    .await
    .expect("items");

    assert_eq!(got, vec![want[0].clone(), want[1].clone()]);
}

#[sqlx::test(migrations = "../../migrations/news")]
#[ignore = "needs a live Postgres instance (DATABASE_URL)"]
async fn date_filters(pool: sqlx::PgPool) {
    let want = seed(&pool).await;

    let exact = vestnik_db::items(
        &pool,
        &Filter {
            date: Some(TimeFilter {
                value: 1_659_344_500,
                op: TimeOp::Eq,
            }),
            ..Filter::default()
        },
    )
    .await
    .expect("items");
    assert_eq!(exact, vec![want[3].clone()]);

    let since = vestnik_db::items(
        &pool,
        &Filter {
            date: Some(TimeFilter {
                value: 1_659_344_500,
                op: TimeOp::Ge,
            }),
            ..Filter::default()
        },
    )
    .await
    .expect("items");
    assert_eq!(since.len(), 4);

    let range = vestnik_db::items(
        &pool,
        &Filter {
            date: Some(TimeFilter {
                value: 1_659_344_500,
                op: TimeOp::Gt,
            }),
            end_date: Some(TimeFilter {
                value: 1_659_517_300,
                op: TimeOp::Le,
            }),
            ..Filter::default()
        },
    )
    .await
    .expect("items");
    assert_eq!(range, vec![want[1].clone(), want[2].clone()]);
}

#[sqlx::test(migrations = "../../migrations/news")]
#[ignore = "needs a live Postgres instance (DATABASE_URL)"]
async fn rank_sort_orders_by_match_count(pool: sqlx::PgPool) {
    let want = seed(&pool).await;

    let got = vestnik_db::items(
        &pool,
        &Filter {
            title_search: vec!["go".to_string()],
            sort_by: SortBy::Rank,
            page: 1,
            ..Filter::default()
        },
    )
    .await
    .expect("items");

    assert_eq!(
        got,
        vec![want[0].clone(), want[1].clone(), want[2].clone()],
        "ts_rank must order by decreasing match weight"
    );
}

#[sqlx::test(migrations = "../../migrations/news")]
#[ignore = "needs a live Postgres instance (DATABASE_URL)"]
async fn count_matches_sum_of_pages(pool: sqlx::PgPool) {
    seed(&pool).await;

    let filter = Filter::default();
    let total = vestnik_db::count_items(&pool, &filter).await.expect("count");
    assert_eq!(total, 4);

    let mut seen = 0;
    for page in 1..=vestnik_db::total_pages(total) {
        let got = vestnik_db::items(
            &pool,
            &Filter {
                page,
                ..Filter::default()
            },
        )
        .await
        .expect("items");
        assert!(got.len() as i64 <= vestnik_db::PAGE_SIZE);
        seen += got.len() as i64;
    }
    assert_eq!(seen, total);
}

#[sqlx::test(migrations = "../../migrations/news")]
#[ignore = "needs a live Postgres instance (DATABASE_URL)"]
async fn stream_writer_dedupes_on_link(pool: sqlx::PgPool) {
    let (tx, rx) = tokio::sync::mpsc::channel(16);
    let token = CancellationToken::new();

    let writer = tokio::spawn({
        let pool = pool.clone();
        let token = token.clone();
        async move { vestnik_db::write_to_storage(&pool, token, rx).await }
    });

    for item in seedless_duplicates() {
        tx.send(item).await.expect("send");
    }
    drop(tx);

    let written = tokio::time::timeout(Duration::from_secs(10), writer)
        .await
        .expect("writer must finish")
        .expect("join")
        .expect("write_to_storage");
    assert_eq!(written, 4, "all submissions count, duplicates included");

    let total = vestnik_db::count_items(&pool, &Filter::default())
        .await
        .expect("count");
    assert_eq!(total, 2, "storage keeps one row per link");
}

fn seedless_duplicates() -> Vec<Item> {
    let a = Item {
        id: 0,
        title: "повтор".to_string(),
        description: String::new(),
        pub_date: 1,
        link: "https://test.com/dup-1".to_string(),
    };
    let b = Item {
        link: "https://test.com/dup-2".to_string(),
        ..a.clone()
    };
    vec![a.clone(), b.clone(), a, b]
}
