//! Stream writer: drains the poller's item channel into the store in
//! deduplicated batches.

use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;
use vestnik_core::Item;

use crate::filter::PAGE_SIZE;
use crate::news::add_items;
use crate::DbError;

/// Items buffered before a flush. One page's worth keeps transactions small
/// while still amortizing round trips.
const BATCH_SIZE: usize = PAGE_SIZE as usize;

/// Deadline for the last flush after cancellation; the request context that
/// drove the pipeline is already gone by then.
const FINAL_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Consume `items` until the channel closes or `token` is cancelled,
/// inserting batches with link-based dedup inside one transaction each.
///
/// A flush happens when the buffer is full or when the channel has nothing
/// immediately available (waiting for more input would only delay writes).
/// Returns the number of items submitted for insertion.
///
/// # Errors
///
/// Returns [`DbError`] when a batch fails; the batch is not retried.
pub async fn write_to_storage(
    pool: &PgPool,
    token: CancellationToken,
    mut items: mpsc::Receiver<Item>,
) -> Result<u64, DbError> {
    let mut buf: Vec<Item> = Vec::with_capacity(BATCH_SIZE);
    let mut written: u64 = 0;

    loop {
        tokio::select! {
            () = token.cancelled() => {
                final_flush(pool, &mut buf, &mut written).await;
                return Ok(written);
            }
            maybe = items.recv() => {
                let Some(item) = maybe else {
                    flush(pool, &mut buf, &mut written).await?;
                    return Ok(written);
                };
                buf.push(item);

                // Drain whatever is already queued without blocking.
                let mut drained = false;
                while buf.len() < BATCH_SIZE {
                    match items.try_recv() {
                        Ok(item) => buf.push(item),
                        Err(TryRecvError::Empty | TryRecvError::Disconnected) => {
                            drained = true;
                            break;
                        }
                    }
                }

                if buf.len() >= BATCH_SIZE || drained {
                    flush(pool, &mut buf, &mut written).await?;
                }
            }
        }
    }
}

async fn flush(pool: &PgPool, buf: &mut Vec<Item>, written: &mut u64) -> Result<(), DbError> {
    if buf.is_empty() {
        return Ok(());
    }
    add_items(pool, buf).await?;
    *written += buf.len() as u64;
    tracing::debug!(batch = buf.len(), total = *written, "news batch written");
    buf.clear();
    Ok(())
}

/// Best-effort flush after cancellation, under its own fresh deadline.
async fn final_flush(pool: &PgPool, buf: &mut Vec<Item>, written: &mut u64) {
    match tokio::time::timeout(FINAL_FLUSH_TIMEOUT, flush(pool, buf, written)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "final news flush failed"),
        Err(_) => tracing::error!("final news flush timed out"),
    }
}
