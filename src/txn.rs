//! Transactional commit helper.
//!
//! Every mutating operation runs its validate-and-write sequence inside a
//! single `BEGIN IMMEDIATE` transaction, so the checks are evaluated
//! against the snapshot that the commit applies to. SQLITE_BUSY from a
//! competing writer is retried with linear backoff up to
//! `config::COMMIT_RETRY_LIMIT` attempts, then surfaced as
//! `CoreError::Concurrency`. A failed attempt rolls back and writes
//! nothing.

use std::thread;

use rusqlite::{Connection, TransactionBehavior};
use tracing;

use crate::config;
use crate::error::CoreError;

fn sqlite_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if matches!(
            e.code,
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
        )
    )
}

fn busy(err: &CoreError) -> bool {
    match err {
        CoreError::Storage(db) | CoreError::AuditUnavailable(db) => db.is_busy(),
        _ => false,
    }
}

/// Run `op` inside an immediate transaction, retrying on lock contention.
pub fn immediate<T>(
    conn: &mut Connection,
    mut op: impl FnMut(&Connection) -> Result<T, CoreError>,
) -> Result<T, CoreError> {
    for attempt in 1..=config::COMMIT_RETRY_LIMIT {
        let tx = match conn.transaction_with_behavior(TransactionBehavior::Immediate) {
            Ok(tx) => tx,
            Err(e) if sqlite_busy(&e) => {
                if attempt == config::COMMIT_RETRY_LIMIT {
                    return Err(CoreError::Concurrency { attempts: attempt });
                }
                tracing::debug!(attempt, "Database busy acquiring write lock, retrying");
                thread::sleep(config::COMMIT_RETRY_BACKOFF * attempt);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        match op(&tx) {
            Ok(value) => match tx.commit() {
                Ok(()) => return Ok(value),
                Err(e) if sqlite_busy(&e) => {
                    if attempt == config::COMMIT_RETRY_LIMIT {
                        return Err(CoreError::Concurrency { attempts: attempt });
                    }
                    tracing::debug!(attempt, "Database busy at commit, retrying");
                    thread::sleep(config::COMMIT_RETRY_BACKOFF * attempt);
                }
                Err(e) => return Err(e.into()),
            },
            Err(err) if busy(&err) => {
                drop(tx); // roll back before waiting
                if attempt == config::COMMIT_RETRY_LIMIT {
                    return Err(CoreError::Concurrency { attempts: attempt });
                }
                tracing::debug!(attempt, "Database busy mid-transaction, retrying");
                thread::sleep(config::COMMIT_RETRY_BACKOFF * attempt);
            }
            Err(err) => return Err(err),
        }
    }

    Err(CoreError::Concurrency {
        attempts: config::COMMIT_RETRY_LIMIT,
    })
}
