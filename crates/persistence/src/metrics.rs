//! Store query and pool metrics.

use metrics::{counter, gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

/// How a timed store call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    Ok,
    Error,
}

impl QueryOutcome {
    pub fn of<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            QueryOutcome::Ok
        } else {
            QueryOutcome::Error
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryOutcome::Ok => "ok",
            QueryOutcome::Error => "error",
        }
    }
}

fn record_store_query(query: &'static str, outcome: QueryOutcome, duration_secs: f64) {
    histogram!(
        "santa_store_query_duration_seconds",
        "query" => query,
        "outcome" => outcome.as_str()
    )
    .record(duration_secs);

    if outcome == QueryOutcome::Error {
        counter!("santa_store_query_errors_total", "query" => query).increment(1);
    }
}

/// Samples pool occupancy. Called on an interval from the binary.
pub fn record_pool_metrics(pool: &PgPool) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();

    gauge!("santa_db_connections_active").set(size.saturating_sub(idle) as f64);
    gauge!("santa_db_connections_idle").set(idle as f64);
    gauge!("santa_db_connections_total").set(size as f64);
}

/// Times one store call. The sample is written when the timer is dropped.
///
/// A timer dropped before [`QueryTimer::record`] or [`QueryTimer::observe`]
/// counts as an error, so transactional calls that bail out with `?` are
/// still reported.
///
/// ```ignore
/// let timer = QueryTimer::new("find_group_by_id");
/// let result = sqlx::query_as::<_, GroupEntity>(...).fetch_optional(&pool).await;
/// timer.observe(&result);
/// ```
pub struct QueryTimer {
    query: &'static str,
    start: Instant,
    outcome: Option<QueryOutcome>,
}

impl QueryTimer {
    pub fn new(query: &'static str) -> Self {
        Self {
            query,
            start: Instant::now(),
            outcome: None,
        }
    }

    /// Marks the call as successful.
    pub fn record(mut self) {
        self.outcome = Some(QueryOutcome::Ok);
    }

    /// Takes the outcome from a single statement's result.
    pub fn observe<T, E>(mut self, result: &Result<T, E>) {
        self.outcome = Some(QueryOutcome::of(result));
    }

    fn outcome(&self) -> QueryOutcome {
        self.outcome.unwrap_or(QueryOutcome::Error)
    }
}

impl Drop for QueryTimer {
    fn drop(&mut self) {
        record_store_query(
            self.query,
            self.outcome(),
            self.start.elapsed().as_secs_f64(),
        );
    }
}
