//! services/api/src/web/middleware.rs
//!
//! Request-id tagging and the per-caller daily question quota.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use forum_answers_core::ports::{Clock, PortError};
use std::{collections::HashMap, net::SocketAddr, sync::Arc, sync::Mutex};
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use crate::{error::ApiError, web::state::AppState};

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
/// Quota key for requests served without connection info.
const UNKNOWN_PEER: &str = "unknown";

//=========================================================================================
// Request Id
//=========================================================================================

/// Runs the request inside a span carrying a fresh request id and echoes the
/// id back in `x-request-id`.
pub async fn tag_request_id(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path()
    );

    let mut response = next.run(req).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

//=========================================================================================
// Daily Question Quota
//=========================================================================================

#[derive(Debug, Clone, Copy)]
struct DayCount {
    day: NaiveDate,
    used: u32,
}

/// Counts answered questions per caller and UTC day.
///
/// Only the current day's counters are kept. A limit of zero disables the quota.
pub struct DailyQuota {
    limit: u32,
    clock: Arc<dyn Clock>,
    counters: Mutex<HashMap<String, DayCount>>,
}

impl DailyQuota {
    pub fn new(limit: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            limit,
            clock,
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Questions `caller` may still ask today.
    pub fn remaining(&self, caller: &str) -> u32 {
        let today = self.clock.now().date_naive();
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        let used = counters
            .get(caller)
            .filter(|count| count.day == today)
            .map_or(0, |count| count.used);
        self.limit.saturating_sub(used)
    }

    pub fn is_exhausted(&self, caller: &str) -> bool {
        self.limit > 0 && self.remaining(caller) == 0
    }

    /// Records one answered question and drops counters from earlier days.
    pub fn record(&self, caller: &str) {
        if self.limit == 0 {
            return;
        }
        let today = self.clock.now().date_naive();
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        counters.retain(|_, count| count.day == today);
        counters
            .entry(caller.to_string())
            .or_insert(DayCount { day: today, used: 0 })
            .used += 1;
    }
}

/// Rejects callers that have used up today's questions. Callers are keyed by
/// peer IP address. Only successful answers count against the quota.
pub async fn enforce_daily_quota(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let caller = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_PEER.to_string());

    if state.quota.is_exhausted(&caller) {
        warn!("Caller '{}' exceeded the daily question limit", caller);
        return ApiError::from(PortError::RateLimited(format!(
            "daily limit of {} questions reached, try again tomorrow",
            state.quota.limit()
        )))
        .into_response();
    }

    let response = next.run(req).await;
    if response.status().is_success() {
        state.quota.record(&caller);
    }
    response
}
