//! API route handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::analysis;
use crate::archive::{ArchivedRace, SnapshotArchive};
use crate::config::{AppConfig, PartialPolicy};
use crate::extractor::Extractor;
use crate::scoring;
use crate::store::SnapshotStore;
use crate::types::{
    ArchiveResponse, ErrorResponse, ExtractRequest, ExtractResponse, HealthResponse, RaceKey,
    RaceSnapshot, SnapshotRequest, SnapshotResponse,
};

/// Most races on one Hong Kong meeting day
pub const MAX_RACES_PER_DAY: u8 = 14;

/// Application state shared across handlers.
pub struct AppState {
    pub config: AppConfig,
    pub extractor: Extractor,
    pub store: Mutex<SnapshotStore>,
    pub archive: SnapshotArchive,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            extractor: config.extractor(),
            archive: SnapshotArchive::new(&config.archive.path),
            store: Mutex::new(SnapshotStore::init()),
            config,
        }
    }
}

/// Error type for API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.status.to_string(),
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

fn check_race_number(race_no: u8) -> Result<(), ApiError> {
    if race_no == 0 || race_no > MAX_RACES_PER_DAY {
        return Err(ApiError::bad_request(format!(
            "race number must be 1-{}, got {}",
            MAX_RACES_PER_DAY, race_no
        )));
    }
    Ok(())
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Paste-box extraction without storing anything.
pub async fn extract(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExtractRequest>,
) -> Json<ExtractResponse> {
    let extraction = state.extractor.extract(&req.raw, req.hint);
    tracing::debug!("extract: {:?}", extraction.log);
    Json(ExtractResponse {
        partial: extraction.is_partial(state.config.extract.min_rows),
        records: extraction.records,
        strategy: extraction.strategy,
        log: extraction.log,
    })
}

/// Extract a pasted race card or odds page and store it as the race's
/// current snapshot.
pub async fn submit_snapshot(
    State(state): State<Arc<AppState>>,
    Path(race_no): Path<u8>,
    Json(req): Json<SnapshotRequest>,
) -> Result<Json<SnapshotResponse>, ApiError> {
    check_race_number(race_no)?;
    let date = req.date.unwrap_or_else(|| RaceKey::today(race_no).date);
    let key = RaceKey::new(date, race_no);

    let extraction = state.extractor.extract(&req.raw, req.hint);
    if extraction.is_empty() {
        let reason = extraction.log.last().cloned().unwrap_or_default();
        return Err(ApiError::unprocessable(format!(
            "no records extracted for {}: {}",
            key, reason
        )));
    }

    let min_rows = state.config.extract.min_rows;
    let mut warning = None;
    let mut stored = true;
    if extraction.is_partial(min_rows) {
        let message = format!(
            "only {} records (expected at least {})",
            extraction.records.len(),
            min_rows
        );
        tracing::warn!("{}: {}", key, message);
        if state.config.extract.partial_policy == PartialPolicy::Discard {
            stored = false;
        }
        warning = Some(message);
    }

    let mut snapshot = RaceSnapshot::new(key, extraction.records);
    snapshot.raw_inputs.push(req.raw);
    snapshot.source = Some("paste".to_string());

    let mut store = state.store.lock().await;
    let previous = if stored {
        store.put(snapshot.clone())
    } else {
        store.get(&key).cloned()
    };
    drop(store);

    let (movements, simulated) = match previous.as_ref() {
        Some(p) => (analysis::compare(&p.records, &snapshot.records), false),
        None => {
            let pct = state.config.analysis.simulate_pct;
            let earlier = analysis::simulate_previous(&snapshot.records, pct);
            (analysis::compare(&earlier, &snapshot.records), true)
        }
    };
    let signals = analysis::signals(&movements, &state.config.analysis);
    let scored = scoring::rank(
        &snapshot.records,
        state.extractor.roster(),
        &state.config.scoring,
    );

    tracing::info!(
        "{}: {} records, stored={}, simulated={}, {} signals",
        key,
        snapshot.records.len(),
        stored,
        simulated,
        signals.len()
    );

    Ok(Json(SnapshotResponse {
        key,
        stored,
        warning,
        scored,
        movements,
        simulated,
        signals,
        log: extraction.log,
    }))
}

/// Current snapshot of one race.
pub async fn get_race(
    State(state): State<Arc<AppState>>,
    Path((date, race_no)): Path<(NaiveDate, u8)>,
) -> Result<Json<RaceSnapshot>, ApiError> {
    let key = RaceKey::new(date, race_no);
    let store = state.store.lock().await;
    store
        .get(&key)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no snapshot for {}", key)))
}

/// Write the store's snapshots of one day to the archive file.
pub async fn archive_day(
    State(state): State<Arc<AppState>>,
    Path(date): Path<NaiveDate>,
) -> Result<Json<ArchiveResponse>, ApiError> {
    let snapshots: Vec<RaceSnapshot> = {
        let store = state.store.lock().await;
        store.snapshots_on(date).into_iter().cloned().collect()
    };
    if snapshots.is_empty() {
        return Err(ApiError::not_found(format!("no snapshots for {}", date)));
    }

    let archived = state
        .archive
        .archive_day(date, &snapshots)
        .map_err(|e| ApiError::internal(format!("Archive failed: {:#}", e)))?;

    Ok(Json(ArchiveResponse {
        date,
        archived,
        path: state.archive.path().display().to_string(),
    }))
}

/// Archived races of one day.
pub async fn get_archive(
    State(state): State<Arc<AppState>>,
    Path(date): Path<NaiveDate>,
) -> Result<Json<BTreeMap<u8, ArchivedRace>>, ApiError> {
    let day = state
        .archive
        .day(date)
        .map_err(|e| ApiError::internal(format!("Archive read failed: {:#}", e)))?;
    if day.is_empty() {
        return Err(ApiError::not_found(format!("nothing archived for {}", date)));
    }
    Ok(Json(day))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::InputHint;
    use crate::types::{DropSignal, WinOdds};

    fn state_in(dir: &std::path::Path) -> Arc<AppState> {
        let mut config = AppConfig::default();
        config.archive.path = dir.join("history.json").display().to_string();
        Arc::new(AppState::new(config))
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 2).unwrap()
    }

    fn card(odds: [&str; 5]) -> String {
        let names = ["浪漫勇士", "金鎗六十", "好馬", "快馬", "步步友"];
        names
            .iter()
            .zip(odds)
            .enumerate()
            .map(|(i, (name, o))| format!("{} {} {}\n", i + 1, name, o))
            .collect()
    }

    fn submit(raw: String) -> SnapshotRequest {
        SnapshotRequest {
            raw,
            hint: InputHint::FreeText,
            date: Some(day()),
        }
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body.status, "ok");
    }

    #[tokio::test]
    async fn test_extract_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let req = ExtractRequest {
            raw: "3 好馬 4.4".to_string(),
            hint: InputHint::FreeText,
        };
        let Json(body) = extract(State(state_in(dir.path())), Json(req)).await;
        assert_eq!(body.records.len(), 1);
        assert!(body.partial);
        assert!(body.strategy.is_some());
    }

    #[tokio::test]
    async fn test_snapshot_flow_signals_drop() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());

        let Json(first) = submit_snapshot(
            State(state.clone()),
            Path(1),
            Json(submit(card(["12.0", "6.0", "3.0", "20.0", "8.0"]))),
        )
        .await
        .unwrap();
        assert!(first.stored);
        assert!(first.warning.is_none());
        assert!(first.simulated);
        assert_eq!(first.movements.len(), 5);
        let flagged: Vec<u8> = first
            .signals
            .iter()
            .map(|s| s.movement.horse_number)
            .collect();
        assert_eq!(flagged, vec![2, 3, 5]);
        assert!(first.signals.iter().all(|s| s.signal == DropSignal::Normal));

        let Json(second) = submit_snapshot(
            State(state.clone()),
            Path(1),
            Json(submit(card(["9.0", "5.0", "2.9", "15.0", "SCR"]))),
        )
        .await
        .unwrap();
        assert!(!second.simulated);
        assert_eq!(second.movements.len(), 4);
        let classes: Vec<(u8, DropSignal)> = second
            .signals
            .iter()
            .map(|s| (s.movement.horse_number, s.signal))
            .collect();
        assert_eq!(classes, vec![(1, DropSignal::Strong), (2, DropSignal::Normal)]);
        assert_eq!(second.scored.last().unwrap().score, None);

        let Json(current) = get_race(State(state.clone()), Path((day(), 1))).await.unwrap();
        assert_eq!(current.records[4].win_odds, WinOdds::Scratched);
    }

    #[tokio::test]
    async fn test_partial_policy_discard() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.archive.path = dir.path().join("history.json").display().to_string();
        config.extract.partial_policy = PartialPolicy::Discard;
        let state = Arc::new(AppState::new(config));

        let Json(body) = submit_snapshot(
            State(state.clone()),
            Path(2),
            Json(submit("3 好馬 4.4".to_string())),
        )
        .await
        .unwrap();
        assert!(!body.stored);
        assert!(body.warning.is_some());
        assert!(body.simulated);
        assert!(get_race(State(state), Path((day(), 2))).await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());

        let err = submit_snapshot(
            State(state.clone()),
            Path(15),
            Json(submit(card(["2.0"; 5]))),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = submit_snapshot(
            State(state),
            Path(1),
            Json(submit("nothing here".to_string())),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.message.contains("no anchor token found"));
    }

    #[tokio::test]
    async fn test_archive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());

        assert!(archive_day(State(state.clone()), Path(day())).await.is_err());

        submit_snapshot(State(state.clone()), Path(3), Json(submit(card(["2.0"; 5]))))
            .await
            .unwrap();
        let Json(done) = archive_day(State(state.clone()), Path(day())).await.unwrap();
        assert_eq!(done.archived, 1);

        let Json(races) = get_archive(State(state), Path(day())).await.unwrap();
        assert_eq!(races[&3].records.len(), 5);
    }
}
