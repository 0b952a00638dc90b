// Mapper to convert dashboard snapshots to JSON views for the chart client
use crate::domain::dashboard::{AuthState, DashboardSnapshot, LoadState};
use crate::domain::reading::{Reading, TankId};
use crate::domain::tank::{TankBucket, TankSummary};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub load_state: &'static str,
    /// Literal error text while `load_state` is `error`
    pub error: Option<String>,
    pub authorized: bool,
    pub tanks: Vec<TankView>,
}

#[derive(Debug, Serialize)]
pub struct TankView {
    pub tank: TankId,
    pub readings: Vec<ReadingView>,
    /// `None` for a tank without readings
    pub summary: Option<SummaryView>,
}

#[derive(Debug, Serialize)]
pub struct ReadingView {
    /// Position in the series, used as the chart's x value
    pub x: usize,
    pub temp: Option<f64>,
    pub timestamp: i64,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryView {
    pub last: ReadingView,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub average: Option<f64>,
}

pub fn dashboard_to_view(snapshot: &DashboardSnapshot) -> DashboardView {
    let error = match &snapshot.load_state {
        LoadState::Error(msg) => Some(msg.clone()),
        _ => None,
    };

    DashboardView {
        load_state: snapshot.load_state.label(),
        error,
        authorized: snapshot.auth_state == AuthState::Authenticated,
        tanks: snapshot.tanks.iter().map(tank_to_view).collect(),
    }
}

fn tank_to_view(bucket: &TankBucket) -> TankView {
    let readings = bucket
        .readings
        .iter()
        .enumerate()
        .map(|(x, r)| reading_to_view(x, r))
        .collect();

    // An empty bucket renders as a placeholder, not as a load failure
    let summary = bucket
        .summarize()
        .ok()
        .map(|s| summary_to_view(bucket.len() - 1, s));

    TankView {
        tank: bucket.tank,
        readings,
        summary,
    }
}

fn reading_to_view(x: usize, reading: &Reading) -> ReadingView {
    ReadingView {
        x,
        temp: finite(reading.temp),
        timestamp: reading.timestamp,
        date: reading.date.clone(),
        time: reading.time.clone(),
    }
}

fn summary_to_view(last_index: usize, summary: TankSummary) -> SummaryView {
    SummaryView {
        last: reading_to_view(last_index, &summary.last),
        min: finite(summary.min),
        max: finite(summary.max),
        average: finite(summary.average),
    }
}

/// NaN and infinities have no JSON number form.
fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}
