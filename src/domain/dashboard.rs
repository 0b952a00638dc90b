// Dashboard domain model - what the rendering layer observes
use super::tank::TankBuckets;

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Idle,
    Fetching,
    Parsing,
    Ready,
    Error(String),
}

impl LoadState {
    pub fn label(&self) -> &'static str {
        match self {
            LoadState::Idle => "idle",
            LoadState::Fetching => "fetching",
            LoadState::Parsing => "parsing",
            LoadState::Ready => "ready",
            LoadState::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated,
}

/// Immutable view of the dashboard; replaced as a whole on every change.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub load_state: LoadState,
    pub auth_state: AuthState,
    pub tanks: TankBuckets,
}

impl DashboardSnapshot {
    pub fn new(load_state: LoadState, auth_state: AuthState, tanks: TankBuckets) -> Self {
        Self {
            load_state,
            auth_state,
            tanks,
        }
    }
}

impl Default for DashboardSnapshot {
    fn default() -> Self {
        Self::new(LoadState::Idle, AuthState::Unauthenticated, TankBuckets::default())
    }
}
