// Application state for HTTP handlers
use crate::application::dashboard_controller::DashboardHandle;

#[derive(Clone)]
pub struct AppState {
    pub dashboard: DashboardHandle,
}
