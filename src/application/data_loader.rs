// Data loader - one fetch per tank group, results come back as events
use crate::application::dashboard_controller::DashboardEvent;
use crate::application::spreadsheet_source::{RawRows, SpreadsheetSource};
use crate::application::tank_aggregator::aggregate;
use crate::domain::error::{FetchError, LoadError};
use crate::domain::tank::{TankBuckets, TankGroup, TankOrder};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// What a reload should fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadTarget {
    All,
    Group(String),
}

/// Completion of one group's fetch.
#[derive(Debug)]
pub struct GroupFetched {
    pub cycle: u64,
    pub group: String,
    pub result: Result<RawRows, FetchError>,
}

pub struct DataLoader {
    source: Arc<dyn SpreadsheetSource>,
    groups: Vec<TankGroup>,
    order: TankOrder,
    fetch_timeout: Duration,
}

impl DataLoader {
    pub fn new(source: Arc<dyn SpreadsheetSource>, groups: Vec<TankGroup>, fetch_timeout: Duration) -> Self {
        let order = TankOrder::from_groups(&groups);
        Self {
            source,
            groups,
            order,
            fetch_timeout,
        }
    }

    pub fn order(&self) -> &TankOrder {
        &self.order
    }

    /// Groups covered by `target`.
    pub fn resolve(&self, target: &LoadTarget) -> Result<Vec<TankGroup>, LoadError> {
        match target {
            LoadTarget::All => Ok(self.groups.clone()),
            LoadTarget::Group(name) => self
                .groups
                .iter()
                .find(|g| g.name == *name)
                .cloned()
                .map(|g| vec![g])
                .ok_or_else(|| LoadError::UnknownGroup(name.clone())),
        }
    }

    /// Issue one fetch per group and return immediately.
    ///
    /// Each completion (rows, service error or timeout) is delivered as a
    /// `DashboardEvent::GroupFetched` tagged with `cycle`.
    pub fn load(&self, groups: Vec<TankGroup>, cycle: u64, events: mpsc::Sender<DashboardEvent>) {
        for group in groups {
            let source = self.source.clone();
            let events = events.clone();
            let timeout = self.fetch_timeout;

            tokio::spawn(async move {
                tracing::debug!("Fetching {} ({})", group.name, group.range);

                let result = match tokio::time::timeout(timeout, source.fetch_rows(&group.range)).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout(timeout)),
                };

                match &result {
                    Ok(rows) => tracing::debug!("Fetched {} rows for {}", rows.len(), group.name),
                    Err(e) => tracing::warn!("Fetch for {} failed: {}", group.name, e),
                }

                let msg = DashboardEvent::GroupFetched(GroupFetched {
                    cycle,
                    group: group.name,
                    result,
                });
                let _ = events.send(msg).await;
            });
        }
    }

    /// Aggregate one group's raw rows with that group's window and tank set.
    pub fn apply(&self, group: &str, rows: &RawRows) -> Result<TankBuckets, LoadError> {
        let tank_group = self
            .groups
            .iter()
            .find(|g| g.name == group)
            .ok_or_else(|| LoadError::UnknownGroup(group.to_string()))?;

        aggregate(rows, tank_group.recent_window, &tank_group.tanks).map_err(|source| {
            LoadError::Aggregate {
                group: group.to_string(),
                source,
            }
        })
    }
}
