// Dashboard controller - serial event loop owning load, auth and tank state
use crate::application::auth_gate::{AuthGate, AuthorizedCall};
use crate::application::data_loader::{DataLoader, GroupFetched, LoadTarget};
use crate::application::spreadsheet_source::{AuthProvider, RawRows};
use crate::domain::dashboard::{DashboardSnapshot, LoadState};
use crate::domain::error::LoadError;
use crate::domain::tank::TankBuckets;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

const EVENT_BUFFER: usize = 100;

type ReloadReply = oneshot::Sender<Result<(), LoadError>>;

/// Everything the controller reacts to. Events are handled one at a time.
pub enum DashboardEvent {
    Reload {
        target: LoadTarget,
        reply: Option<ReloadReply>,
    },
    AuthStatusChanged(bool),
    AuthorizedCall(AuthorizedCall),
    GroupFetched(GroupFetched),
    SignInTimedOut { cycle: u64 },
}

/// Channel carrying events into a `TankDashboard`.
pub fn event_channel() -> (mpsc::Sender<DashboardEvent>, mpsc::Receiver<DashboardEvent>) {
    mpsc::channel(EVENT_BUFFER)
}

pub struct TankDashboard {
    gate: AuthGate,
    loader: Arc<DataLoader>,
    events: mpsc::Sender<DashboardEvent>,
    snapshots: watch::Sender<Arc<DashboardSnapshot>>,
    current: Arc<DashboardSnapshot>,
    sign_in_timeout: Duration,
    cycle: u64,
    outstanding: Vec<String>,
    /// Fetched groups waiting to be aggregated, in arrival order
    parse_queue: VecDeque<(String, RawRows)>,
    /// The current cycle's fetches are still parked in the auth gate
    reload_parked: bool,
    cycle_error: Option<String>,
}

impl TankDashboard {
    pub fn new(
        loader: Arc<DataLoader>,
        auth: Arc<dyn AuthProvider>,
        events: mpsc::Sender<DashboardEvent>,
        sign_in_timeout: Duration,
    ) -> Self {
        let current = Arc::new(DashboardSnapshot::default());
        let (snapshots, _) = watch::channel(current.clone());
        Self {
            gate: AuthGate::new(auth),
            loader,
            events,
            snapshots,
            current,
            sign_in_timeout,
            cycle: 0,
            outstanding: Vec::new(),
            parse_queue: VecDeque::new(),
            reload_parked: false,
            cycle_error: None,
        }
    }

    pub fn handle(&self) -> DashboardHandle {
        DashboardHandle {
            events: self.events.clone(),
            snapshots: self.snapshots.subscribe(),
        }
    }

    /// Some group of the current cycle has not been fetched or aggregated yet.
    pub fn is_loading(&self) -> bool {
        !self.outstanding.is_empty() || !self.parse_queue.is_empty()
    }

    /// Kick off the initial load, then process events until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::Receiver<DashboardEvent>) {
        self.dispatch(DashboardEvent::Reload {
            target: LoadTarget::All,
            reply: None,
        });

        while let Some(event) = rx.recv().await {
            self.dispatch(event);

            // Readers get a turn to observe Parsing before the rows are aggregated
            while !self.parse_queue.is_empty() {
                tokio::task::yield_now().await;
                self.parse_next();
            }
        }
        tracing::info!("Dashboard event channel closed");
    }

    pub fn dispatch(&mut self, event: DashboardEvent) {
        match event {
            DashboardEvent::Reload { target, reply } => {
                let result = self.reload(target);
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            DashboardEvent::AuthStatusChanged(is_signed_in) => {
                // A successful sign-in runs whatever the gate was holding
                if is_signed_in {
                    self.reload_parked = false;
                }
                self.gate.on_auth_status_changed(is_signed_in);
                self.publish(self.current.load_state.clone(), None);
            }
            DashboardEvent::AuthorizedCall(action) => {
                let displaces_reload = self.reload_parked && self.gate.has_pending();
                self.gate.request_authorized_call(action);
                if displaces_reload {
                    self.abandon_cycle(LoadError::Superseded);
                } else {
                    self.publish(self.current.load_state.clone(), None);
                }
            }
            DashboardEvent::GroupFetched(done) => self.on_group_fetched(done),
            DashboardEvent::SignInTimedOut { cycle } => self.on_sign_in_timeout(cycle),
        }
    }

    fn reload(&mut self, target: LoadTarget) -> Result<(), LoadError> {
        if self.is_loading() {
            tracing::debug!("Reload ignored, cycle {} still running", self.cycle);
            return Err(LoadError::InProgress);
        }
        let groups = self.loader.resolve(&target)?;

        self.cycle += 1;
        self.cycle_error = None;
        self.outstanding = groups.iter().map(|g| g.name.clone()).collect();
        tracing::info!("Reloading {:?} (cycle {})", target, self.cycle);

        if self.outstanding.is_empty() {
            self.publish(LoadState::Ready, None);
            return Ok(());
        }
        self.publish(LoadState::Fetching, None);

        let loader = self.loader.clone();
        let events = self.events.clone();
        let cycle = self.cycle;
        self.gate
            .request_authorized_call(Box::new(move || loader.load(groups, cycle, events)));

        self.reload_parked = self.gate.has_pending();
        if self.reload_parked {
            self.schedule_sign_in_timeout(cycle);
        }
        Ok(())
    }

    fn on_group_fetched(&mut self, done: GroupFetched) {
        let GroupFetched { cycle, group, result } = done;

        let pos = self.outstanding.iter().position(|g| *g == group);
        let Some(pos) = pos.filter(|_| cycle == self.cycle) else {
            tracing::debug!("Dropping stale result for {} (cycle {})", group, cycle);
            return;
        };
        self.outstanding.remove(pos);

        match result {
            Ok(rows) => {
                self.parse_queue.push_back((group, rows));
                if self.cycle_error.is_none() {
                    self.publish(LoadState::Parsing, None);
                }
            }
            Err(source) => {
                self.record_error(LoadError::Fetch { group, source });
                self.publish(self.settled_state(), None);
            }
        }
    }

    /// Aggregate the oldest fetched group and merge it into the snapshot.
    /// Returns false when nothing was queued.
    pub fn parse_next(&mut self) -> bool {
        let Some((group, rows)) = self.parse_queue.pop_front() else {
            return false;
        };

        let mut merged = None;
        if rows.is_empty() {
            // The service omits `values` for a range without data
            tracing::info!("No rows for {}, keeping previous readings", group);
        } else {
            match self.loader.apply(&group, &rows) {
                Ok(buckets) => {
                    tracing::info!("Loaded {} tanks from {}", buckets.len(), group);
                    merged = Some(self.current.tanks.merged(buckets, self.loader.order()));
                }
                Err(e) => self.record_error(e),
            }
        }

        self.publish(self.settled_state(), merged);
        true
    }

    /// State once the latest completion has been handled.
    fn settled_state(&self) -> LoadState {
        match &self.cycle_error {
            Some(msg) => LoadState::Error(msg.clone()),
            None if !self.outstanding.is_empty() => LoadState::Fetching,
            None if !self.parse_queue.is_empty() => LoadState::Parsing,
            None => LoadState::Ready,
        }
    }

    fn on_sign_in_timeout(&mut self, cycle: u64) {
        if cycle != self.cycle || !self.reload_parked {
            return;
        }
        self.gate.abandon_pending();
        self.abandon_cycle(LoadError::SignInTimeout(self.sign_in_timeout));
    }

    /// End the current cycle before any fetch was issued.
    fn abandon_cycle(&mut self, error: LoadError) {
        self.reload_parked = false;
        self.outstanding.clear();
        self.parse_queue.clear();
        self.record_error(error);
        let state = LoadState::Error(self.cycle_error.clone().unwrap_or_default());
        self.publish(state, None);
    }

    /// The first failure of a cycle is the one shown; later ones are only logged.
    fn record_error(&mut self, error: LoadError) {
        tracing::error!("Load failed: {}", error);
        if self.cycle_error.is_none() {
            self.cycle_error = Some(error.to_string());
        }
    }

    fn schedule_sign_in_timeout(&self, cycle: u64) {
        let events = self.events.clone();
        let timeout = self.sign_in_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(DashboardEvent::SignInTimedOut { cycle }).await;
        });
    }

    /// Replace the published snapshot; the previous one is never mutated.
    fn publish(&mut self, load_state: LoadState, tanks: Option<TankBuckets>) {
        if load_state != self.current.load_state {
            tracing::info!("Load state: {:?} -> {:?}", self.current.load_state, load_state);
        }
        let tanks = tanks.unwrap_or_else(|| self.current.tanks.clone());
        self.current = Arc::new(DashboardSnapshot::new(load_state, self.gate.state(), tanks));
        self.snapshots.send_replace(self.current.clone());
    }
}

/// Cloneable entry point for the rendering layer.
#[derive(Clone)]
pub struct DashboardHandle {
    events: mpsc::Sender<DashboardEvent>,
    snapshots: watch::Receiver<Arc<DashboardSnapshot>>,
}

impl DashboardHandle {
    pub fn snapshot(&self) -> Arc<DashboardSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// Start a load cycle; rejected while another one is in flight.
    pub async fn reload(&self, target: LoadTarget) -> Result<(), LoadError> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(DashboardEvent::Reload {
                target,
                reply: Some(reply),
            })
            .await
            .map_err(|_| LoadError::ControllerStopped)?;
        response.await.map_err(|_| LoadError::ControllerStopped)?
    }

    pub async fn request_authorized_call(&self, action: AuthorizedCall) -> Result<(), LoadError> {
        self.events
            .send(DashboardEvent::AuthorizedCall(action))
            .await
            .map_err(|_| LoadError::ControllerStopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::data_loader::tests::{FakeSource, groups, rows};
    use crate::domain::dashboard::AuthState;
    use crate::domain::error::FetchError;
    use crate::domain::reading::TankId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HOT: &str = "Hot Lobster Temps!A2:T";
    const COLD: &str = "Cold Lobster Temps!A2:T";

    #[derive(Default)]
    struct SilentAuth {
        sign_ins: AtomicUsize,
    }

    impl AuthProvider for SilentAuth {
        fn sign_in(&self) {
            self.sign_ins.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        dashboard: TankDashboard,
        rx: mpsc::Receiver<DashboardEvent>,
        auth: Arc<SilentAuth>,
    }

    impl Harness {
        fn new(source: FakeSource, sign_in_timeout: Duration) -> Self {
            let (tx, rx) = event_channel();
            let auth = Arc::new(SilentAuth::default());
            let loader = Arc::new(DataLoader::new(Arc::new(source), groups(), Duration::from_secs(5)));
            let dashboard = TankDashboard::new(loader, auth.clone(), tx, sign_in_timeout);
            Self { dashboard, rx, auth }
        }

        fn reload(&mut self, target: LoadTarget) {
            self.dashboard.dispatch(DashboardEvent::Reload { target, reply: None });
        }

        fn snapshot(&self) -> Arc<DashboardSnapshot> {
            self.dashboard.current.clone()
        }

        async fn next_event(&mut self) -> DashboardEvent {
            self.rx.recv().await.expect("event channel closed")
        }

        /// Feed queued events back into the controller until the cycle settles.
        async fn settle(&mut self) {
            while self.dashboard.is_loading() {
                if self.dashboard.parse_next() {
                    continue;
                }
                let event = self.next_event().await;
                self.dashboard.dispatch(event);
            }
        }
    }

    /// Wait for the next snapshot published to `handle`.
    async fn next_snapshot(handle: &mut DashboardHandle) -> Arc<DashboardSnapshot> {
        handle.snapshots.changed().await.expect("controller stopped");
        handle.snapshot()
    }

    fn signed_in(source: FakeSource) -> Harness {
        let mut h = Harness::new(source, Duration::from_secs(30));
        h.dashboard.dispatch(DashboardEvent::AuthStatusChanged(true));
        h
    }

    #[tokio::test]
    async fn test_reload_waits_for_sign_in() {
        let source = FakeSource::default()
            .with(HOT, Ok(rows("1", &["12.5", "13.0"])))
            .with(COLD, Ok(rows("4", &["8.0"])));
        let mut h = Harness::new(source, Duration::from_secs(30));

        h.reload(LoadTarget::All);
        let snapshot = h.snapshot();
        assert_eq!(snapshot.load_state, LoadState::Fetching);
        assert_eq!(snapshot.auth_state, AuthState::Unauthenticated);
        assert_eq!(h.auth.sign_ins.load(Ordering::SeqCst), 1);

        h.dashboard.dispatch(DashboardEvent::AuthStatusChanged(true));
        h.settle().await;

        let snapshot = h.snapshot();
        assert_eq!(snapshot.load_state, LoadState::Ready);
        assert_eq!(snapshot.auth_state, AuthState::Authenticated);
        let ids: Vec<TankId> = snapshot.tanks.iter().map(|b| b.tank).collect();
        assert_eq!(ids, (1..=7).map(TankId).collect::<Vec<_>>());

        let tank_one = snapshot.tanks.get(TankId(1)).unwrap();
        assert_eq!(tank_one.readings.len(), 2);
        assert_eq!(tank_one.summarize().unwrap().average, 12.75);
        assert!(snapshot.tanks.get(TankId(5)).unwrap().summarize().is_err());
    }

    #[tokio::test]
    async fn test_failed_group_keeps_previous_buckets() {
        let source = FakeSource::default()
            .with(HOT, Ok(rows("2", &["21.0"])))
            .with(COLD, Ok(rows("6", &["7.5"])));
        let mut h = signed_in(source);
        h.reload(LoadTarget::All);
        h.settle().await;
        assert_eq!(h.snapshot().load_state, LoadState::Ready);

        // Second cycle: Hot fails, Cold returns new data
        let source = FakeSource::default()
            .with(HOT, Err(FetchError::Service("Requested entity was not found.".to_string())))
            .with(COLD, Ok(rows("6", &["6.0", "6.5"])));
        let loader = Arc::new(DataLoader::new(Arc::new(source), groups(), Duration::from_secs(5)));
        h.dashboard.loader = loader;

        h.reload(LoadTarget::All);
        h.settle().await;

        let snapshot = h.snapshot();
        match &snapshot.load_state {
            LoadState::Error(msg) => assert_eq!(msg, "Hot: Requested entity was not found."),
            other => panic!("expected error state, got {:?}", other),
        }
        assert_eq!(snapshot.tanks.get(TankId(2)).unwrap().readings[0].temp, 21.0);
        assert_eq!(snapshot.tanks.get(TankId(6)).unwrap().readings.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_tank_is_a_load_error() {
        let source = FakeSource::default()
            .with(HOT, Ok(rows("9", &["12.0"])))
            .with(COLD, Ok(rows("4", &["8.0"])));
        let mut h = signed_in(source);

        h.reload(LoadTarget::All);
        h.settle().await;

        let snapshot = h.snapshot();
        match &snapshot.load_state {
            LoadState::Error(msg) => assert!(msg.contains("unknown tank 9"), "{}", msg),
            other => panic!("expected error state, got {:?}", other),
        }
        assert!(snapshot.tanks.get(TankId(1)).is_none());
        assert_eq!(snapshot.tanks.get(TankId(4)).unwrap().readings.len(), 1);
    }

    #[tokio::test]
    async fn test_single_group_reload_and_busy_rejection() {
        let source = FakeSource::default().with(COLD, Ok(rows("5", &["9.0"])));
        let mut h = signed_in(source);

        let (reply, response) = oneshot::channel();
        h.dashboard.dispatch(DashboardEvent::Reload {
            target: LoadTarget::Group("Cold".to_string()),
            reply: Some(reply),
        });
        assert_eq!(response.await.unwrap(), Ok(()));

        let (reply, response) = oneshot::channel();
        h.dashboard.dispatch(DashboardEvent::Reload {
            target: LoadTarget::All,
            reply: Some(reply),
        });
        assert_eq!(response.await.unwrap(), Err(LoadError::InProgress));

        h.settle().await;
        let snapshot = h.snapshot();
        assert_eq!(snapshot.load_state, LoadState::Ready);
        assert_eq!(snapshot.tanks.len(), 4);

        let (reply, response) = oneshot::channel();
        h.dashboard.dispatch(DashboardEvent::Reload {
            target: LoadTarget::Group("Warm".to_string()),
            reply: Some(reply),
        });
        assert_eq!(
            response.await.unwrap(),
            Err(LoadError::UnknownGroup("Warm".to_string()))
        );
        assert_eq!(h.snapshot().load_state, LoadState::Ready);
    }

    #[tokio::test]
    async fn test_sign_in_timeout_maps_to_error() {
        let mut h = Harness::new(FakeSource::default(), Duration::from_millis(10));

        h.reload(LoadTarget::All);
        h.settle().await;

        match &h.snapshot().load_state {
            LoadState::Error(msg) => assert!(msg.starts_with("sign-in timed out"), "{}", msg),
            other => panic!("expected error state, got {:?}", other),
        }

        // A late sign-in must not resurrect the abandoned reload
        h.dashboard.dispatch(DashboardEvent::AuthStatusChanged(true));
        assert!(h.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_handle_reload_and_authorized_call() {
        let (tx, rx) = event_channel();
        let auth = Arc::new(SilentAuth::default());
        let source = FakeSource::default()
            .with(HOT, Ok(rows("3", &["15.0"])))
            .with(COLD, Ok(rows("7", &["4.0"])));
        let loader = Arc::new(DataLoader::new(Arc::new(source), groups(), Duration::from_secs(5)));
        let dashboard = TankDashboard::new(loader, auth, tx.clone(), Duration::from_secs(30));
        let mut handle = dashboard.handle();
        tokio::spawn(dashboard.run(rx));

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        handle
            .request_authorized_call(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .await
            .unwrap();

        // The start-up reload was parked for sign-in and has now been replaced
        while !matches!(handle.snapshot().load_state, LoadState::Error(_)) {
            next_snapshot(&mut handle).await;
        }
        match &handle.snapshot().load_state {
            LoadState::Error(msg) => assert!(msg.contains("superseded"), "{}", msg),
            other => panic!("expected error state, got {:?}", other),
        }

        tx.send(DashboardEvent::AuthStatusChanged(true)).await.unwrap();
        handle.reload(LoadTarget::All).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        while handle.snapshot().load_state != LoadState::Ready {
            next_snapshot(&mut handle).await;
        }
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.tanks.get(TankId(3)).unwrap().readings[0].temp, 15.0);
        assert_eq!(snapshot.tanks.get(TankId(7)).unwrap().readings[0].temp, 4.0);
    }
    #[tokio::test]
    async fn test_user_call_after_sign_out_keeps_running_reload() {
        let source = FakeSource::default()
            .with(HOT, Ok(rows("1", &["12.5"])))
            .with(COLD, Ok(rows("4", &["8.0"])));
        let mut h = signed_in(source);
        h.reload(LoadTarget::All);

        // Fetches are already in flight when the session drops
        h.dashboard.dispatch(DashboardEvent::AuthStatusChanged(false));
        for _ in 0..2 {
            h.dashboard.dispatch(DashboardEvent::AuthorizedCall(Box::new(|| {})));
        }
        assert_eq!(h.snapshot().load_state, LoadState::Fetching);
        assert!(h.dashboard.is_loading());

        h.settle().await;
        let snapshot = h.snapshot();
        assert_eq!(snapshot.load_state, LoadState::Ready);
        assert_eq!(snapshot.tanks.get(TankId(1)).unwrap().readings[0].temp, 12.5);
        assert_eq!(snapshot.tanks.get(TankId(4)).unwrap().readings[0].temp, 8.0);
    }

    #[tokio::test]
    async fn test_parsing_is_published_before_aggregation() {
        let source = FakeSource::default().with(COLD, Ok(rows("5", &["9.0", "9.5"])));
        let mut h = signed_in(source);
        h.reload(LoadTarget::Group("Cold".to_string()));

        let event = h.next_event().await;
        h.dashboard.dispatch(event);
        let snapshot = h.snapshot();
        assert_eq!(snapshot.load_state, LoadState::Parsing);
        assert!(snapshot.tanks.get(TankId(5)).is_none());
        assert!(h.dashboard.is_loading());

        assert!(h.dashboard.parse_next());
        assert!(!h.dashboard.parse_next());
        let snapshot = h.snapshot();
        assert_eq!(snapshot.load_state, LoadState::Ready);
        assert_eq!(snapshot.tanks.get(TankId(5)).unwrap().readings.len(), 2);
    }

    #[tokio::test]
    async fn test_range_without_rows_keeps_previous_readings() {
        let source = FakeSource::default()
            .with(HOT, Ok(rows("3", &["16.0"])))
            .with(COLD, Ok(rows("7", &["4.5"])));
        let mut h = signed_in(source);
        h.reload(LoadTarget::All);
        h.settle().await;

        let source = FakeSource::default()
            .with(HOT, Ok(Vec::new()))
            .with(COLD, Ok(rows("7", &["5.0"])));
        h.dashboard.loader = Arc::new(DataLoader::new(Arc::new(source), groups(), Duration::from_secs(5)));
        h.reload(LoadTarget::All);
        h.settle().await;

        let snapshot = h.snapshot();
        assert_eq!(snapshot.load_state, LoadState::Ready);
        assert_eq!(snapshot.tanks.get(TankId(3)).unwrap().readings[0].temp, 16.0);
        assert_eq!(snapshot.tanks.get(TankId(7)).unwrap().readings[0].temp, 5.0);
    }
}
