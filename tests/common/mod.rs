//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc, Weekday};
use parking_lot::Mutex;

use prometheus_dispatch::builders::EngineBuilder;
use prometheus_dispatch::config::{DispatchConfig, RankingWeights};
use prometheus_dispatch::core::{
    AssignmentSync, AuditAction, Booking, CascadeOutcome, DispatchEngine, DispatchError,
    DispatchStore, Driver, DriverDirectory, DriverStats, InMemoryAuditSink, IssuedOffer, Job,
    Reservation, TimeWindow, WeeklySlot,
};
use prometheus_dispatch::infra::{InMemoryAlertSink, InMemoryDirectory, InMemoryOutbox, InMemoryStore};
use prometheus_dispatch::util::clock::ManualClock;
use prometheus_dispatch::util::serde::{Capability, ContactHandle, DriverId, JobId, JobKind, OrgId};
use tokio::sync::Notify;

pub const CAPABILITY: &str = "cleaning";

/// Monday 2025-03-03 08:00 UTC.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 8, 0, 0).unwrap()
}

/// Tuesday 2025-03-04 at `h:m` UTC.
pub fn tuesday(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 4, h, m, 0).unwrap()
}

/// Rating-only weights: a 4.0 rating scores 80, 3.75 scores 75, 3.5 scores 70.
pub fn rating_only() -> RankingWeights {
    RankingWeights {
        rating: 20.0,
        completed: 0.0,
        completed_cap: 0,
        recent: 0.0,
        recent_cap: 0,
        hours: 0.0,
        hours_cap: 0.0,
    }
}

pub fn config() -> DispatchConfig {
    let mut cfg = DispatchConfig::new("test-secret-0123456789abcdef", "https://app.example.com/offer/");
    cfg.ranking = rating_only();
    cfg
}

pub fn handle_for(id: &str) -> ContactHandle {
    ContactHandle::new(format!("+1555{id}"))
}

/// Approved, active driver working 07:00-19:00 every day.
pub fn driver(id: &str, rating: f64) -> Driver {
    let days = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];
    let open = NaiveTime::from_hms_opt(7, 0, 0).unwrap();
    let close = NaiveTime::from_hms_opt(19, 0, 0).unwrap();
    Driver {
        id: DriverId::new(id),
        capabilities: BTreeSet::from([Capability::new(CAPABILITY)]),
        organizations: BTreeSet::new(),
        contact: Some(handle_for(id)),
        approved: true,
        active: true,
        weekly: days.iter().map(|d| WeeklySlot::open(*d, open, close)).collect(),
        stats: DriverStats {
            rating,
            completed_jobs: 0,
            recent_jobs: 0,
        },
    }
}

pub fn task(id: &str, start: DateTime<Utc>) -> Job {
    Job::new(id, JobKind::Task, CAPABILITY, start)
}

pub fn booking(job: &str, driver: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Booking {
    Booking {
        job_id: JobId::new(job),
        driver_id: DriverId::new(driver),
        window: TimeWindow::new(start, end),
        booked_at: now(),
    }
}

/// External dispatch integration that records calls and can be made to fail.
#[derive(Default)]
pub struct RecordingSync {
    pub confirmed: Mutex<Vec<JobId>>,
    pub failing: AtomicBool,
}

#[async_trait]
impl AssignmentSync for RecordingSync {
    async fn assignment_confirmed(&self, job: &Job, _booking: &Booking) -> Result<(), DispatchError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DispatchError::Backend("routing system unavailable".into()));
        }
        self.confirmed.lock().push(job.id.clone());
        Ok(())
    }
}

/// Directory whose first capability lookup parks until released, so a test
/// can hold one cascade between ranking and offer issuance.
pub struct GatedDirectory {
    inner: Arc<InMemoryDirectory>,
    armed: AtomicBool,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedDirectory {
    pub fn new(inner: Arc<InMemoryDirectory>) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(true),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl DriverDirectory for GatedDirectory {
    async fn drivers_with_capability(
        &self,
        capability: &Capability,
        sponsor: Option<&OrgId>,
    ) -> Result<Vec<Driver>, DispatchError> {
        let drivers = self.inner.drivers_with_capability(capability, sponsor).await?;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(drivers)
    }

    async fn driver(&self, id: &DriverId) -> Result<Option<Driver>, DispatchError> {
        self.inner.driver(id).await
    }

    async fn driver_by_handle(&self, handle: &ContactHandle) -> Result<Option<Driver>, DispatchError> {
        self.inner.driver_by_handle(handle).await
    }

    async fn reservations_between(
        &self,
        driver: &DriverId,
        range: TimeWindow,
    ) -> Result<Vec<Reservation>, DispatchError> {
        self.inner.reservations_between(driver, range).await
    }
}

pub struct Harness {
    pub engine: Arc<DispatchEngine>,
    pub store: Arc<InMemoryStore>,
    pub directory: Arc<InMemoryDirectory>,
    pub outbox: Arc<InMemoryOutbox>,
    pub alerts: Arc<InMemoryAlertSink>,
    pub clock: Arc<ManualClock>,
    pub sync: Arc<RecordingSync>,
    pub audit: Arc<Mutex<InMemoryAuditSink>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(cfg: DispatchConfig) -> Self {
        let directory = Arc::new(InMemoryDirectory::new());
        Self::with_directory(cfg, directory.clone(), directory)
    }

    /// Build with `facade` as the engine's directory; `directory` is the
    /// backing store the helpers seed.
    pub fn with_directory(
        cfg: DispatchConfig,
        directory: Arc<InMemoryDirectory>,
        facade: Arc<dyn DriverDirectory>,
    ) -> Self {
        prometheus_dispatch::util::telemetry::init_tracing();
        let store = Arc::new(InMemoryStore::new());
        let outbox = Arc::new(InMemoryOutbox::new());
        let alerts = Arc::new(InMemoryAlertSink::new());
        let clock = Arc::new(ManualClock::new(now()));
        let sync = Arc::new(RecordingSync::default());
        let audit = Arc::new(Mutex::new(InMemoryAuditSink::new(1000)));

        let engine = EngineBuilder::new(cfg)
            .with_store(store.clone())
            .with_directory(facade)
            .with_notifier(outbox.clone())
            .with_alerts(alerts.clone())
            .with_clock(clock.clone())
            .with_sync(sync.clone())
            .with_audit(Box::new(audit.clone()))
            .build()
            .expect("engine builds");

        Self {
            engine: Arc::new(engine),
            store,
            directory,
            outbox,
            alerts,
            clock,
            sync,
            audit,
        }
    }

    pub fn add_drivers(&self, drivers: impl IntoIterator<Item = Driver>) {
        for d in drivers {
            self.directory.upsert(d);
        }
    }

    pub async fn add_job(&self, job: Job) -> JobId {
        let id = job.id.clone();
        self.store.insert_job(job).await.unwrap();
        id
    }

    pub async fn job(&self, id: &JobId) -> Job {
        self.store.job(id).await.unwrap().expect("job exists")
    }

    pub async fn exclusions(&self, id: &JobId) -> Vec<DriverId> {
        self.store.exclusions(id).await.unwrap().to_vec()
    }

    pub fn audit_actions(&self, job: &JobId) -> Vec<AuditAction> {
        self.audit
            .lock()
            .events()
            .into_iter()
            .filter(|e| e.job_id == *job)
            .map(|e| e.action)
            .collect()
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}

pub fn offered(outcome: &CascadeOutcome) -> &IssuedOffer {
    match outcome {
        CascadeOutcome::Offered(issued) => issued,
        other => panic!("expected an offer, got {other:?}"),
    }
}

/// Token embedded in the deep link of the last message sent to `driver`.
pub fn token_from_outbox(outbox: &InMemoryOutbox, driver: &str) -> String {
    let msg = outbox
        .sent_to(&handle_for(driver))
        .pop()
        .expect("driver was notified");
    let link = msg.var("link").expect("message carries a link").to_string();
    link.rsplit('/').next().unwrap().to_string()
}
