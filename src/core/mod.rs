//! Dispatch domain: offers, cascade, acceptance, expiry and reassignment.

pub mod acceptance;
pub mod audit;
pub mod availability;
pub mod cascade;
pub mod context;
pub mod engine;
pub mod error;
pub mod model;
pub mod offer;
pub mod ports;
pub mod ranker;
pub mod reassign;
pub mod sweeper;
pub mod token;
pub mod window;

pub use acceptance::AtomicAcceptance;
pub use audit::{build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink};
pub use availability::{AvailabilityIndex, Candidate, ConflictSource};
pub use cascade::{CascadeController, CascadeOutcome};
pub use context::DispatchContext;
pub use engine::{DispatchEngine, OfferResponse};
pub use error::{AppResult, DispatchError, NotifyError, TokenError};
pub use model::{
    Booking, Driver, DriverStats, ExclusionList, Job, JobStatus, Offer, OfferStatus, Reservation,
    WeeklySlot,
};
pub use offer::{IssuedOffer, OfferAction, OfferManager, Resolution, ResponseCode};
pub use ports::{
    AcceptOutcome, AdminAlertSink, AlertContext, AssignmentSync, BookingUpdate, DeadlineGuard,
    DispatchStore, DriverDirectory, IssueOutcome, NotificationChannel, OfferTransition,
};
pub use ranker::{CandidateRanker, RankedCandidate};
pub use reassign::{CancelReport, ReassignmentTrigger, RescheduleOutcome};
pub use sweeper::{ExpirySweeper, SweepReport};
pub use token::{HmacTokenCodec, OfferClaims, TokenCodec};
pub use window::{overlap, TimeWindow, WindowPolicy};
