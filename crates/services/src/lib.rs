#![forbid(unsafe_code)]

pub mod app_services;
pub mod connectivity;
pub mod error;
pub mod place_summary;
pub mod progress_service;
pub mod remote;
pub mod sync;
pub mod sync_worker;
pub mod training;

pub use doric_core::Clock;

pub use app_services::AppServices;
pub use connectivity::{
    ConnectivityObserver, ConnectivityStream, ManualConnectivity, ProbeConfig, ProbeConnectivity,
};
pub use error::{
    AppServicesError, ConfigError, ProgressServiceError, RemoteError, SyncError, TrainingError,
};
pub use place_summary::{PlaceSummaryClient, SummaryConfig};
pub use progress_service::ProgressService;
pub use remote::{HttpRemoteStore, InMemoryRemoteStore, RemoteConfig, RemoteProgressStore};
pub use sync::{AdvanceOutcome, SyncOrchestrator};
pub use sync_worker::SyncWorker;
pub use training::TrainingSession;
