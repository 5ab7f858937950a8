pub mod api;
pub mod billing;
pub mod models;
pub mod registry;
pub mod scheduler;
pub mod selector;
pub mod service;
pub mod status;
pub mod store;
pub mod transition;

pub use billing::{ApprovalFeeGateway, StripeLikeGateway};
pub use models::{A2pProfile, CandidateRecord, SyncOutcome};
pub use registry::{CampaignRegistry, HttpCampaignRegistry};
pub use scheduler::{process_tick as run_a2p_poll_tick, spawn as spawn_a2p_poller, TickSummary};
pub use service::A2pSyncService;
pub use transition::ReadyTransition;
