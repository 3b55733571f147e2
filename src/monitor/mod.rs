//! Result monitoring
//!
//! - Registration list loading and validation
//! - Result page fetching and classification
//! - Discord webhook notifications
//! - Polling loop

pub mod classifier;
pub mod fetcher;
pub mod notifier;
pub mod registration;
pub mod retry;
pub mod runner;

pub use fetcher::{CheckOutcome, HttpResultSource, LandingStatus, ResultMetadata, ResultSource};
pub use notifier::{DiscordEmbed, DiscordNotifier, Notifier};
pub use registration::{load_registration_file, RegistrationNumber};
pub use runner::{Monitor, RunSummary, StopReason, TickReport};
