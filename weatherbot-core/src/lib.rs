//! Core library for the weather notification bot.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Abstraction over the weather / air-quality provider
//! - Forecast segmentation and report composition
//! - The durable subscription store and the notification scheduler
//!
//! It is used by `weatherbot-cli`, but can also be reused by other binaries
//! or services.

pub mod advice;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod report;
pub mod scheduler;
pub mod segment;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use advice::{AdviceGenerator, Verbosity, advisor_from_config};
pub use config::Config;
pub use error::BotError;
pub use model::{
    ConditionsReport, IdentityKey, Location, Subscription, SubscriptionKind,
};
pub use pipeline::Delivery;
pub use provider::{ConditionsProvider, provider_from_config};
pub use scheduler::NotificationScheduler;
pub use store::{AddOutcome, RemoveOutcome, SubscriptionStore};
