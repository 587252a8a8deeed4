//! MantleSight: a terminal dashboard for the Mantle network.
//!
//! The [`poller::Poller`] schedules fetches against the chain RPC and the
//! market APIs, folds their outcomes into a [`state::MetricsStore`] and
//! raises gas alerts; [`ui::Dashboard`] renders the published snapshots.

pub mod alert;
pub mod config;
pub mod data;
pub mod error;
pub mod input;
pub mod market;
pub mod network;
pub mod poller;
pub mod probe;
pub mod rpc;
pub mod scheduler;
pub mod settings;
pub mod state;
pub mod tps;
pub mod ui;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
