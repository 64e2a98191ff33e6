//! Floodgate - Distributed Rate Limiting Service
//!
//! Floodgate decides, for a classified request key, whether a new request
//! is admitted. Request counts accumulate in rolling one-minute windows
//! inside a shared counter store, offenders escalate into a temporary
//! block state, and limits hot-reload without a restart. Because all
//! counting state is store-resident, any number of replicas pointed at
//! the same store enforce one consistent limit.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod store;
