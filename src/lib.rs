// Library for tests to access modules

pub mod accumulator;
pub mod aggregator;
pub mod audit;
pub mod auth;
pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod maintenance_worker;
pub mod metrics;
pub mod models;
pub mod query;
pub mod redfish;
pub mod routes;
pub mod sinks;
pub mod telemetry_repo;
pub mod version;
pub mod worker;
