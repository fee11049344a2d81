pub mod endpoints;
pub mod reporting;
pub mod traffic_log;
