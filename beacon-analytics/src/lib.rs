//! Beacon Analytics - Service Facade
//!
//! Ties the query, cache and fallback layers together behind one
//! injected-dependency service type.

pub mod fallback;
pub mod service;

pub use fallback::DemoData;
pub use service::{AnalyticsService, DEFAULT_TREND_MONTHS};
