pub mod correlation_provider;
pub mod opportunity_sink;
pub mod platform_fetcher;
pub mod simulated;
