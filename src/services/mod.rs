pub mod analyzer;
pub mod health_monitor;
pub mod job_scheduler_service;
pub mod opportunity_mapper;
pub mod prediction_engine;
pub mod rate_controller;
