/*
 * Responsibility
 * - Module tree shared by the binary and the integration tests
 */
pub mod api;
pub mod app;
pub mod config;
pub mod context;
pub mod errcode;
pub mod error;
pub mod middleware;
pub mod models;
pub mod repos;
pub mod services;
pub mod state;
