/*
 * Responsibility
 * - v1 public interface (routes(), route table, error group)
 */
pub mod dto;
pub mod errors;
pub mod handlers;
mod routes;

pub use routes::{ROUTES, routes};
