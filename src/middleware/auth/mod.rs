/*
 * Responsibility
 * - Request-level authorization: which accesses a request needs, and asking the strategy
 */
pub mod access;
