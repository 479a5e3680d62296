/*
 * Responsibility
 * - Versioned HTTP API
 */
pub mod v1;
