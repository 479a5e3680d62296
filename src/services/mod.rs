/*
 * Responsibility
 * - Process-level services shared through AppState
 *   - auth: strategies that authorize requests
 *   - webhook: outbound notification delivery
 */
pub mod auth;
pub mod webhook;
