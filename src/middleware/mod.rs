/*
 * Responsibility
 * - Middleware public interface
 *   - dispatch: per-request pipeline for the v1 API
 *   - auth: access records and the authorization step
 *   - http / headers: router-level layers
 */
pub mod auth;
pub mod dispatch;
pub mod headers;
pub mod http;
