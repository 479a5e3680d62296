pub mod canaries;
pub mod webhooks;
