/*
 * Responsibility
 * - tokio runtime startup
 * - app::run() only, no logic here
 */
use anyhow::Result;

use canaria::app;

#[tokio::main]
async fn main() -> Result<()> {
    app::run().await
}
