//! `waybill clear`

use crate::context::CliContext;
use anyhow::Result;
use waybill_transport::{NotificationApi, RestClient};

pub async fn run(ctx: &CliContext) -> Result<()> {
    let api = RestClient::new(&ctx.config.api, ctx.credentials()?)?;
    api.clear_all().await?;
    println!("All notifications cleared");
    Ok(())
}
