//! `waybill list`

use super::format_row;
use crate::context::CliContext;
use anyhow::Result;
use std::sync::Arc;
use waybill_app::{badge_label, views, SnapshotLoader};
use waybill_core::NotificationList;
use waybill_transport::RestClient;

pub async fn run(ctx: &CliContext, limit: Option<usize>, json: bool) -> Result<()> {
    let api = RestClient::new(&ctx.config.api, ctx.credentials()?)?;
    let loader = SnapshotLoader::new(Arc::new(api));
    let list = NotificationList::from_snapshot(loader.load_snapshot().await?);

    let items = list.to_vec();
    let shown = &items[..limit.unwrap_or(items.len()).min(items.len())];
    let rows = views::rows(shown, chrono::Utc::now());

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    match badge_label(list.unread_count()) {
        Some(badge) => println!("Notifications ({badge})"),
        None => println!("No notifications"),
    }
    for row in &rows {
        println!("{}", format_row(row));
    }
    if rows.len() < items.len() {
        println!("  ... {} more", items.len() - rows.len());
    }
    Ok(())
}
