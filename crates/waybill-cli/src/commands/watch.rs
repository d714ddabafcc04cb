//! `waybill watch`

use super::format_row;
use crate::context::CliContext;
use anyhow::Result;
use futures::StreamExt;
use futures_signals::signal::SignalExt;
use std::collections::HashSet;
use waybill_app::{badge_label, NotificationFeed, NotificationRow};
use waybill_core::{Notification, NotificationId};

pub async fn run(ctx: &CliContext, full: bool) -> Result<()> {
    let feed = NotificationFeed::from_config(&ctx.config, ctx.credentials()?)?;
    if let Err(e) = feed.activate().await {
        tracing::warn!(error = %e, "Initial load failed, showing live events only");
    }

    let mut items = Box::pin(feed.items_signal().to_stream());
    let mut states = Box::pin(feed.live_state_signal().to_stream());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut seen: HashSet<NotificationId> = HashSet::new();

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            Some(list) = items.next() => render(&list, &mut seen, full),
            Some(state) = states.next() => eprintln!("live updates: {state}"),
            else => break,
        }
    }

    feed.deactivate();
    Ok(())
}

fn render(items: &[Notification], seen: &mut HashSet<NotificationId>, full: bool) {
    let now = chrono::Utc::now();
    let badge = badge_label(items.len()).unwrap_or_else(|| "0".to_string());

    if full {
        println!("-- {badge} unread --");
        for item in items {
            println!("{}", format_row(&NotificationRow::new(item, now)));
        }
    } else if items.is_empty() && !seen.is_empty() {
        println!("-- cleared --");
    } else {
        // Oldest new arrival first so the terminal reads top to bottom.
        for item in items.iter().rev().filter(|n| !seen.contains(&n.id)) {
            println!("{}  [{badge}]", format_row(&NotificationRow::new(item, now)));
        }
    }

    *seen = items.iter().map(|n| n.id.clone()).collect();
}
