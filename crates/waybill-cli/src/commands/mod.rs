//! Subcommand implementations

pub mod clear;
pub mod list;
pub mod prefs;
pub mod session;
pub mod watch;

use waybill_app::NotificationRow;

/// One table line: read marker, age, sender, title.
pub(crate) fn format_row(row: &NotificationRow) -> String {
    let marker = if row.is_read { ' ' } else { '*' };
    format!("{marker} {:>9}  {:<20}  {}", row.age, row.sender, row.title)
}
