//! `waybill prefs`

use crate::context::CliContext;
use anyhow::Result;
use clap::Subcommand;
use waybill_app::PreferencesStore;

#[derive(Subcommand)]
pub enum PrefsCommand {
    /// Print every preference
    Show,
    /// Change one preference, e.g. `alerts.low_stock true` or `language fr`
    Set {
        /// Preference key
        key: String,
        /// New value
        value: String,
    },
}

pub fn run(ctx: &CliContext, command: PrefsCommand) -> Result<()> {
    let mut store = PreferencesStore::open(&ctx.data_dir()?)?;

    match command {
        PrefsCommand::Show => {
            for (key, value) in store.data().entries() {
                println!("{key:<24} {value}");
            }
        }
        PrefsCommand::Set { key, value } => {
            store.set(&key, &value)?;
            store.save()?;
            println!("{key} = {value} ({})", store.path().display());
        }
    }
    Ok(())
}
