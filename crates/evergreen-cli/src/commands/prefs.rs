//! Preference commands.

use clap::Subcommand;
use evergreen_core::Preferences;

#[derive(Subcommand)]
pub enum PrefsAction {
    /// Print all preferences as TOML
    Show,
    /// Get a single value by key
    Get { key: String },
    /// Set a single value by key
    Set { key: String, value: String },
}

pub fn run(action: PrefsAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        PrefsAction::Show => {
            let prefs = Preferences::load()?;
            print!("{}", toml::to_string_pretty(&prefs)?);
        }
        PrefsAction::Get { key } => {
            let prefs = Preferences::load()?;
            match prefs.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(format!("unknown preference key: {key}").into()),
            }
        }
        PrefsAction::Set { key, value } => {
            let mut prefs = Preferences::load()?;
            prefs.set(&key, &value)?;
            println!("{key} = {value}");
        }
    }
    Ok(())
}
