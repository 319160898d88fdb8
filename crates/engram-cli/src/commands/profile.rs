use clap::{Parser, Subcommand};
use engram::MemorySystem;
use serde_json::{Map, Value};

use crate::error::CliResult;
use crate::output::{OutputFormat, format_timestamp};

#[derive(Parser)]
pub struct ProfileCommand {
    #[clap(subcommand)]
    pub command: ProfileSubcommand,
}

#[derive(Subcommand)]
pub enum ProfileSubcommand {
    #[clap(about = "Replace a user's preferences")]
    Set(SetArgs),

    #[clap(about = "Show a user's profile")]
    Get(GetArgs),
}

#[derive(Parser)]
pub struct SetArgs {
    #[clap(help = "User ID")]
    pub user_id: String,

    #[clap(long = "pref", help = "Preference as key=value (repeatable)")]
    pub prefs: Vec<String>,
}

#[derive(Parser)]
pub struct GetArgs {
    #[clap(help = "User ID")]
    pub user_id: String,
}

impl ProfileCommand {
    pub fn execute(&self, system: &mut MemorySystem, format: OutputFormat) -> CliResult<()> {
        match &self.command {
            ProfileSubcommand::Set(args) => Self::set(system, args, format),
            ProfileSubcommand::Get(args) => Self::get(system, args, format),
        }
    }

    fn set(system: &mut MemorySystem, args: &SetArgs, format: OutputFormat) -> CliResult<()> {
        let mut preferences = Map::new();
        for pref in &args.prefs {
            let Some((key, value)) = pref.split_once('=') else {
                return Err(format!("Malformed preference {pref:?}, expected key=value").into());
            };
            preferences.insert(key.to_string(), Value::String(value.to_string()));
        }

        system.update_user_profile(&args.user_id, &preferences)?;

        match format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({ "user_id": args.user_id, "preferences": preferences })
                );
            }
            OutputFormat::Table => {
                println!(
                    "Updated profile for {} ({} preferences)",
                    args.user_id,
                    preferences.len()
                );
            }
        }
        Ok(())
    }

    fn get(system: &MemorySystem, args: &GetArgs, format: OutputFormat) -> CliResult<()> {
        let Some(profile) = system.get_user_profile(&args.user_id)? else {
            return Err(format!("No profile found for {}", args.user_id).into());
        };

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&profile)?);
            }
            OutputFormat::Table => {
                println!("User:             {}", profile.user_id);
                println!(
                    "Last interaction: {}",
                    format_timestamp(&profile.last_interaction)
                );
                if profile.preferences.is_empty() {
                    println!("Preferences:      (none)");
                } else {
                    println!("Preferences:");
                    for (key, value) in &profile.preferences {
                        println!("  {key} = {value}");
                    }
                }
            }
        }
        Ok(())
    }
}
