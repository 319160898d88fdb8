use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use engram::MemorySystem;

use crate::error::CliResult;
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct StatsCommand {}

impl StatsCommand {
    pub fn execute(&self, system: &MemorySystem, format: OutputFormat) -> CliResult<()> {
        let stats = system.stats()?;

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "total_records": stats.total_records,
                    "active_records": stats.active_records,
                    "tombstoned_records": stats.tombstoned_records,
                    "indexed_entries": stats.indexed_entries,
                    "index_generation": stats.index_generation,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Metric", "Value"]);

                table.add_row(["Total records".to_string(), stats.total_records.to_string()]);
                table.add_row(["Active records".to_string(), stats.active_records.to_string()]);
                table.add_row([
                    "Tombstoned records".to_string(),
                    stats.tombstoned_records.to_string(),
                ]);
                table.add_row([
                    "Indexed entries".to_string(),
                    stats.indexed_entries.to_string(),
                ]);
                table.add_row([
                    "Index generation".to_string(),
                    stats.index_generation.to_string(),
                ]);

                println!("{table}");
            }
        }
        Ok(())
    }
}
