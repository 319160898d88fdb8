use clap::Parser;
use engram::MemorySystem;

use crate::error::CliResult;
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct CompressCommand {
    #[clap(
        long,
        short,
        help = "Importance threshold below which memories are evicted. Defaults to the configured value."
    )]
    pub threshold: Option<f32>,
}

impl CompressCommand {
    pub fn execute(
        &self,
        system: &mut MemorySystem,
        default_threshold: f32,
        format: OutputFormat,
    ) -> CliResult<()> {
        let threshold = self.threshold.unwrap_or(default_threshold);
        let report = system.compress(threshold)?;

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "threshold": threshold,
                    "evicted": report.evicted,
                    "low_importance": report.low_importance,
                    "inactive": report.inactive,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                if report.evicted == 0 {
                    println!("Nothing to compress at threshold {threshold}.");
                } else {
                    println!(
                        "Evicted {} memories ({} low importance, {} inactive) at threshold {threshold}",
                        report.evicted, report.low_importance, report.inactive
                    );
                }
            }
        }
        Ok(())
    }
}
