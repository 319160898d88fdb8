use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use engram::MemorySystem;
use engram::memory::types::{MemoryDraft, MemoryType};

use crate::error::CliResult;
use crate::output::{OutputFormat, format_timestamp, truncate_string};

#[derive(Parser)]
pub struct MemoryCommand {
    #[clap(subcommand)]
    pub command: MemorySubcommand,
}

#[derive(Subcommand)]
pub enum MemorySubcommand {
    #[clap(about = "Manually add a memory")]
    Add(AddArgs),

    #[clap(about = "List active memories")]
    List(ListArgs),

    #[clap(about = "Show memory details")]
    Show(ShowArgs),

    #[clap(about = "Search memories by text query")]
    Search(SearchArgs),
}

#[derive(Parser)]
pub struct AddArgs {
    #[clap(help = "Memory content text")]
    pub text: String,

    #[clap(
        long,
        default_value = "short_term",
        help = "Memory type (short_term, long_term, episodic, reflective)"
    )]
    pub r#type: String,

    #[clap(long, default_value = "0.5", help = "Importance score (0.0 to 1.0)")]
    pub importance: f32,

    #[clap(long, help = "Tag to attach (repeatable)")]
    pub tag: Vec<String>,
}

#[derive(Parser)]
pub struct ListArgs {
    #[clap(
        long,
        short,
        default_value = "20",
        help = "Maximum number of memories to display"
    )]
    pub limit: usize,

    #[clap(
        long,
        short,
        help = "Filter by memory type (short_term, long_term, episodic, reflective)"
    )]
    pub r#type: Option<String>,
}

#[derive(Parser)]
pub struct ShowArgs {
    #[clap(help = "Memory ID")]
    pub id: i64,
}

#[derive(Parser)]
pub struct SearchArgs {
    #[clap(help = "Query text")]
    pub query: String,

    #[clap(long, short, default_value = "5", help = "Number of results to return")]
    pub k: usize,

    #[clap(long, short, help = "Filter by memory type")]
    pub r#type: Option<String>,
}

fn parse_type(value: &str) -> CliResult<MemoryType> {
    MemoryType::parse(value).map_err(|e| e.to_string().into())
}

impl MemoryCommand {
    pub fn execute(&self, system: &mut MemorySystem, format: OutputFormat) -> CliResult<()> {
        match &self.command {
            MemorySubcommand::Add(args) => Self::add(system, args, format),
            MemorySubcommand::List(args) => Self::list(system, args, format),
            MemorySubcommand::Show(args) => Self::show(system, args, format),
            MemorySubcommand::Search(args) => Self::search(system, args, format),
        }
    }

    fn add(system: &mut MemorySystem, args: &AddArgs, format: OutputFormat) -> CliResult<()> {
        let memory_type = parse_type(&args.r#type)?;

        let mut draft =
            MemoryDraft::new(args.text.clone(), memory_type).with_importance(args.importance);
        for tag in &args.tag {
            draft = draft.with_tag(tag.clone());
        }

        let id = system.store(draft)?;

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::json!({ "id": id }));
            }
            OutputFormat::Table => {
                println!("Stored memory {id}");
            }
        }
        Ok(())
    }

    fn list(system: &MemorySystem, args: &ListArgs, format: OutputFormat) -> CliResult<()> {
        let type_filter = args.r#type.as_deref().map(parse_type).transpose()?;

        let mut memories = system.list_active()?;
        if let Some(type_filter) = type_filter {
            memories.retain(|m| m.memory_type == type_filter);
        }
        memories.truncate(args.limit);

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&memories)?);
            }
            OutputFormat::Table => {
                if memories.is_empty() {
                    println!("No memories found.");
                    return Ok(());
                }

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["ID", "Type", "Importance", "Last Accessed", "Content"]);

                for memory in &memories {
                    table.add_row([
                        memory.id.to_string(),
                        memory.memory_type.to_string(),
                        format!("{:.2}", memory.importance),
                        format_timestamp(&memory.last_accessed),
                        truncate_string(&memory.content, 60),
                    ]);
                }

                println!("{table}");
            }
        }
        Ok(())
    }

    fn show(system: &MemorySystem, args: &ShowArgs, format: OutputFormat) -> CliResult<()> {
        let Some(memory) = system.get(args.id)? else {
            return Err(format!("Memory {} not found", args.id).into());
        };

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&memory)?);
            }
            OutputFormat::Table => {
                println!("ID:            {}", memory.id);
                println!("Type:          {}", memory.memory_type);
                println!("Importance:    {:.2}", memory.importance);
                println!("Created:       {}", format_timestamp(&memory.timestamp));
                println!("Last accessed: {}", format_timestamp(&memory.last_accessed));
                println!("Access count:  {}", memory.access_count);
                if !memory.tags.is_empty() {
                    let tags: Vec<&str> = memory.tags.iter().map(String::as_str).collect();
                    println!("Tags:          {}", tags.join(", "));
                }
                println!("Content:       {}", memory.content);
            }
        }
        Ok(())
    }

    fn search(system: &mut MemorySystem, args: &SearchArgs, format: OutputFormat) -> CliResult<()> {
        let type_filter = args.r#type.as_deref().map(parse_type).transpose()?;

        let results = system.retrieve_text(&args.query, args.k, type_filter)?;

        match format {
            OutputFormat::Json => {
                let output: Vec<_> = results
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "id": r.record.id,
                            "content": &r.record.content,
                            "type": r.record.memory_type.to_string(),
                            "score": r.score,
                            "similarity": r.similarity,
                            "recency": r.recency,
                            "importance": r.record.importance,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                if results.is_empty() {
                    println!("No matching memories.");
                    return Ok(());
                }

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["ID", "Score", "Similarity", "Recency", "Importance", "Content"]);

                for result in &results {
                    table.add_row([
                        result.record.id.to_string(),
                        format!("{:.3}", result.score),
                        format!("{:.3}", result.similarity),
                        format!("{:.3}", result.recency),
                        format!("{:.2}", result.record.importance),
                        truncate_string(&result.record.content, 50),
                    ]);
                }

                println!("{table}");
            }
        }
        Ok(())
    }
}
