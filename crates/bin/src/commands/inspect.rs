//! Inspect command - shows a saved document's content, heads and history.

use accord::{Document, DocumentOptions, clock::format_millis};

use crate::cli::InspectArgs;
use crate::output::{OutputFormat, print_table, short_hash};

/// Run the inspect command
pub fn run(args: &InspectArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = std::fs::read(&args.file)?;
    let doc: Document = Document::load(&bytes, DocumentOptions::new())?;

    let mut changes = Vec::new();
    if args.changes {
        for encoded in doc.all_changes()? {
            changes.push(doc.decode_change(&encoded)?);
        }
    }

    match format {
        OutputFormat::Human => {
            let heads: Vec<String> = doc.get_heads().iter().map(short_hash).collect();
            println!("File:        {}", args.file.display());
            println!("Heads:       {}", heads.join(", "));
            println!("Max op:      {}", doc.snapshot().max_op());
            println!("Actors:      {}", doc.snapshot().clock().len());
            println!("Content:");
            println!("{}", serde_json::to_string_pretty(&doc.to_json())?);
            if args.changes {
                let rows: Vec<Vec<String>> = changes
                    .iter()
                    .map(|change| {
                        vec![
                            short_hash(&change.hash),
                            change.actor.to_string(),
                            change.seq.to_string(),
                            format_millis(change.time),
                            change.message.clone().unwrap_or_default(),
                        ]
                    })
                    .collect();
                println!();
                print_table(&["HASH", "ACTOR", "SEQ", "TIME", "MESSAGE"], &rows);
            }
        }
        OutputFormat::Json => {
            let mut value = serde_json::json!({
                "heads": doc.get_heads().iter().map(ToString::to_string).collect::<Vec<_>>(),
                "max_op": doc.snapshot().max_op(),
                "clock": doc.snapshot().clock(),
                "content": doc.to_json(),
            });
            if args.changes {
                value["changes"] = serde_json::to_value(&changes)?;
            }
            println!("{}", serde_json::to_string(&value)?);
        }
    }
    Ok(())
}
