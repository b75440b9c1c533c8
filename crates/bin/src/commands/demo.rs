//! Demo command - two replicas edit concurrently, then sync until converged.

use accord::{
    Actor, Document, DocumentOptions,
    doc::{NewValue, RowId},
    sync::SyncCoordinator,
};
use tracing::{info, warn};

use crate::cli::DemoArgs;
use crate::output::{OutputFormat, print_table, short_hash};

/// Outcome of a demo session.
pub struct DemoReport {
    pub alice: Document,
    pub bob: Document,
    pub rounds: usize,
    pub converged: bool,
}

/// Run the demo command
pub fn run(args: &DemoArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let report = simulate(args.rounds)?;

    if let Some(path) = &args.save {
        std::fs::write(path, report.alice.save()?)?;
        info!(path = %path.display(), "Saved converged document");
    }

    let title_conflicts: Vec<Vec<String>> = report
        .alice
        .conflicts("title")
        .unwrap_or_default()
        .into_iter()
        .map(|(actor, value)| vec![actor.to_string(), value.to_json().to_string()])
        .collect();

    match format {
        OutputFormat::Human => {
            println!("Converged:   {}", report.converged);
            println!("Rounds:      {}", report.rounds);
            let heads: Vec<String> = report.alice.get_heads().iter().map(short_hash).collect();
            println!("Heads:       {}", heads.join(", "));
            println!("Content:");
            println!("{}", serde_json::to_string_pretty(&report.alice.to_json())?);
            if !title_conflicts.is_empty() {
                println!("Conflicting titles:");
                print_table(&["ACTOR", "VALUE"], &title_conflicts);
            }
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "converged": report.converged,
                "rounds": report.rounds,
                "heads": report.alice.get_heads().iter().map(ToString::to_string).collect::<Vec<_>>(),
                "content": report.alice.to_json(),
                "title_conflicts": title_conflicts,
            });
            println!("{}", serde_json::to_string(&value)?);
        }
    }
    Ok(())
}

/// Build two diverging replicas and sync them for at most `max_rounds`.
pub fn simulate(max_rounds: usize) -> accord::Result<DemoReport> {
    let alice_actor: Actor = "a11ce".parse()?;
    let bob_actor: Actor = "b0b".parse()?;

    let mut alice: Document = Document::new(DocumentOptions::new().actor(alice_actor));
    alice.change_with_message("Create aviary", |tx| {
        tx.set("title", "Birds")?;
        tx.set("sightings", NewValue::table())?;
        tx.set("visits", NewValue::counter(0))?;
        tx.set("checklist", NewValue::list())?;
        Ok(())
    })?;
    let mut bob = alice.fork_as(bob_actor);

    alice.change_with_message("Morning walk", |tx| {
        tx.set("title", "Garden birds")?;
        tx.table("sightings")?.add_with_id(
            RowId::from("wren"),
            &serde_json::json!({"species": "wren", "count": 2}),
        )?;
        tx.increment("visits", 2)?;
        Ok(())
    })?;
    bob.change_with_message("Evening walk", |tx| {
        tx.set("title", "Backyard birds")?;
        tx.table("sightings")?.add_with_id(
            RowId::from("robin"),
            &serde_json::json!({"species": "robin", "count": 1}),
        )?;
        tx.increment("visits", 3)?;
        tx.push("checklist", "refill feeder")?;
        Ok(())
    })?;

    let mut alice_sync = SyncCoordinator::new();
    let mut bob_sync = SyncCoordinator::new();
    let mut rounds = 0;
    let mut converged = false;
    while rounds < max_rounds {
        rounds += 1;
        let to_bob = alice.generate_sync_message(&mut alice_sync)?;
        if let Some(message) = &to_bob {
            bob.receive_sync_message(&mut bob_sync, message)?;
        }
        let to_alice = bob.generate_sync_message(&mut bob_sync)?;
        if let Some(message) = &to_alice {
            alice.receive_sync_message(&mut alice_sync, message)?;
        }
        if to_bob.is_none() && to_alice.is_none() {
            converged = true;
            break;
        }
    }

    if converged {
        info!(rounds, "Replicas converged");
    } else {
        warn!(rounds, "Replicas did not converge within the round limit");
    }
    Ok(DemoReport {
        alice,
        bob,
        rounds,
        converged,
    })
}
