//! `qsync list` – sync once and print the queue.

use anyhow::Result;
use qsync_core::api::Transport;
use qsync_core::item::Item;
use qsync_core::resource::Scope;
use qsync_core::session::Session;
use qsync_core::sync::SyncOptions;

pub async fn run_list<T: Transport>(session: &Session<T>, scope: Scope, fresh: bool) -> Result<()> {
    let opts = SyncOptions {
        bypass_cache: fresh,
        ..SyncOptions::default()
    };
    session.fetch_items(scope, opts).await;
    print_items(session, scope);
    Ok(())
}

/// Prints every class in `scope` from the session's current state, plus any
/// per-class sync error.
pub fn print_items<T: Transport>(session: &Session<T>, scope: Scope) {
    println!(
        "{:<9} {:<8} {:<12} {:>6} {:>12}  {}",
        "CLASS", "ID", "STATE", "PCT", "SIZE", "NAME"
    );
    let mut total = 0;
    for class in scope.classes() {
        let items = session.items(class.into());
        total += items.len();
        for item in &items {
            println!(
                "{:<9} {:<8} {:<12} {:>5.1}% {:>12}  {}",
                class,
                item.id,
                state_label(item),
                item.progress * 100.0,
                item.size,
                item.name
            );
        }
    }
    if total == 0 {
        println!("No items.");
    }
    for failure in session.errors(scope) {
        eprintln!("sync failed for {failure}");
    }
}

fn state_label(item: &Item) -> String {
    match item.download_state.as_deref() {
        Some(s) if !s.trim().is_empty() => s.trim().to_lowercase(),
        _ if item.active => "active".to_string(),
        _ => "-".to_string(),
    }
}
