//! `qsync history` – recently issued links for this API key.

use anyhow::Result;
use qsync_core::api::Transport;
use qsync_core::history::unix_millis;
use qsync_core::session::Session;

pub async fn run_history<T: Transport>(session: &Session<T>, limit: u32) -> Result<()> {
    let rows = session.history(limit).await?;
    if rows.is_empty() {
        println!("No links issued yet.");
        return Ok(());
    }
    let now = unix_millis();
    println!("{:<10} {:<9} {:<8} {:<6} {}", "AGE", "CLASS", "ID", "FILE", "URL");
    for r in rows {
        let file = r.file_id.map(|f| f.to_string()).unwrap_or_else(|| "-".into());
        println!(
            "{:<10} {:<9} {:<8} {:<6} {}",
            age(now - r.issued_at),
            r.class,
            r.item_id,
            file,
            r.url
        );
    }
    Ok(())
}

fn age(ms: i64) -> String {
    let secs = ms.max(0) / 1000;
    match secs {
        0..=59 => format!("{secs}s"),
        60..=3599 => format!("{}m", secs / 60),
        3600..=86_399 => format!("{}h", secs / 3600),
        _ => format!("{}d", secs / 86_400),
    }
}
