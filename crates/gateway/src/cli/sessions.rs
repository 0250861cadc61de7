//! `sessionrelay sessions list`: read-only view of the session store.

use serde_json::json;

use sr_domain::config::Config;
use sr_sessions::SessionStore;

pub fn list(config: &Config, as_json: bool) -> anyhow::Result<()> {
    let store = SessionStore::new(&config.storage.state_path)?;
    let entries = store.list()?;

    if as_json {
        let rows: Vec<_> = entries
            .iter()
            .map(|(id, record)| match record {
                Ok(record) => json!({ "id": id, "record": record }),
                Err(e) => json!({ "id": id, "error": e.to_string() }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No sessions in {}", store.dir().display());
        return Ok(());
    }

    println!("{:<32} {:<8} {:<8} CALLBACK", "ID", "RELAY", "DELETED");
    for (id, record) in &entries {
        match record {
            Ok(r) => println!(
                "{:<32} {:<8} {:<8} {}",
                id, r.relay_messages, r.deleted, r.callback_url
            ),
            Err(e) => println!("{id:<32} unreadable: {e}"),
        }
    }
    Ok(())
}
