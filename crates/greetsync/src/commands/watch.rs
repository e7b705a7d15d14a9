//! Live view: follow pushed changes until Ctrl-C.

use std::sync::Arc;

use tracing::{debug, warn};

use greetsync_core::{
    Author, GreetingClient, GreetingId, PendingUpdate, StoreSnapshot, UpdateReason,
};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::config::ActiveProfile;
use crate::error::CliError;
use crate::output::{self, Renderer};

use super::{greetings, util};

pub async fn handle(
    client: &GreetingClient,
    profile: &ActiveProfile,
    args: WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // List events are ignored until a user is loaded.
    util::hydrate_user(client, profile).await?;
    let initial = client.load_greetings(client.config().list_limit, 0).await?;

    if !client.hub().is_ready() {
        return Err(CliError::HubUnavailable {
            reason: "the API did not advertise a push hub".into(),
        });
    }

    let out = Renderer::new(global);
    match args.id {
        None => {
            greetings::print_list(&initial, &out);
            watch_list(client, &out).await;
        }
        Some(id) => {
            let id = GreetingId::from(id);
            let greeting = client.load_greeting(&id).await?;
            if client.store().get(&id).is_none() {
                warn!(%id, "greeting is outside the cached page, remote changes will not be staged");
            }
            if client.add_subscription(Some(&id))?.is_none() {
                return Err(CliError::HubUnavailable {
                    reason: format!("could not open the stream for greeting {id}"),
                });
            }
            greetings::print_greeting(&greeting, &out);
            watch_record(client, &id, &out).await;
            client.remove_subscription(Some(&id));
        }
    }
    Ok(())
}

async fn watch_list(client: &GreetingClient, out: &Renderer) {
    let mut stream = client.greetings();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            snap = stream.changed() => match snap {
                Some(snap) => {
                    debug!(cached = snap.greetings().len(), "greeting list changed");
                    greetings::print_list(&snap.sorted_view(), out);
                }
                None => break,
            },
        }
    }
}

async fn watch_record(client: &GreetingClient, id: &GreetingId, out: &Renderer) {
    let mut stream = client.greetings();
    let mut last_seen: Option<Arc<PendingUpdate>> = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            snap = stream.changed() => {
                let Some(snap) = snap else { break };
                let Some(update) = fresh_update(&snap, id, last_seen.as_ref()) else {
                    continue;
                };
                print_update(&update, out);
                last_seen = Some(update);
            }
        }
    }
}

/// The staged update for `id`, unless it was already reported.
fn fresh_update(
    snap: &StoreSnapshot,
    id: &GreetingId,
    last_seen: Option<&Arc<PendingUpdate>>,
) -> Option<Arc<PendingUpdate>> {
    let update = snap.pending_update(id)?;
    match last_seen {
        Some(seen) if Arc::ptr_eq(seen, &update) => None,
        _ => Some(update),
    }
}

fn print_update(update: &PendingUpdate, out: &Renderer) {
    let causer = update
        .causer
        .as_ref()
        .map_or_else(|| "someone".to_owned(), Author::name);
    let verb = match update.reason {
        UpdateReason::Update => "edited",
        UpdateReason::Delete => "deleted",
    };
    out.note(&output::dim(&format!("{causer} {verb} this greeting"), out.color()));
    if update.reason == UpdateReason::Update {
        greetings::print_greeting(&update.greeting, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greetsync_core::{Greeting, GreetingStore};

    fn greeting(id: &str) -> Greeting {
        Greeting {
            id: id.into(),
            text: "hello".into(),
            ..Greeting::default()
        }
    }

    #[test]
    fn fresh_update_reports_each_staged_update_once() {
        let store = GreetingStore::new(10);
        store.insert(greeting("g1"));
        let id = GreetingId::from("g1");

        assert!(fresh_update(&store.snapshot(), &id, None).is_none());

        store.register_pending_update(PendingUpdate::new(
            greeting("g1"),
            UpdateReason::Update,
            None,
        ));
        let first = fresh_update(&store.snapshot(), &id, None);
        assert!(first.is_some());
        assert!(fresh_update(&store.snapshot(), &id, first.as_ref()).is_none());

        store.register_pending_update(PendingUpdate::new(
            greeting("g1"),
            UpdateReason::Delete,
            None,
        ));
        let second = fresh_update(&store.snapshot(), &id, first.as_ref());
        assert_eq!(second.map(|u| u.reason), Some(UpdateReason::Delete));
    }
}
