//! Greeting command handlers.

use std::sync::Arc;

use tabled::Tabled;

use greetsync_core::{Author, Greeting, GreetingClient, GreetingDraft, GreetingId};

use crate::cli::{GlobalOpts, ListArgs};
use crate::error::CliError;
use crate::output::{self, Renderer};

use super::util;

// ── Table row ────────────────────────────────────────────────────────

#[derive(Tabled)]
pub(crate) struct GreetingRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Text")]
    text: String,
    #[tabled(rename = "Variant")]
    variant: String,
    #[tabled(rename = "Author")]
    author: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl GreetingRow {
    pub(crate) fn new(g: &Greeting, color: bool) -> Self {
        Self {
            id: output::dim(g.id.as_str(), color),
            text: g.text.clone(),
            variant: output::paint_variant(g.variant.as_deref().unwrap_or("-"), color),
            author: g.author.as_ref().map(Author::name).unwrap_or_default(),
            updated: g
                .recency()
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
        }
    }
}

fn detail(g: &Greeting, color: bool) -> String {
    let mut lines = vec![
        format!("ID:       {}", g.id),
        format!("Text:     {}", g.text),
    ];
    if let Some(ref variant) = g.variant {
        lines.push(format!("Variant:  {}", output::paint_variant(variant, color)));
    }
    if let Some(ref author) = g.author {
        lines.push(format!("Author:   {}", author.name()));
    }
    if let Some(ref editor) = g.updated_by {
        lines.push(format!("Edited:   {}", editor.name()));
    }
    if let Some(created) = g.created_at {
        lines.push(format!("Created:  {}", created.to_rfc3339()));
    }
    if let Some(updated) = g.updated_at {
        lines.push(format!("Updated:  {}", updated.to_rfc3339()));
    }
    lines.join("\n")
}

pub(crate) fn print_list(greetings: &[Arc<Greeting>], out: &Renderer) {
    out.list(greetings, |g, color| GreetingRow::new(g, color), |g| g.id.to_string());
}

pub(crate) fn print_greeting(greeting: &Greeting, out: &Renderer) {
    out.one(greeting, detail, |g| g.id.to_string());
}

// ── Handlers ─────────────────────────────────────────────────────────

pub async fn list(
    client: &GreetingClient,
    args: ListArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let limit = args.limit.unwrap_or(client.config().list_limit);
    if limit == 0 {
        return Err(CliError::Validation {
            field: "limit".into(),
            reason: "must be at least 1".into(),
        });
    }
    let greetings = client.load_greetings(limit, args.offset).await?;
    print_list(&greetings, &Renderer::new(global));
    Ok(())
}

pub async fn show(client: &GreetingClient, id: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let greeting = client.load_greeting(&GreetingId::from(id)).await?;
    print_greeting(&greeting, &Renderer::new(global));
    Ok(())
}

pub async fn create(
    client: &GreetingClient,
    text: String,
    variant: Option<String>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let draft = GreetingDraft {
        text,
        variant,
        ..GreetingDraft::default()
    };
    let greeting = client.create_greeting(&draft).await?;
    let out = Renderer::new(global);
    out.note("Greeting created");
    print_greeting(&greeting, &out);
    Ok(())
}

pub async fn update(
    client: &GreetingClient,
    id: &str,
    text: Option<String>,
    variant: Option<String>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if text.is_none() && variant.is_none() {
        return Err(CliError::Validation {
            field: "update".into(),
            reason: "pass --text and/or --variant".into(),
        });
    }

    // Start from the server copy so untouched fields survive.
    let current = client.load_greeting(&GreetingId::from(id)).await?;
    let mut draft = GreetingDraft::from(&current);
    if let Some(text) = text {
        draft.text = text;
    }
    if variant.is_some() {
        draft.variant = variant;
    }

    let greeting = client.update_greeting(&draft).await?;
    let out = Renderer::new(global);
    out.note("Greeting updated");
    print_greeting(&greeting, &out);
    Ok(())
}

pub async fn delete(client: &GreetingClient, id: &str, global: &GlobalOpts) -> Result<(), CliError> {
    if !util::confirm(&format!("Delete greeting '{id}'?"), global.yes)? {
        return Ok(());
    }
    client.delete_greeting(&GreetingId::from(id)).await?;
    Renderer::new(global).note("Greeting deleted");
    Ok(())
}

pub async fn admin_greet(
    client: &GreetingClient,
    text: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let response = client.send_admin_greeting(text).await?;
    let out = Renderer::new(global);
    if out.is_structured() {
        out.one(&response, |_, _| String::new(), |_| String::new());
    } else {
        out.note("Admin greeting sent");
    }
    Ok(())
}
