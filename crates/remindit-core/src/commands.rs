use std::io::{self, BufRead, Read};
use std::path::Path;

use anyhow::{Context, anyhow};
use chrono::{TimeDelta, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::cli::Command;
use crate::clock::{ReminderZone, parse_time_of_day};
use crate::config::Config;
use crate::datastore::DataStore;
use crate::identity::{LoginFlow, SessionFile, TokenPair, open_in_browser};
use crate::item::{Item, ItemPatch};
use crate::notify::{Notifier, Urgency};
use crate::render::Renderer;
use crate::reorder::{DropOutcome, ReorderTuning};
use crate::replay::{self, RowLayout};
use crate::store::ItemStore;

#[instrument(skip(datastore, cfg, renderer, command))]
pub fn dispatch(
    datastore: &DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    command: Command,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching");
    match command {
        Command::Add {
            title,
            description,
            at,
        } => cmd_add(datastore, title, description, &at),
        Command::List => cmd_list(datastore, cfg, renderer),
        Command::Info { item } => cmd_info(datastore, renderer, &item),
        Command::Edit {
            item,
            title,
            description,
            at,
        } => {
            let patch = ItemPatch {
                title,
                description,
                scheduled: at.as_deref().map(parse_time_of_day).transpose()?,
            };
            cmd_edit(datastore, &item, patch)
        }
        Command::Delete { item } => cmd_delete(datastore, &item),
        Command::Move { item, position } => cmd_move(datastore, &item, position),
        Command::Drag { script, dry_run } => cmd_drag(datastore, cfg, renderer, &script, dry_run),
        Command::Remind { window_minutes } => cmd_remind(datastore, cfg, window_minutes),
        Command::Notify {
            title,
            message,
            urgency,
        } => cmd_notify(cfg, title, message, urgency.as_deref()),
        Command::Login { tokens, no_browser } => cmd_login(datastore, cfg, tokens.as_deref(), no_browser),
        Command::Logout => cmd_logout(datastore, cfg),
        Command::Session => cmd_session(datastore, cfg),
    }
}

/// Finds an item by 1-based display position or by a unique id prefix. An
/// all-digit token that is not a valid position is tried as a prefix.
pub fn resolve_item(store: &ItemStore, token: &str) -> anyhow::Result<Uuid> {
    let token = token.trim();
    if let Some(item) = token
        .parse::<usize>()
        .ok()
        .and_then(|position| position.checked_sub(1))
        .and_then(|idx| store.list().get(idx))
    {
        return Ok(item.id);
    }

    let needle = token.to_ascii_lowercase();
    let mut matches = store
        .ids()
        .filter(|id| id.to_string().starts_with(&needle));
    match (matches.next(), matches.next()) {
        (Some(id), None) if !needle.is_empty() => Ok(id),
        (Some(_), Some(_)) => Err(anyhow!("task id prefix {token} is ambiguous")),
        _ => Err(anyhow!("no task at position or with id prefix {token}")),
    }
}

fn cmd_add(datastore: &DataStore, title: String, description: String, at: &str) -> anyhow::Result<()> {
    if title.trim().is_empty() {
        return Err(anyhow!("title must not be empty"));
    }
    let scheduled = parse_time_of_day(at)?;

    let mut store = datastore.load_items()?;
    let item = Item::new(title, description, scheduled, Utc::now());
    let id = item.id;
    store.append(item)?;
    datastore.save_items(&store)?;

    info!(%id, "added task");
    println!("Created task {}.", store.len());
    Ok(())
}

fn cmd_list(datastore: &DataStore, cfg: &Config, renderer: &mut Renderer) -> anyhow::Result<()> {
    let store = datastore.load_items()?;
    let now = ReminderZone::from_config(cfg)?.time_of_day(Utc::now());
    renderer.print_item_table(&store, now)
}

fn cmd_info(datastore: &DataStore, renderer: &mut Renderer, token: &str) -> anyhow::Result<()> {
    let store = datastore.load_items()?;
    let id = resolve_item(&store, token)?;
    let position = store.position(id).ok_or_else(|| anyhow!("task {id} vanished"))?;
    let item = store.get(id).ok_or_else(|| anyhow!("task {id} vanished"))?;
    renderer.print_item_info(position + 1, item)
}

fn cmd_edit(datastore: &DataStore, token: &str, patch: ItemPatch) -> anyhow::Result<()> {
    if patch.is_empty() {
        return Err(anyhow!("nothing to edit; pass --title, --description or --at"));
    }

    let mut store = datastore.load_items()?;
    let id = resolve_item(&store, token)?;
    let title = store.update(id, &patch, Utc::now())?.title.clone();
    datastore.save_items(&store)?;

    println!("Modified task '{title}'.");
    Ok(())
}

fn cmd_delete(datastore: &DataStore, token: &str) -> anyhow::Result<()> {
    let mut store = datastore.load_items()?;
    let id = resolve_item(&store, token)?;
    let removed = store.remove(id)?;
    datastore.save_items(&store)?;

    info!(%id, "deleted task");
    println!("Deleted task '{}'.", removed.title);
    Ok(())
}

fn cmd_move(datastore: &DataStore, token: &str, position: usize) -> anyhow::Result<()> {
    let target = position
        .checked_sub(1)
        .ok_or_else(|| anyhow!("positions start at 1"))?;

    let mut store = datastore.load_items()?;
    let id = resolve_item(&store, token)?;
    let moved = store.reorder(id, target)?;
    if moved.from != moved.to {
        datastore.save_items(&store)?;
    }

    println!("Moved task from {} to {}.", moved.from + 1, moved.to + 1);
    Ok(())
}

fn cmd_drag(
    datastore: &DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    script: &Path,
    dry_run: bool,
) -> anyhow::Result<()> {
    let events = replay::load_script(script)?;
    let tuning = ReorderTuning::from_config(cfg)?;
    let layout = RowLayout::from_config(cfg)?;
    let viewport_height = cfg.get_f32("layout.viewport_height")?.unwrap_or(400.0);

    let mut store = datastore.load_items()?;
    let summary = replay::run(&mut store, tuning, layout, viewport_height, &events)?;

    for outcome in &summary.outcomes {
        match outcome {
            DropOutcome::Committed { from, to, .. } => {
                println!("Dropped task {} at position {}.", from + 1, to + 1)
            }
            DropOutcome::Cancelled(reason) => println!("Drag cancelled ({reason:?})."),
            DropOutcome::NoSession => debug!("release without a drag"),
        }
    }

    if summary.committed() && !dry_run {
        datastore.save_items(&store)?;
    }

    let now = ReminderZone::from_config(cfg)?.time_of_day(Utc::now());
    renderer.print_item_table(&store, now)
}

fn cmd_remind(datastore: &DataStore, cfg: &Config, window_minutes: Option<u64>) -> anyhow::Result<()> {
    let window_minutes = match window_minutes {
        Some(minutes) => minutes,
        None => cfg.get_u64("reminder.window_minutes")?.unwrap_or(1),
    };
    let window = TimeDelta::try_minutes(i64::try_from(window_minutes)?)
        .ok_or_else(|| anyhow!("reminder window too large: {window_minutes} minutes"))?;

    let now = ReminderZone::from_config(cfg)?.time_of_day(Utc::now());
    let store = datastore.load_items()?;
    let notifier = Notifier::from_config(cfg)?;

    let mut sent = 0usize;
    for item in store.list().iter().filter(|item| item.is_due(now, window)) {
        let message = if item.description.trim().is_empty() {
            format!("Scheduled for {}", item.scheduled.format("%H:%M"))
        } else {
            item.description.clone()
        };
        if let Err(err) = notifier.notify(&notifier.compose(item.title.clone(), message)) {
            warn!(error = %err, id = %item.id, "reminder not delivered");
            continue;
        }
        sent += 1;
    }

    info!(sent, window_minutes, "reminders processed");
    println!("Sent {sent} reminder(s).");
    Ok(())
}

fn cmd_notify(cfg: &Config, title: String, message: String, urgency: Option<&str>) -> anyhow::Result<()> {
    let notifier = Notifier::from_config(cfg)?;
    let mut notification = notifier.compose(title, message);
    if let Some(raw) = urgency {
        notification.urgency = raw.parse::<Urgency>()?;
    }
    notifier.notify(&notification)
}

fn cmd_login(datastore: &DataStore, cfg: &Config, tokens: Option<&Path>, no_browser: bool) -> anyhow::Result<()> {
    let session = SessionFile::from_config(cfg, &datastore.data_dir);
    if tokens.is_none() && session.has_valid_session() {
        println!("Already logged in.");
        return Ok(());
    }

    let mut flow = LoginFlow::begin(cfg, session, |pair: &TokenPair| {
        debug!(access_len = pair.access_token.len(), "session established");
        println!("Logged in.");
    })?;

    let body = match tokens {
        Some(path) => read_callback_body(path)?,
        None => {
            println!("Open this URL to sign in:\n{}", flow.authorize_url());
            if !no_browser
                && let Err(err) = open_in_browser(cfg, flow.authorize_url())
            {
                warn!(error = %err, "could not open a browser");
            }
            println!("Paste the token callback body:");
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            line
        }
    };

    flow.receive_tokens(&body)?;
    Ok(())
}

fn read_callback_body(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut body = String::new();
        io::stdin().read_to_string(&mut body)?;
        return Ok(body);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed reading {}", path.display()))
}

fn cmd_logout(datastore: &DataStore, cfg: &Config) -> anyhow::Result<()> {
    let session = SessionFile::from_config(cfg, &datastore.data_dir);
    if session.clear()? {
        println!("Logged out.");
    } else {
        println!("No session to clear.");
    }
    Ok(())
}

fn cmd_session(datastore: &DataStore, cfg: &Config) -> anyhow::Result<()> {
    let session = SessionFile::from_config(cfg, &datastore.data_dir);
    if session.has_valid_session() {
        println!("Logged in ({}).", session.path().display());
    } else {
        println!("Not logged in.");
    }
    Ok(())
}
