use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveTime;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::item::Item;
use crate::store::ItemStore;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    /// Prints the list in display order; times already past today are red.
    #[tracing::instrument(skip(self, store))]
    pub fn print_item_table(&mut self, store: &ItemStore, now: NaiveTime) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if store.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = vec![
            "#".to_string(),
            "At".to_string(),
            "Title".to_string(),
            "Description".to_string(),
        ];

        let rows = store
            .list()
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                let at = item.scheduled.format("%H:%M").to_string();
                let at = if item.scheduled < now { self.paint(&at, "31") } else { at };
                vec![
                    self.paint(&(idx + 1).to_string(), "33"),
                    at,
                    item.title.clone(),
                    item.description.clone(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, item))]
    pub fn print_item_info(&mut self, position: usize, item: &Item) -> anyhow::Result<()> {
        write_item_info(io::stdout().lock(), position, item)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// `position` is the 1-based display index.
fn write_item_info<W: Write>(mut writer: W, position: usize, item: &Item) -> anyhow::Result<()> {
    writeln!(writer, "#         {position}")?;
    writeln!(writer, "id        {}", item.id)?;
    writeln!(writer, "title     {}", item.title)?;
    writeln!(writer, "desc      {}", item.description)?;
    writeln!(writer, "at        {}", item.scheduled.format("%H:%M"))?;
    writeln!(writer, "entry     {}", item.entry.format("%Y-%m-%d %H:%M:%SZ"))?;
    writeln!(writer, "modified  {}", item.modified.format("%Y-%m-%d %H:%M:%SZ"))?;
    Ok(())
}

fn write_table<W: Write>(mut writer: W, headers: Vec<String>, rows: Vec<Vec<String>>) -> anyhow::Result<()> {
    let mut widths: Vec<usize> = headers.iter().map(|header| visible_width(header)).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(visible_width(cell));
        }
    }

    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    for line in std::iter::once(&headers).chain(std::iter::once(&rule)).chain(rows.iter()) {
        let mut text = String::new();
        for (cell, width) in line.iter().zip(&widths) {
            text.push_str(cell);
            text.push_str(&" ".repeat(width.saturating_sub(visible_width(cell)) + 1));
        }
        writeln!(writer, "{}", text.trim_end())?;
    }

    Ok(())
}

fn visible_width(cell: &str) -> usize {
    UnicodeWidthStr::width(strip_ansi(cell).as_str())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        match (escaped, ch) {
            (true, 'm') => escaped = false,
            (true, _) => {}
            (false, '\x1b') => escaped = true,
            (false, ch) => out.push(ch),
        }
    }

    out
}
