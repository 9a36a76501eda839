use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::stats::TaskStats;
use crate::task::{Priority, Task};
use crate::view::DisplayTask;

const ID_PREVIEW_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.color() && io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, rows))]
    pub fn print_task_table(&self, rows: &[DisplayTask]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_task_table(&mut out, rows)
    }

    pub fn write_task_table<W: Write>(&self, mut out: W, rows: &[DisplayTask]) -> anyhow::Result<()> {
        if rows.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = vec![
            "#".to_string(),
            "ID".to_string(),
            "Done".to_string(),
            "Pri".to_string(),
            "Due".to_string(),
            "Category".to_string(),
            "Task".to_string(),
        ];

        let mut table = Vec::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            let task = &row.task;
            let position = self.paint(&(idx + 1).to_string(), "33");
            let id = task.id.chars().take(ID_PREVIEW_LEN).collect::<String>();
            let done = if task.done { "[x]" } else { "[ ]" }.to_string();
            let priority = self.paint_priority(&task.priority);
            let due = row.formatted_due_date.clone().unwrap_or_default();
            let due = if row.is_overdue { self.paint(&due, "31") } else { due };
            let category = task.category.clone().unwrap_or_default();

            table.push(vec![position, id, done, priority, due, category, task.text.clone()]);
        }

        write_table(&mut out, headers, table)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task))]
    pub fn print_task_info(&self, task: &Task) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id          {}", task.id)?;
        writeln!(out, "text        {}", task.text)?;
        writeln!(
            out,
            "description {}",
            task.description.clone().unwrap_or_default()
        )?;
        writeln!(
            out,
            "category    {}",
            task.category.clone().unwrap_or_default()
        )?;
        writeln!(out, "priority    {}", task.priority)?;
        writeln!(out, "done        {}", task.done)?;
        if let Some(due) = task.due_date {
            writeln!(out, "due         {}", due.to_rfc3339())?;
        }
        if let Some(created) = task.created_at {
            writeln!(out, "created     {}", created.to_rfc3339())?;
        }
        if let Some(updated) = task.updated_at {
            writeln!(out, "updated     {}", updated.to_rfc3339())?;
        }

        Ok(())
    }

    pub fn print_stats(&self, stats: &TaskStats) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_stats(&mut out, stats)
    }

    pub fn write_stats<W: Write>(&self, mut out: W, stats: &TaskStats) -> anyhow::Result<()> {
        writeln!(out, "total       {}", stats.total)?;
        writeln!(out, "completed   {}", stats.completed)?;
        writeln!(out, "pending     {}", stats.pending)?;
        let overdue = stats.overdue.to_string();
        let overdue = if stats.overdue > 0 {
            self.paint(&overdue, "31")
        } else {
            overdue
        };
        writeln!(out, "overdue     {overdue}")?;
        writeln!(
            out,
            "progress    {} {}%",
            progress_bar(stats.completion_percentage),
            stats.completion_percentage
        )?;

        // Breakdown only matters while something is still open.
        if stats.pending > 0 && !stats.pending_by_priority.is_empty() {
            writeln!(out, "pending by priority")?;
            for (priority, count) in [
                (Priority::High, stats.pending_by_priority.high),
                (Priority::Medium, stats.pending_by_priority.medium),
                (Priority::Low, stats.pending_by_priority.low),
            ] {
                if count > 0 {
                    writeln!(out, "  {:<8}  {count}", self.paint_priority(&priority))?;
                }
            }
        }
        Ok(())
    }

    pub fn print_categories(&self, categories: &[String], suggested: &[&str]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if categories.is_empty() {
            writeln!(out, "No categories.")?;
        }
        for category in categories {
            writeln!(out, "{category}")?;
        }

        let unused: Vec<&str> = suggested
            .iter()
            .copied()
            .filter(|s| !categories.iter().any(|c| c.as_str() == *s))
            .collect();
        if !unused.is_empty() {
            writeln!(out, "suggested: {}", unused.join(", "))?;
        }
        Ok(())
    }

    fn paint_priority(&self, priority: &Priority) -> String {
        let code = match priority {
            Priority::High => "31",
            Priority::Medium => "33",
            Priority::Low => "36",
            Priority::Other(_) => "2",
        };
        self.paint(priority.as_str(), code)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn progress_bar(pct: u8) -> String {
    let filled = usize::from(pct.min(100)) / 5;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(20 - filled))
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
