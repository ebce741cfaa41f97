use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink, RefreshResult};
use crate::domain::Technique;
use crate::view::{DashboardView, format_grouped};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize)]
pub struct TechniqueEntry {
    pub code: &'static str,
    pub display_name: &'static str,
}

pub fn technique_entries() -> Vec<TechniqueEntry> {
    Technique::ALL
        .into_iter()
        .map(|technique| TechniqueEntry {
            code: technique.code(),
            display_name: technique.display_name(),
        })
        .collect()
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_view(view: &DashboardView) -> io::Result<()> {
        Self::print_json(view)
    }

    pub fn print_refresh(result: &RefreshResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_techniques() -> io::Result<()> {
        Self::print_json(&technique_entries())
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Human-readable output. Progress goes to stderr so stdout stays clean.
pub struct TextOutput;

impl TextOutput {
    pub fn print_view(view: &DashboardView) -> io::Result<()> {
        let mut out = io::stdout().lock();
        Self::write_view(&mut out, view)
    }

    pub fn write_view<W: Write>(out: &mut W, view: &DashboardView) -> io::Result<()> {
        let years = &view.selection.years;
        writeln!(out, "Structures released per year, {years}")?;

        let techniques = &view.selection.techniques;
        write!(out, "{:>6}", "Year")?;
        for technique in techniques {
            write!(out, " {:>16}", technique.code())?;
        }
        writeln!(out)?;
        for year in years.years() {
            write!(out, "{year:>6}")?;
            for technique in techniques {
                write!(
                    out,
                    " {:>16}",
                    format_grouped(view.dataset.count(year, *technique))
                )?;
            }
            writeln!(out)?;
        }

        writeln!(out)?;
        writeln!(
            out,
            "Structures determined in {}, changes from {}",
            years.high(),
            years.low()
        )?;
        for delta in &view.deltas {
            writeln!(
                out,
                "  {:<28} {:>12}  {}",
                format!("{} Structures", delta.technique),
                format_grouped(delta.last_count),
                delta.delta
            )?;
        }
        Ok(())
    }

    pub fn print_refresh(result: &RefreshResult) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "cache: {}", result.cache_path)?;
        writeln!(out, "years: {}", result.years)?;
        writeln!(
            out,
            "added {} of {} missing pairs; {} rows total",
            result.fetched_pairs, result.missing_pairs, result.rows
        )?;
        if !result.written {
            writeln!(out, "cache file unchanged")?;
        }
        for slice in &result.failed {
            let year = slice.year.map(|y| y.to_string()).unwrap_or_default();
            writeln!(out, "failed: {} {year}: {}", slice.technique, slice.error)?;
        }
        if !result.incomplete_years.is_empty() {
            let years = result
                .incomplete_years
                .iter()
                .map(|year| year.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(out, "incomplete years (retried next run): {years}")?;
        }
        for technique in &result.unlabelled_techniques {
            writeln!(out, "warning: no PDBe method label for {technique}; counts cached as 0")?;
        }
        Ok(())
    }

    pub fn print_techniques() -> io::Result<()> {
        let mut out = io::stdout().lock();
        for entry in technique_entries() {
            writeln!(out, "{:<18} {}", entry.code, entry.display_name)?;
        }
        Ok(())
    }
}

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("[{:>6.1}s] {}", elapsed.as_secs_f64(), event.message),
            None => eprintln!("          {}", event.message),
        }
    }
}
