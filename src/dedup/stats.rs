use std::collections::HashMap;

use serde::Serialize;

use crate::types::ResultRecord;

const MAX_CELL_CHARS: usize = 50;
const COLUMN_SEPARATOR: &str = " | ";

/// How often one title/description identity repeats within a result list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateStat {
    pub title: String,
    pub description: String,
    /// URL of the first occurrence.
    pub url: String,
    /// Occurrences beyond the first.
    pub duplicates: usize,
}

/// One entry per distinct identity, in order of first appearance.
pub fn duplicate_stats(results: &[ResultRecord]) -> Vec<DuplicateStat> {
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut stats: Vec<DuplicateStat> = Vec::new();
    for record in results {
        match index.get(&record.identity()) {
            Some(&i) => stats[i].duplicates += 1,
            None => {
                index.insert(record.identity(), stats.len());
                stats.push(DuplicateStat {
                    title: record.title.clone(),
                    description: record.description.clone(),
                    url: record.url.clone(),
                    duplicates: 0,
                });
            }
        }
    }
    stats
}

fn truncate_cell(value: &str) -> String {
    if value.chars().count() <= MAX_CELL_CHARS {
        value.to_string()
    } else {
        let mut cell: String = value.chars().take(MAX_CELL_CHARS - 1).collect();
        cell.push('…');
        cell
    }
}

/// Plain-text table of [`duplicate_stats`] for diagnostic logging. Empty
/// input renders as an empty string.
pub fn duplicate_stats_table(results: &[ResultRecord]) -> String {
    if results.is_empty() {
        return String::new();
    }

    let header = ["TITLE", "DESCRIPTION", "URL", "DUPLICATES"].map(String::from);
    let rows: Vec<[String; 4]> = duplicate_stats(results)
        .iter()
        .map(|s| {
            [
                truncate_cell(&s.title),
                truncate_cell(&s.description),
                truncate_cell(&s.url),
                s.duplicates.to_string(),
            ]
        })
        .collect();

    let mut widths = header.clone().map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    std::iter::once(&header)
        .chain(&rows)
        .map(|row| {
            let cells: Vec<String> = row
                .iter()
                .zip(widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect();
            cells.join(COLUMN_SEPARATOR).trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
