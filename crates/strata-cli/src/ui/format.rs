//! Formatting utilities for sizes, durations, and build summaries.

use console::Term;
use owo_colors::{OwoColorize, Stream};
use std::time::Duration;
use strata_bundler::BuildResult;

use super::is_quiet;

/// Format file size in human-readable format.
///
/// ```
/// use strata_cli::ui::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(500), "500 B");
/// assert_eq!(format_size(1024), "1.00 KB");
/// assert_eq!(format_size(1_048_576), "1.00 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Format duration in human-readable format.
///
/// ```
/// use std::time::Duration;
/// use strata_cli::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();

    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// One row per chunk: name, file, size and whether it came from the cache.
fn summary_rows(result: &BuildResult) -> Vec<(String, String, u64, bool)> {
    result
        .chunks()
        .iter()
        .map(|output| {
            let size = result
                .artifact(&output.file_name)
                .map(|artifact| artifact.size() as u64)
                .unwrap_or(0);
            (
                output.chunk.name().to_string(),
                output.file_name.clone(),
                size,
                output.cached,
            )
        })
        .collect()
}

/// Cache line of the summary, e.g. `3 cached, 1 rebuilt`.
pub(crate) fn cache_line(hits: usize, misses: usize, corruptions: usize) -> String {
    let mut line = format!("{hits} cached, {misses} rebuilt");
    if corruptions > 0 {
        line.push_str(&format!(", {corruptions} corrupted cache records recomputed"));
    }
    line
}

/// Print a build summary table to stderr.
pub fn print_build_summary(result: &BuildResult) {
    if is_quiet() {
        return;
    }

    let width = (Term::stderr().size().1 as usize).min(80);
    let stats = result.stats();

    eprintln!(
        "\n{}",
        "Build Summary".if_supports_color(Stream::Stderr, |s| s.bold())
    );
    eprintln!("{}", "─".repeat(width));

    for (name, file_name, size, cached) in summary_rows(result) {
        let marker = if cached { "cached" } else { "built" };
        eprintln!(
            "  {} {} {} {} {}",
            "▸".if_supports_color(Stream::Stderr, |s| s.blue()),
            name.if_supports_color(Stream::Stderr, |s| s.bold()),
            file_name.if_supports_color(Stream::Stderr, |s| s.dimmed()),
            format_size(size).if_supports_color(Stream::Stderr, |s| s.dimmed()),
            format!("({marker})").if_supports_color(Stream::Stderr, |s| s.dimmed())
        );
    }

    eprintln!("{}", "─".repeat(width));
    eprintln!(
        "  {} {} chunks, {} modules, {} in {}",
        "Total:".if_supports_color(Stream::Stderr, |s| s.bold()),
        stats.chunks,
        stats.modules,
        format_size(stats.bytes).if_supports_color(Stream::Stderr, |s| s.green()),
        format_duration(stats.duration).if_supports_color(Stream::Stderr, |s| s.green())
    );
    eprintln!(
        "  {} {}",
        "Cache:".if_supports_color(Stream::Stderr, |s| s.bold()),
        cache_line(stats.cache_hits, stats.cache_misses, stats.cache_corruptions)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_bundler::{BuildContext, BuildOptions, PartitionPolicy};
    use strata_graph::{Module, ModuleGraph, ModuleId};

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1_572_864), "1.50 MB");
        assert_eq!(format_size(2_147_483_648), "2.00 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(0)), "0ms");
        assert_eq!(format_duration(Duration::from_millis(999)), "999ms");
        assert_eq!(format_duration(Duration::from_millis(1000)), "1.00s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn test_cache_line() {
        assert_eq!(cache_line(3, 1, 0), "3 cached, 1 rebuilt");
        assert!(cache_line(0, 2, 1).ends_with("1 corrupted cache records recomputed"));
    }

    #[test]
    fn test_summary_rows_follow_chunks() {
        let main = ModuleId::new("src/main.js").unwrap();
        let graph = ModuleGraph::builder()
            .module(Module::builder(main.clone(), "console.log(1);").build())
            .entry("main", main)
            .build()
            .unwrap();
        let policy = PartitionPolicy::from_graph(&graph);
        let result = BuildContext::new(graph, policy, BuildOptions::development())
            .build()
            .unwrap();

        let rows = summary_rows(&result);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "entry:main");
        assert!(rows[0].1.starts_with("entry-"));
        assert!(rows[0].2 > 0);
        assert!(!rows[0].3);
    }
}
