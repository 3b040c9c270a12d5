//! Human-readable rendering of run state for the CLI.

use crate::model::{Outcome, RunSnapshot, Summary};

const BAR_WIDTH: usize = 30;

/// Single progress line, e.g. `[#########.....]  3/10 (30%)  ok 2  err 1`.
pub fn format_progress(summary: &Summary) -> String {
    let fraction = summary.completion_fraction();
    let filled = ((fraction * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    format!(
        "[{}{}] {:>3}/{} ({:.0}%)  ok {}  err {}",
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        summary.completed,
        summary.total,
        fraction * 100.0,
        summary.succeeded,
        summary.failed,
    )
}

/// One row per outcome. Success rows show the invoice number and grand
/// total from the payload, error rows show the cause.
pub fn format_outcome(outcome: &Outcome) -> String {
    let head = format!(
        "Request #{:<3} {:<7} {} | {}ms",
        outcome.id, outcome.status, outcome.timestamp, outcome.duration_ms
    );

    if outcome.is_success() {
        let invoice = outcome
            .payload_field("fatura_no")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("N/A");
        let total = outcome
            .payload_field("genel_toplam")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        format!("{}  Fatura: {}  Toplam: ₺{}", head, invoice, total)
    } else {
        format!("{}  {}", head, outcome.error.as_deref().unwrap_or(""))
    }
}

/// Statistics block followed by the sorted outcome rows.
pub fn format_report(snapshot: &RunSnapshot) -> String {
    let s = &snapshot.summary;
    let mut out = String::new();

    out.push_str("\n=== Load Test Summary ===\n");
    out.push_str(&format!("Total:          {}\n", s.total));
    out.push_str(&format!("Completed:      {}\n", s.completed));
    out.push_str(&format!("Succeeded:      {}\n", s.succeeded));
    out.push_str(&format!("Failed:         {}\n", s.failed));
    if s.is_finished() {
        out.push_str(&format!("Total time:     {} ms\n", snapshot.total_elapsed_ms));
    } else {
        out.push_str("Total time:     (incomplete)\n");
    }
    out.push_str(&format!("Average time:   {} ms\n", snapshot.average_duration_ms));
    out.push_str(&format_progress(s));
    out.push('\n');

    if snapshot.outcomes.is_empty() {
        out.push_str("\nNo results yet.\n");
    } else {
        out.push('\n');
        for outcome in &snapshot.outcomes {
            out.push_str(&format_outcome(outcome));
            out.push('\n');
        }
    }
    out
}
