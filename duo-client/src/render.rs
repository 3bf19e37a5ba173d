//! Plain-text rendering of the session screens

use duo_common::hypothesis::Side;
use duo_common::reconcile::ReconciledSample;
use duo_common::scenarios;
use duo_common::session::{Briefing, Interaction, ParticipantStatus, Session, Stage};
use duo_common::wire::Scores;
use duo_common::FdHypothesis;
use serde_json::Value;
use std::fmt::Write;

const HELP: &str = "\
Commands:
  email <address>          start or resume the study
  show                     redraw the current screen
  lhs <col>, <col>...      put columns on the left-hand side
  rhs <col>, <col>...      put columns on the right-hand side
  unknown                  toggle \"I don't know\"
  comment <text>           comment on the hypothesis
  continue                 confirm the briefing and start the scenario
  toggle <row> <col>       mark/unmark a cell (also <row>_<col>)
  sort <col>               sort by a column (click again to flip)
  next                     submit feedback and get the next sample
  refresh                  get a new sample without submitting new feedback
  done                     finish the current scenario
  comments <text> | skip   final comments on the study
  quit                     leave";

pub fn help() -> &'static str {
    HELP
}

/// Cell text with the marked suffix
fn cell(value: &str, marked: bool) -> String {
    if marked {
        format!("[{}]*", value)
    } else {
        value.to_string()
    }
}

/// Sample table in display order
///
/// The header carries each column's sort indicator; marked cells render as
/// `[value]*`.
pub fn grid(sample: &ReconciledSample) -> String {
    let columns = sample.display_columns();
    let sort = sample.sort_state();

    let mut table: Vec<Vec<String>> = Vec::with_capacity(sample.len() + 1);
    let mut header = vec!["#".to_string()];
    header.extend(
        columns
            .iter()
            .map(|c| format!("{} {}", c.key(), sort.direction(c.key()).indicator())),
    );
    table.push(header);

    for (position, row) in sample.rows().enumerate() {
        let mut line = vec![position.to_string()];
        for column in &columns {
            let marked = sample
                .feedback_map()
                .get(row.id(), column.key())
                .unwrap_or(false);
            line.push(cell(row.value(column), marked));
        }
        table.push(line);
    }

    let widths: Vec<usize> = (0..table[0].len())
        .map(|i| table.iter().map(|r| r[i].chars().count()).max().unwrap_or(0))
        .collect();

    let mut out = String::new();
    for (i, line) in table.iter().enumerate() {
        let padded: Vec<String> = line
            .iter()
            .zip(&widths)
            .map(|(text, width)| format!("{:<width$}", text, width = *width))
            .collect();
        let _ = writeln!(out, "{}", padded.join(" | ").trim_end());
        if i == 0 {
            let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            let _ = writeln!(out, "{}", rule.join("-+-"));
        }
    }
    out
}

fn score(value: &Option<Value>) -> String {
    match value {
        None => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Scores table; empty until the backend has reported any
pub fn scores(s: &Scores) -> String {
    if s.true_pos.is_none() && s.false_pos.is_none() {
        return String::new();
    }
    let mut out = String::new();
    let _ = writeln!(out, "Your Scores");
    let _ = writeln!(out, "  True Positives:  {}", score(&s.true_pos));
    let _ = writeln!(out, "  False Positives: {}", score(&s.false_pos));
    out
}

pub fn hypothesis(h: &FdHypothesis) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Hypothesis: {}", h);
    if !h.is_unknown() {
        let _ = writeln!(out, "  LHS options: {}", h.options_for(Side::Lhs).join(", "));
        let _ = writeln!(out, "  RHS options: {}", h.options_for(Side::Rhs).join(", "));
    }
    if !h.comment().is_empty() {
        let _ = writeln!(out, "  Comment: {}", h.comment());
    }
    out
}

pub fn briefing(b: &Briefing, participant: Option<ParticipantStatus>) -> String {
    let details = scenarios::details(b.scenario);
    let mut out = String::new();
    if participant == Some(ParticipantStatus::Returning) {
        let _ = writeln!(out, "Welcome back! Picking up where you left off.\n");
    }
    let _ = writeln!(out, "Scenario {} ({} data)", b.scenario, details.domain);
    let _ = writeln!(out, "{}", details.info);
    if let Some(note) = details.note {
        let _ = writeln!(out, "Note: {}", note);
    }
    match &b.header {
        Some(header) => {
            let labels: Vec<&str> = header.keys().collect();
            let _ = writeln!(out, "\nAttributes: {}", labels.join(", "));
            out.push_str(&hypothesis(&b.hypothesis));
            let _ = writeln!(
                out,
                "State your first guess with lhs/rhs (or `unknown`), then `continue`."
            );
        }
        None => {
            let _ = writeln!(out, "\nLoading attributes...");
        }
    }
    out
}

pub fn interaction(i: &Interaction, can_finish: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Scenario {} | project {} | sample {}",
        i.scenario, i.project_id, i.iterations
    );
    if let Some(description) = &i.description {
        let _ = writeln!(out, "{}", description);
    }
    match &i.grid {
        Some(sample) => {
            out.push('\n');
            out.push_str(&grid(sample));
            let _ = writeln!(
                out,
                "{} of {} cells marked",
                sample.feedback_map().marked_count(),
                sample.feedback_map().cell_count()
            );
        }
        None => {
            let _ = writeln!(out, "\nWaiting for a sample (`refresh` to retry)");
        }
    }
    out.push_str(&scores(&i.scores));
    out.push('\n');
    out.push_str(&hypothesis(&i.hypothesis));
    if can_finish {
        let _ = writeln!(out, "You may finish this scenario with `done`.");
    }
    out
}

/// Current screen
pub fn screen(session: &Session) -> String {
    let mut out = match session.stage() {
        Stage::Welcome => "Welcome! Enter `email <address>` to begin.\n".to_string(),
        Stage::Briefing(b) => briefing(b, session.participant()),
        Stage::Interact(i) => interaction(i, session.can_finish_scenario()),
        Stage::Completion => {
            "All scenarios complete. Leave final thoughts with `comments <text>`, or `skip`.\n"
                .to_string()
        }
        Stage::Finished => "Thank you for participating!\n".to_string(),
    };
    if let Some(endpoint) = session.pending() {
        let _ = writeln!(out, "(waiting on {})", endpoint);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use duo_common::feedback::{FeedbackRecord, MissingFeedbackPolicy};
    use duo_common::sample::{RawSample, RowId, SampleLayout};
    use duo_common::Header;
    use serde_json::json;

    fn sample() -> ReconciledSample {
        let raw = RawSample::from_value(json!({
            "0": {"id": 1, "name": "Ann", "city": "Oslo"},
            "1": {"id": 2, "name": "Bob", "city": null}
        }))
        .unwrap();
        let records = vec![
            FeedbackRecord::new(RowId::new("1"), "id", false),
            FeedbackRecord::new(RowId::new("1"), "name", false),
            FeedbackRecord::new(RowId::new("1"), "city", true),
            FeedbackRecord::new(RowId::new("2"), "id", false),
            FeedbackRecord::new(RowId::new("2"), "name", false),
            FeedbackRecord::new(RowId::new("2"), "city", false),
        ];
        ReconciledSample::reconcile(
            &raw,
            records,
            Header::new(["id", "name", "city"]),
            SampleLayout::interact(),
            MissingFeedbackPolicy::Strict,
        )
        .unwrap()
    }

    #[test]
    fn test_grid_hides_id_and_marks_cells() {
        let text = grid(&sample());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "# | name - | city -");
        assert!(lines[2].contains("[Oslo]*"));
        assert!(!lines[0].contains("id"));
    }

    #[test]
    fn test_grid_shows_sort_indicator() {
        let mut s = sample();
        s.click_sort("name").unwrap();
        s.click_sort("name").unwrap();
        let text = grid(&s);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].contains("name v"));
        assert!(lines[2].starts_with("0 | Bob"));
    }

    #[test]
    fn test_marked_null_cell_is_highlighted() {
        let raw = RawSample::from_value(json!({"0": {"id": "7", "A": "1", "B": null}})).unwrap();
        let records = vec![
            FeedbackRecord::new(RowId::new("7"), "A", false),
            FeedbackRecord::new(RowId::new("7"), "B", true),
        ];
        let sample = ReconciledSample::reconcile(
            &raw,
            records,
            Header::new(["id", "A", "B"]),
            SampleLayout::interact().without_id_feedback(),
            MissingFeedbackPolicy::Strict,
        )
        .unwrap();
        let text = grid(&sample);
        assert_eq!(text.lines().nth(2), Some("0 | 1   | []*"));
    }

    #[test]
    fn test_scores_table() {
        assert_eq!(scores(&Scores::default()), "");
        let text = scores(&Scores {
            true_pos: Some(json!(4)),
            false_pos: Some(json!("2")),
        });
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Your Scores");
        assert_eq!(lines[1], "  True Positives:  4");
        assert_eq!(lines[2], "  False Positives: 2");

        let partial = scores(&Scores {
            true_pos: Some(json!(0)),
            false_pos: None,
        });
        assert!(partial.contains("False Positives: -"));
    }

    #[test]
    fn test_interaction_screen_shows_scores() {
        let grid = sample();
        let current = Interaction {
            scenario: 8,
            project_id: "42".to_string(),
            description: None,
            header: grid.header().clone(),
            hypothesis: FdHypothesis::new(grid.header()),
            grid: Some(grid),
            iterations: 3,
            scores: Scores {
                true_pos: Some(json!(5)),
                false_pos: Some(json!(1)),
            },
            last_message: None,
            finishing: false,
        };
        let text = interaction(&current, false);
        assert!(text.contains("Your Scores"));
        assert!(text.contains("True Positives:  5"));
        assert!(text.contains("False Positives: 1"));
    }
}
