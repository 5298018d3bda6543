// Reconciles remote sheet rows with the user's local overlay
use crate::store::{CompletedSet, EditsByDay};
use crate::{Day, WorkoutRow};

/// Completion id for the workout at `index` in `day`'s merged list.
pub fn completion_id(day: Day, index: usize) -> String {
    format!("{day}-{index}")
}

/// Parse a completion id back into its day and index.
pub fn parse_completion_id(id: &str) -> Option<(Day, usize)> {
    let (day, index) = id.rsplit_once('-')?;
    Some((Day::from_name(day)?, index.parse().ok()?))
}

/// Number of remote rows scheduled on `day`. Indices below this value refer
/// to remote-origin entries.
pub fn remote_count(day: Day, rows: &[WorkoutRow]) -> usize {
    rows.iter().filter(|r| r.day == Some(day)).count()
}

/// Merged workout list for a day: remote rows first, then local edits, each
/// in their original order.
pub fn get_day_data(day: Day, rows: &[WorkoutRow], edits: &EditsByDay) -> Vec<WorkoutRow> {
    rows.iter()
        .filter(|r| r.day == Some(day))
        .chain(edits.get(&day).into_iter().flatten())
        .cloned()
        .collect()
}

/// Percentage of `merged` marked complete, rounded to the nearest integer.
///
/// An empty list is 0% done.
pub fn compute_progress(day: Day, merged: &[WorkoutRow], completed: &CompletedSet) -> u8 {
    if merged.is_empty() {
        return 0;
    }
    let done = (0..merged.len())
        .filter(|&i| completed.contains(&completion_id(day, i)))
        .count();
    (100.0 * done as f64 / merged.len() as f64).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(day: Day, name: &str) -> WorkoutRow {
        WorkoutRow {
            day: Some(day),
            workout: name.into(),
            ..Default::default()
        }
    }

    fn sample_rows() -> Vec<WorkoutRow> {
        vec![
            row(Day::Monday, "Pushups"),
            row(Day::Wednesday, "Lunges"),
            row(Day::Monday, "Rows"),
            WorkoutRow {
                day: None,
                workout: "Stretch".into(),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn merged_length_is_remote_plus_local() {
        let rows = sample_rows();
        let mut edits = EditsByDay::new();
        edits.insert(Day::Monday, vec![row(Day::Monday, "Dips")]);

        for day in Day::ALL {
            let merged = get_day_data(day, &rows, &edits);
            let local = edits.get(&day).map_or(0, Vec::len);
            assert_eq!(merged.len(), remote_count(day, &rows) + local);
        }
    }

    #[test]
    fn remote_rows_come_first() {
        let rows = sample_rows();
        let mut edits = EditsByDay::new();
        edits.insert(Day::Monday, vec![row(Day::Monday, "Dips")]);
        let names: Vec<_> = get_day_data(Day::Monday, &rows, &edits)
            .into_iter()
            .map(|r| r.workout)
            .collect();
        assert_eq!(names, ["Pushups", "Rows", "Dips"]);
    }

    #[test]
    fn progress_of_empty_day_is_zero() {
        let completed: CompletedSet = ["Friday-0".to_string()].into();
        assert_eq!(compute_progress(Day::Friday, &[], &completed), 0);
    }

    #[test]
    fn progress_rounds_to_nearest() {
        let merged = vec![
            row(Day::Monday, "a"),
            row(Day::Monday, "b"),
            row(Day::Monday, "c"),
        ];
        let mut completed = CompletedSet::new();
        completed.insert("Monday-0".into());
        assert_eq!(compute_progress(Day::Monday, &merged, &completed), 33);
        completed.insert("Monday-2".into());
        assert_eq!(compute_progress(Day::Monday, &merged, &completed), 67);
        completed.insert("Monday-1".into());
        assert_eq!(compute_progress(Day::Monday, &merged, &completed), 100);
    }

    #[test]
    fn progress_ignores_other_days_and_stale_ids() {
        let merged = vec![row(Day::Monday, "a"), row(Day::Monday, "b")];
        let completed: CompletedSet = ["Wednesday-0", "Monday-5", "Monday-1"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(compute_progress(Day::Monday, &merged, &completed), 50);
    }

    #[test]
    fn completion_ids_round_trip_through_parse() {
        assert_eq!(completion_id(Day::Wednesday, 3), "Wednesday-3");
        assert_eq!(parse_completion_id("Wednesday-3"), Some((Day::Wednesday, 3)));
        assert_eq!(parse_completion_id("Tuesday-1"), None);
        assert_eq!(parse_completion_id("Friday-x"), None);
    }
}
