//! User actions and the state they mutate.
//!
//! [`Tracker`] owns the application state and the store it is persisted to.
//! Every mutating action writes the state back before returning, and hands
//! the caller a list of [`Command`]s describing the network work to run next.

use crate::merge::{
    completion_id, compute_progress, get_day_data, parse_completion_id, remote_count,
};
use crate::store::{CompletedSet, EditsByDay, PreferenceStore, Preferences};
use crate::{Day, WorkoutRow};

/// Everything the renderer reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub prefs: Preferences,
    pub completed: CompletedSet,
    pub edits: EditsByDay,
    pub rows: Vec<WorkoutRow>,
}

/// Follow-up work requested by an action.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Re-fetch the remote rows.
    Reload,
    /// Mirror a new local entry to the create endpoint.
    Create(WorkoutRow),
    /// Mirror an edited local entry to the edit endpoint.
    Update(WorkoutRow),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAction {
    Edit,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserError {
    RemoteEntry { action: EntryAction, day: Day, index: usize },
    NoSuchEntry { day: Day, index: usize },
}

impl std::fmt::Display for UserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserError::RemoteEntry {
                action: EntryAction::Edit,
                ..
            } => write!(f, "Cannot edit workouts from the original sheet."),
            UserError::RemoteEntry {
                action: EntryAction::Delete,
                ..
            } => write!(f, "Cannot delete workouts from the original sheet."),
            UserError::NoSuchEntry { day, index } => {
                write!(f, "Workout #{} on {day} no longer exists.", index + 1)
            }
        }
    }
}

impl std::error::Error for UserError {}

/// Field values from the add or edit form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkoutForm {
    pub workout: String,
    pub category: String,
    pub link: String,
    pub notes: String,
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s) }
}

impl WorkoutForm {
    pub fn from_row(row: &WorkoutRow) -> Self {
        Self {
            workout: row.workout.clone(),
            category: row.category.clone().unwrap_or_default(),
            link: row.link.clone().unwrap_or_default(),
            notes: row.notes.clone().unwrap_or_default(),
        }
    }

    pub fn into_row(self, day: Day) -> WorkoutRow {
        WorkoutRow {
            day: Some(day),
            workout: self.workout.trim().to_string(),
            category: non_empty(self.category),
            link: non_empty(self.link.trim().to_string()),
            notes: non_empty(self.notes),
        }
    }
}

pub struct Tracker {
    state: AppState,
    store: PreferenceStore,
}

impl Tracker {
    /// Load the persisted overlay from `store`. Remote rows start empty.
    pub fn new(store: PreferenceStore) -> Self {
        let (prefs, completed, edits) = store.load();
        log::info!(
            "Loaded {} completed workouts and {} custom workouts",
            completed.len(),
            edits.values().map(Vec::len).sum::<usize>()
        );
        Self {
            state: AppState {
                prefs,
                completed,
                edits,
                rows: Vec::new(),
            },
            store,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    fn persist(&mut self) {
        self.store
            .save(&self.state.prefs, &self.state.completed, &self.state.edits);
    }

    /// Replace the remote rows with a fresh fetch.
    pub fn apply_rows(&mut self, rows: Vec<WorkoutRow>) {
        self.state.rows = rows;
    }

    pub fn day_data(&self, day: Day) -> Vec<WorkoutRow> {
        get_day_data(day, &self.state.rows, &self.state.edits)
    }

    pub fn progress(&self, day: Day) -> u8 {
        compute_progress(day, &self.day_data(day), &self.state.completed)
    }

    pub fn remote_count(&self, day: Day) -> usize {
        remote_count(day, &self.state.rows)
    }

    pub fn is_done(&self, day: Day, index: usize) -> bool {
        self.state.completed.contains(&completion_id(day, index))
    }

    /// Position within `edits[day]` of the merged entry at `index`.
    fn local_offset(
        &self,
        day: Day,
        index: usize,
        action: EntryAction,
    ) -> Result<usize, UserError> {
        let remote = self.remote_count(day);
        if index < remote {
            return Err(UserError::RemoteEntry { action, day, index });
        }
        let offset = index - remote;
        let local = self.state.edits.get(&day).map_or(0, Vec::len);
        if offset >= local {
            return Err(UserError::NoSuchEntry { day, index });
        }
        Ok(offset)
    }

    /// The local entry at `index`, for pre-filling the edit form.
    pub fn local_entry(&self, day: Day, index: usize) -> Result<&WorkoutRow, UserError> {
        let offset = self.local_offset(day, index, EntryAction::Edit)?;
        Ok(&self.state.edits[&day][offset])
    }

    pub fn toggle_dark_mode(&mut self) -> bool {
        self.state.prefs.dark = !self.state.prefs.dark;
        self.persist();
        self.state.prefs.dark
    }

    pub fn toggle_done(&mut self, id: &str) -> Vec<Command> {
        if !self.state.completed.remove(id) {
            self.state.completed.insert(id.to_string());
        }
        self.persist();
        vec![Command::Reload]
    }

    /// Clear every completion marker. Callers confirm with the user first.
    pub fn reset_all(&mut self) {
        self.state.completed.clear();
        self.persist();
        log::info!("Reset all progress");
    }

    pub fn reset_day(&mut self, day: Day) -> Vec<Command> {
        let prefix = format!("{day}-");
        self.state.completed.retain(|id| !id.starts_with(&prefix));
        self.persist();
        vec![Command::Reload]
    }

    pub fn add_workout(&mut self, day: Day, form: WorkoutForm) -> Vec<Command> {
        let entry = form.into_row(day);
        log::info!("Adding '{}' to {day}", entry.workout);
        self.state.edits.entry(day).or_default().push(entry.clone());
        self.persist();
        vec![Command::Create(entry), Command::Reload]
    }

    /// Overwrite the local entry at `index`. A blank workout name cancels the
    /// edit without touching anything.
    pub fn edit_workout(
        &mut self,
        day: Day,
        index: usize,
        form: WorkoutForm,
    ) -> Result<Vec<Command>, UserError> {
        let offset = self.local_offset(day, index, EntryAction::Edit)?;
        if form.workout.trim().is_empty() {
            return Ok(Vec::new());
        }
        let entry = form.into_row(day);
        if let Some(slot) = self
            .state
            .edits
            .get_mut(&day)
            .and_then(|list| list.get_mut(offset))
        {
            *slot = entry.clone();
        }
        self.persist();
        Ok(vec![Command::Update(entry), Command::Reload])
    }

    /// Remove the local entry at `index`. Completion markers of later entries
    /// on the same day move down with them.
    pub fn delete_workout(&mut self, day: Day, index: usize) -> Result<Vec<Command>, UserError> {
        let offset = self.local_offset(day, index, EntryAction::Delete)?;
        if let Some(list) = self.state.edits.get_mut(&day) {
            let removed = list.remove(offset);
            log::info!("Deleted '{}' from {day}", removed.workout);
            if list.is_empty() {
                self.state.edits.remove(&day);
            }
        }
        self.state.completed = std::mem::take(&mut self.state.completed)
            .into_iter()
            .filter_map(|id| match parse_completion_id(&id) {
                Some((d, i)) if d == day && i == index => None,
                Some((d, i)) if d == day && i > index => Some(completion_id(d, i - 1)),
                _ => Some(id),
            })
            .collect();
        self.persist();
        Ok(vec![Command::Reload])
    }
}
