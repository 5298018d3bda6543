//! Weekly workout tracker: remote sheet rows merged with the user's own
//! workouts and completion progress.

use chrono::{DateTime, Local};
use eframe::{App, Frame, NativeOptions, egui};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

mod actions;
use actions::{Command, Tracker, WorkoutForm};
mod config;
use config::Config;
mod merge;
use merge::completion_id;
mod sheet;
use sheet::{SheetClient, SheetSync, WriteKind};
mod store;
use store::PreferenceStore;
mod video;

/// Training days of the weekly plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Day {
    Monday,
    Wednesday,
    Friday,
}

impl Day {
    pub const ALL: [Day; 3] = [Day::Monday, Day::Wednesday, Day::Friday];

    pub fn name(self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Wednesday => "Wednesday",
            Day::Friday => "Friday",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.name() == name)
    }
}

impl std::fmt::Display for Day {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One workout, either fetched from the sheet or added locally.
///
/// Field names match the sheet's column headers. Rows scheduled on a day
/// outside [`Day::ALL`] keep `day: None` and never show up in a day list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkoutRow {
    #[serde(
        rename = "Day",
        default,
        deserialize_with = "lenient_day",
        skip_serializing_if = "Option::is_none"
    )]
    pub day: Option<Day>,
    #[serde(rename = "Workout", default, deserialize_with = "lenient_workout")]
    pub workout: String,
    #[serde(
        rename = "Category",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub category: Option<String>,
    #[serde(
        rename = "Link to Video",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub link: Option<String>,
    #[serde(
        rename = "Notes",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub notes: Option<String>,
}

// Sheet cells arrive as strings, numbers or null depending on their content.
fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn lenient_workout<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(lenient_text(d)?.unwrap_or_default())
}

fn lenient_day<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Day>, D::Error> {
    Ok(lenient_text(d)?.as_deref().and_then(Day::from_name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Week,
    Day(Day),
}

struct EditDialog {
    day: Day,
    index: usize,
    form: WorkoutForm,
}

/// Something the user clicked during a frame. Collected while drawing and
/// applied afterwards.
#[derive(Debug, Clone, PartialEq)]
enum UiAction {
    ToggleDark,
    Refresh,
    ViewDay(Day),
    Back,
    ToggleDone(String),
    RequestResetAll,
    ConfirmResetAll,
    CancelResetAll,
    ResetDay(Day),
    Add(Day),
    StartEdit(Day, usize),
    SubmitEdit,
    CancelEdit,
    Delete(Day, usize),
    OpenVideo(String),
    DismissNotice,
}

struct TrackerApp {
    config: Config,
    tracker: Tracker,
    sync: SheetSync,
    view: View,
    form: WorkoutForm,
    edit: Option<EditDialog>,
    confirm_reset: bool,
    notice: Option<String>,
    last_synced: Option<DateTime<Local>>,
    applied_dark: Option<bool>,
}

impl TrackerApp {
    fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let config = Config::load();
        let tracker = Tracker::new(PreferenceStore::open_default());
        let sync =
            SheetSync::new(SheetClient::from_config(&config)).with_repaint(cc.egui_ctx.clone());
        let mut app = Self::from_parts(config, tracker, sync);
        app.sync.request_rows();
        app
    }

    fn from_parts(config: Config, tracker: Tracker, sync: SheetSync) -> Self {
        Self {
            config,
            tracker,
            sync,
            view: View::Week,
            form: WorkoutForm::default(),
            edit: None,
            confirm_reset: false,
            notice: None,
            last_synced: None,
            applied_dark: None,
        }
    }

    fn run_commands(&mut self, commands: Vec<Command>) {
        for cmd in commands {
            match cmd {
                Command::Reload => {
                    self.sync.request_rows();
                }
                Command::Create(entry) => self.sync.submit(WriteKind::Create, entry),
                Command::Update(entry) => self.sync.submit(WriteKind::Update, entry),
            }
        }
    }

    /// Apply finished sheet requests. A failed fetch keeps the rows already
    /// on screen.
    fn pump_sync(&mut self) {
        match self.sync.poll() {
            Some(Ok(rows)) => {
                log::info!("Fetched {} workouts from the sheet", rows.len());
                self.tracker.apply_rows(rows);
                self.last_synced = Some(Local::now());
            }
            Some(Err(e)) => log::error!("Failed to fetch workouts: {e}"),
            None => {}
        }
    }

    fn handle(&mut self, action: UiAction) {
        match action {
            UiAction::ToggleDark => {
                self.tracker.toggle_dark_mode();
            }
            UiAction::Refresh => {
                self.sync.request_rows();
            }
            UiAction::ViewDay(day) => {
                self.view = View::Day(day);
                self.form = WorkoutForm::default();
            }
            UiAction::Back => {
                self.view = View::Week;
                self.sync.request_rows();
            }
            UiAction::ToggleDone(id) => {
                let cmds = self.tracker.toggle_done(&id);
                self.run_commands(cmds);
            }
            UiAction::RequestResetAll => {
                if self.config.confirm_reset_all {
                    self.confirm_reset = true;
                } else {
                    self.handle(UiAction::ConfirmResetAll);
                }
            }
            UiAction::ConfirmResetAll => {
                self.confirm_reset = false;
                self.tracker.reset_all();
                self.view = View::Week;
            }
            UiAction::CancelResetAll => self.confirm_reset = false,
            UiAction::ResetDay(day) => {
                let cmds = self.tracker.reset_day(day);
                self.run_commands(cmds);
            }
            UiAction::Add(day) => {
                let form = std::mem::take(&mut self.form);
                let cmds = self.tracker.add_workout(day, form);
                self.run_commands(cmds);
            }
            UiAction::StartEdit(day, index) => match self.tracker.local_entry(day, index) {
                Ok(row) => {
                    self.edit = Some(EditDialog {
                        day,
                        index,
                        form: WorkoutForm::from_row(row),
                    });
                }
                Err(e) => self.notice = Some(e.to_string()),
            },
            UiAction::SubmitEdit => {
                if let Some(dialog) = self.edit.take() {
                    match self
                        .tracker
                        .edit_workout(dialog.day, dialog.index, dialog.form)
                    {
                        Ok(cmds) => self.run_commands(cmds),
                        Err(e) => self.notice = Some(e.to_string()),
                    }
                }
            }
            UiAction::CancelEdit => self.edit = None,
            UiAction::Delete(day, index) => match self.tracker.delete_workout(day, index) {
                Ok(cmds) => self.run_commands(cmds),
                Err(e) => self.notice = Some(e.to_string()),
            },
            UiAction::OpenVideo(url) => {
                if let Err(e) = open::that(&url) {
                    log::error!("Failed to open {url}: {e}");
                }
            }
            UiAction::DismissNotice => self.notice = None,
        }
    }

    fn apply_theme(&mut self, ctx: &egui::Context) {
        let dark = self.tracker.state().prefs.dark;
        if self.applied_dark != Some(dark) {
            ctx.set_visuals(if dark {
                egui::Visuals::dark()
            } else {
                egui::Visuals::light()
            });
            self.applied_dark = Some(dark);
        }
    }

    fn top_bar(&self, ui: &mut egui::Ui, actions: &mut Vec<UiAction>) {
        ui.horizontal(|ui| {
            let label = if self.tracker.state().prefs.dark {
                "☀ Light"
            } else {
                "🌙 Dark"
            };
            if ui.button(label).clicked() {
                actions.push(UiAction::ToggleDark);
            }
            if ui.button("⟳ Refresh").clicked() {
                actions.push(UiAction::Refresh);
            }
            if self.sync.is_fetching() {
                ui.spinner();
            }
            if let Some(at) = self.last_synced {
                ui.label(format!("Synced {}", at.format("%H:%M:%S")));
            }
        });
    }

    fn week_view(&self, ui: &mut egui::Ui, actions: &mut Vec<UiAction>) {
        ui.heading("Weekly Plan");
        if ui.button("🔁 Reset All").clicked() {
            actions.push(UiAction::RequestResetAll);
        }
        ui.add_space(8.0);
        for day in Day::ALL {
            let percent = self.tracker.progress(day);
            egui::Frame::group(ui.style()).show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.heading(day.name());
                ui.add(
                    egui::ProgressBar::new(f32::from(percent) / 100.0)
                        .text(format!("{percent}%")),
                );
                if ui.button("View Workouts").clicked() {
                    actions.push(UiAction::ViewDay(day));
                }
            });
            ui.add_space(4.0);
        }
    }

    fn day_view(&mut self, ui: &mut egui::Ui, day: Day, actions: &mut Vec<UiAction>) {
        ui.heading(format!("{day}'s Workouts"));
        ui.horizontal(|ui| {
            if ui.button("← Back").clicked() {
                actions.push(UiAction::Back);
            }
            if ui.button("🔁 Reset Day").clicked() {
                actions.push(UiAction::ResetDay(day));
            }
        });
        ui.separator();

        let remote = self.tracker.remote_count(day);
        for (i, w) in self.tracker.day_data(day).iter().enumerate() {
            let done = self.tracker.is_done(day, i);
            egui::Frame::group(ui.style()).show(ui, |ui| {
                ui.set_width(ui.available_width());
                let mut title = egui::RichText::new(&w.workout).strong();
                if done {
                    title = title.strikethrough();
                }
                ui.horizontal(|ui| {
                    ui.label(title);
                    ui.label(format!("({})", w.category.as_deref().unwrap_or("")));
                });
                if let Some(notes) = w.notes.as_deref().filter(|n| !n.is_empty()) {
                    ui.label(notes);
                }
                if let Some(url) = w.link.as_deref().and_then(video::embed_url) {
                    if ui.link("▶ Video preview").on_hover_text(url.as_str()).clicked() {
                        actions.push(UiAction::OpenVideo(url));
                    }
                }
                ui.horizontal(|ui| {
                    if ui.selectable_label(done, "✔ Done").clicked() {
                        actions.push(UiAction::ToggleDone(completion_id(day, i)));
                    }
                    if i >= remote {
                        if ui.button("✏ Edit").clicked() {
                            actions.push(UiAction::StartEdit(day, i));
                        }
                        if ui.button("🗑 Delete").clicked() {
                            actions.push(UiAction::Delete(day, i));
                        }
                    }
                });
            });
        }

        ui.separator();
        ui.heading("Add Workout");
        workout_form(ui, "add_form", &mut self.form);
        let can_add = !self.form.workout.trim().is_empty();
        if ui.add_enabled(can_add, egui::Button::new("➕ Add")).clicked() {
            actions.push(UiAction::Add(day));
        }
    }

    fn dialogs(&mut self, ctx: &egui::Context, actions: &mut Vec<UiAction>) {
        if self.confirm_reset {
            modal("Reset all progress?").show(ctx, |ui| {
                ui.horizontal(|ui| {
                    if ui.button("Reset").clicked() {
                        actions.push(UiAction::ConfirmResetAll);
                    }
                    if ui.button("Cancel").clicked() {
                        actions.push(UiAction::CancelResetAll);
                    }
                });
            });
        }

        if let Some(dialog) = self.edit.as_mut() {
            modal("Edit Workout").show(ctx, |ui| {
                workout_form(ui, "edit_form", &mut dialog.form);
                ui.horizontal(|ui| {
                    if ui.button("Save").clicked() {
                        actions.push(UiAction::SubmitEdit);
                    }
                    if ui.button("Cancel").clicked() {
                        actions.push(UiAction::CancelEdit);
                    }
                });
            });
        }

        if let Some(msg) = &self.notice {
            modal("Notice").show(ctx, |ui| {
                ui.label(msg.as_str());
                if ui.button("OK").clicked() {
                    actions.push(UiAction::DismissNotice);
                }
            });
        }
    }
}

fn modal(title: &str) -> egui::Window<'static> {
    egui::Window::new(title.to_owned())
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
}

fn workout_form(ui: &mut egui::Ui, id: &str, form: &mut WorkoutForm) {
    egui::Grid::new(id).num_columns(2).show(ui, |ui| {
        ui.label("Workout");
        ui.text_edit_singleline(&mut form.workout);
        ui.end_row();
        ui.label("Category");
        ui.text_edit_singleline(&mut form.category);
        ui.end_row();
        ui.label("Link to Video");
        ui.text_edit_singleline(&mut form.link);
        ui.end_row();
        ui.label("Notes");
        ui.text_edit_multiline(&mut form.notes);
        ui.end_row();
    });
}

impl App for TrackerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.pump_sync();
        self.apply_theme(ctx);

        let mut actions = Vec::new();
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            self.top_bar(ui, &mut actions);
        });
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| match self.view {
                View::Week => self.week_view(ui, &mut actions),
                View::Day(day) => self.day_view(ui, day, &mut actions),
            });
        });
        self.dialogs(ctx, &mut actions);

        for action in actions {
            self.handle(action);
        }
        if self.sync.is_fetching() || self.sync.pending_writes() > 0 {
            ctx.request_repaint_after(std::time::Duration::from_millis(250));
        }
    }
}

fn main() -> eframe::Result<()> {
    env_logger::init();
    let options = NativeOptions::default();
    eframe::run_native(
        "Weekly Workout Tracker",
        options,
        Box::new(|cc| Box::new(TrackerApp::new(cc))),
    )
}
