use crate::WorkoutRow;
use crate::config::Config;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Update,
}

impl std::fmt::Display for WriteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteKind::Create => write!(f, "create"),
            WriteKind::Update => write!(f, "update"),
        }
    }
}

#[derive(Debug)]
pub enum SheetError {
    Status(u16, String),
    Transport(Box<dyn std::error::Error + Send + Sync>),
    Parse(serde_json::Error),
    NotConfigured(WriteKind),
}

impl std::fmt::Display for SheetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetError::Status(code, body) => write!(f, "HTTP {code}: {body}"),
            SheetError::Transport(e) => write!(f, "{e}"),
            SheetError::Parse(e) => write!(f, "invalid sheet response: {e}"),
            SheetError::NotConfigured(kind) => write!(f, "no {kind} endpoint configured"),
        }
    }
}

impl std::error::Error for SheetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SheetError::Status(..) | SheetError::NotConfigured(_) => None,
            SheetError::Transport(e) => Some(&**e),
            SheetError::Parse(e) => Some(e),
        }
    }
}

#[derive(Deserialize)]
struct RowsResponse {
    #[serde(default)]
    rows: Option<Vec<WorkoutRow>>,
}

/// Parse a read-endpoint response of the form `{ "rows": [...] }`.
///
/// A response without `rows` yields no workouts.
pub fn parse_rows(json: &str) -> Result<Vec<WorkoutRow>, SheetError> {
    let resp: RowsResponse = serde_json::from_str(json).map_err(SheetError::Parse)?;
    Ok(resp.rows.unwrap_or_default())
}

fn read_body(response: Result<ureq::Response, ureq::Error>) -> Result<String, SheetError> {
    match response {
        Ok(r) => r
            .into_string()
            .map_err(|e| SheetError::Transport(Box::new(e))),
        Err(ureq::Error::Status(code, r)) => {
            let body = r.into_string().unwrap_or_default();
            Err(SheetError::Status(code, body))
        }
        Err(e) => Err(SheetError::Transport(Box::new(e))),
    }
}

/// HTTP client for the spreadsheet-backed workout API.
pub struct SheetClient {
    agent: ureq::Agent,
    read_endpoint: String,
    create_endpoint: String,
    edit_endpoint: String,
}

impl SheetClient {
    pub fn from_config(config: &Config) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        Self {
            agent: builder.build(),
            read_endpoint: config.read_endpoint.clone(),
            create_endpoint: config.create_endpoint.clone(),
            edit_endpoint: config.edit_endpoint.clone(),
        }
    }

    /// Fetch every row from the read endpoint.
    pub fn fetch_all(&self) -> Result<Vec<WorkoutRow>, SheetError> {
        log::debug!("Fetching workouts from {}", self.read_endpoint);
        let response = self
            .agent
            .get(&self.read_endpoint)
            .set("Accept", "application/json")
            .call();
        parse_rows(&read_body(response)?)
    }

    /// POST `entry` as JSON to `url` and return the response body.
    pub fn post_entry(&self, url: &str, entry: &WorkoutRow) -> Result<String, SheetError> {
        let response = self.agent.post(url).send_json(entry);
        read_body(response)
    }

    fn endpoint(&self, kind: WriteKind) -> &str {
        match kind {
            WriteKind::Create => &self.create_endpoint,
            WriteKind::Update => &self.edit_endpoint,
        }
    }

    /// Mirror a local entry to the matching write endpoint.
    pub fn write(&self, kind: WriteKind, entry: &WorkoutRow) -> Result<String, SheetError> {
        let url = self.endpoint(kind);
        if url.trim().is_empty() {
            return Err(SheetError::NotConfigured(kind));
        }
        self.post_entry(url, entry)
    }
}

enum SheetEvent {
    Rows {
        generation: u64,
        result: Result<Vec<WorkoutRow>, SheetError>,
    },
    Written {
        kind: WriteKind,
        workout: String,
        result: Result<String, SheetError>,
    },
}

/// Runs sheet requests on background threads and hands the results back to
/// the UI thread.
///
/// Each fetch is tagged with a generation number. Only the newest fetch's
/// response is delivered by [`SheetSync::poll`]; older ones are dropped.
pub struct SheetSync {
    client: Arc<SheetClient>,
    tx: Sender<SheetEvent>,
    rx: Receiver<SheetEvent>,
    generation: u64,
    awaiting: Option<u64>,
    pending_writes: usize,
    repaint: Option<egui::Context>,
}

impl SheetSync {
    pub fn new(client: SheetClient) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            client: Arc::new(client),
            tx,
            rx,
            generation: 0,
            awaiting: None,
            pending_writes: 0,
            repaint: None,
        }
    }

    /// Wake the UI when a response arrives.
    pub fn with_repaint(mut self, ctx: egui::Context) -> Self {
        self.repaint = Some(ctx);
        self
    }

    /// Point later requests at a different client. Requests already in
    /// flight keep the client they started with.
    #[cfg(test)]
    pub fn set_client(&mut self, client: SheetClient) {
        self.client = Arc::new(client);
    }

    pub fn is_fetching(&self) -> bool {
        self.awaiting.is_some()
    }

    pub fn pending_writes(&self) -> usize {
        self.pending_writes
    }

    fn spawn<F>(&self, job: F)
    where
        F: FnOnce(&SheetClient) -> SheetEvent + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        let repaint = self.repaint.clone();
        thread::spawn(move || {
            let _ = tx.send(job(client.as_ref()));
            if let Some(ctx) = repaint {
                ctx.request_repaint();
            }
        });
    }

    /// Start a fetch of all rows, superseding any fetch still in flight.
    pub fn request_rows(&mut self) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        self.awaiting = Some(generation);
        self.spawn(move |client| SheetEvent::Rows {
            generation,
            result: client.fetch_all(),
        });
        generation
    }

    /// Mirror `entry` to the remote sheet. The outcome is only logged.
    pub fn submit(&mut self, kind: WriteKind, entry: WorkoutRow) {
        self.pending_writes += 1;
        self.spawn(move |client| SheetEvent::Written {
            kind,
            workout: entry.workout.clone(),
            result: client.write(kind, &entry),
        });
    }

    /// Drain finished requests. Returns the result of the current fetch once
    /// it completes.
    pub fn poll(&mut self) -> Option<Result<Vec<WorkoutRow>, SheetError>> {
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(SheetEvent::Rows { generation, result }) => {
                    if self.awaiting == Some(generation) {
                        self.awaiting = None;
                        latest = Some(result);
                    } else {
                        log::debug!(
                            "Discarding stale fetch {generation} (current {})",
                            self.generation
                        );
                    }
                }
                Ok(SheetEvent::Written {
                    kind,
                    workout,
                    result,
                }) => {
                    self.pending_writes = self.pending_writes.saturating_sub(1);
                    match result {
                        Ok(body) => log::info!("Sheet {kind} of '{workout}': {body}"),
                        Err(SheetError::NotConfigured(_)) => {
                            log::info!("Skipping sheet {kind} of '{workout}': no endpoint configured")
                        }
                        Err(e) => log::warn!("Sheet {kind} of '{workout}' failed: {e}"),
                    }
                }
                Err(TryRecvError::Empty) => break,
                // `self` holds a sender, so the channel never disconnects.
                Err(TryRecvError::Disconnected) => break,
            }
        }
        latest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Day;
    use httpmock::prelude::*;
    use std::time::Instant;

    fn config_for(server: &MockServer) -> Config {
        Config {
            read_endpoint: server.url("/api"),
            create_endpoint: server.url("/create"),
            edit_endpoint: server.url("/edit"),
            timeout_secs: 5,
            confirm_reset_all: true,
        }
    }

    fn wait_for_rows(sync: &mut SheetSync) -> Result<Vec<WorkoutRow>, SheetError> {
        let start = Instant::now();
        loop {
            if let Some(result) = sync.poll() {
                return result;
            }
            assert!(start.elapsed() < Duration::from_secs(10), "fetch timed out");
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn wait_for_writes(sync: &mut SheetSync) {
        let start = Instant::now();
        while sync.pending_writes() > 0 {
            let _ = sync.poll();
            assert!(start.elapsed() < Duration::from_secs(10), "write timed out");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn fetch_parses_rows() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET).path("/api");
            then.status(200).body(
                r#"{"columns":{},"rows":[
                    {"Day":"Monday","Workout":"Pushups","Category":"Push","Link to Video":"https://www.youtube.com/watch?v=abc","Notes":"3x10"},
                    {"Day":"Friday","Workout":"Squats"}
                ]}"#,
            );
        });

        let rows = SheetClient::from_config(&config_for(&server))
            .fetch_all()
            .unwrap();
        m.assert();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].day, Some(Day::Monday));
        assert_eq!(rows[0].link.as_deref(), Some("https://www.youtube.com/watch?v=abc"));
        assert_eq!(rows[1].category, None);
    }

    #[test]
    fn missing_rows_field_is_empty() {
        assert!(parse_rows("{}").unwrap().is_empty());
        assert!(parse_rows(r#"{"rows":null}"#).unwrap().is_empty());
        assert!(matches!(parse_rows("<html>"), Err(SheetError::Parse(_))));
    }

    #[test]
    fn maps_error_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api");
            then.status(500).body("boom");
        });

        let err = SheetClient::from_config(&config_for(&server))
            .fetch_all()
            .unwrap_err();
        match err {
            SheetError::Status(code, body) => {
                assert_eq!(code, 500);
                assert_eq!(body, "boom");
            }
            e => panic!("unexpected error: {e:?}"),
        }
    }

    #[test]
    fn create_posts_entry_as_json() {
        let server = MockServer::start();
        let entry = WorkoutRow {
            day: Some(Day::Friday),
            workout: "Squats".into(),
            category: Some("Legs".into()),
            link: None,
            notes: Some("slow".into()),
        };
        let m = server.mock(|when, then| {
            when.method(POST)
                .path("/create")
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({
                    "Day": "Friday",
                    "Workout": "Squats",
                    "Category": "Legs",
                    "Notes": "slow",
                }));
            then.status(200).body("ok");
        });

        let body = SheetClient::from_config(&config_for(&server))
            .write(WriteKind::Create, &entry)
            .unwrap();
        m.assert();
        assert_eq!(body, "ok");
    }

    #[test]
    fn empty_endpoint_is_not_configured() {
        let server = MockServer::start();
        let mut cfg = config_for(&server);
        cfg.create_endpoint = String::new();
        let err = SheetClient::from_config(&cfg)
            .write(WriteKind::Create, &WorkoutRow::default())
            .unwrap_err();
        assert!(matches!(err, SheetError::NotConfigured(WriteKind::Create)));
    }

    fn client_at(server: &MockServer, path: &str) -> SheetClient {
        let mut cfg = config_for(server);
        cfg.read_endpoint = server.url(path);
        SheetClient::from_config(&cfg)
    }

    fn workout_names(rows: &[WorkoutRow]) -> Vec<&str> {
        rows.iter().map(|r| r.workout.as_str()).collect()
    }

    #[test]
    fn sync_drops_slow_superseded_fetch() {
        let server = MockServer::start();
        let old = server.mock(|when, then| {
            when.method(GET).path("/old");
            then.status(200)
                .delay(Duration::from_millis(500))
                .body(r#"{"rows":[{"Day":"Monday","Workout":"Stale"}]}"#);
        });
        server.mock(|when, then| {
            when.method(GET).path("/new");
            then.status(200)
                .body(r#"{"rows":[{"Day":"Monday","Workout":"Fresh"}]}"#);
        });

        let mut sync = SheetSync::new(client_at(&server, "/old"));
        let first = sync.request_rows();
        sync.set_client(client_at(&server, "/new"));
        let second = sync.request_rows();
        assert!(second > first);
        assert!(sync.is_fetching());

        let rows = wait_for_rows(&mut sync).unwrap();
        assert_eq!(workout_names(&rows), ["Fresh"]);
        assert!(!sync.is_fetching());

        // let the superseded response land, then make sure it is not delivered
        let start = Instant::now();
        while old.hits() == 0 {
            assert!(start.elapsed() < Duration::from_secs(10), "old fetch never sent");
            thread::sleep(Duration::from_millis(10));
        }
        thread::sleep(Duration::from_millis(800));
        assert!(sync.poll().is_none());
    }

    #[test]
    fn sync_waits_past_early_stale_response() {
        let server = MockServer::start();
        let old = server.mock(|when, then| {
            when.method(GET).path("/old");
            then.status(200)
                .body(r#"{"rows":[{"Day":"Friday","Workout":"Stale"}]}"#);
        });
        server.mock(|when, then| {
            when.method(GET).path("/new");
            then.status(200)
                .delay(Duration::from_millis(500))
                .body(r#"{"rows":[{"Day":"Friday","Workout":"Fresh"}]}"#);
        });

        let mut sync = SheetSync::new(client_at(&server, "/old"));
        sync.request_rows();
        sync.set_client(client_at(&server, "/new"));
        sync.request_rows();

        // the first fetch finishes first but belongs to an old generation
        let start = Instant::now();
        while old.hits() == 0 {
            assert!(start.elapsed() < Duration::from_secs(10), "old fetch never sent");
            thread::sleep(Duration::from_millis(10));
        }
        thread::sleep(Duration::from_millis(100));
        assert!(sync.poll().is_none());
        assert!(sync.is_fetching());

        let rows = wait_for_rows(&mut sync).unwrap();
        assert_eq!(workout_names(&rows), ["Fresh"]);
    }

    #[test]
    fn sync_reports_fetch_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api");
            then.status(503);
        });

        let mut sync = SheetSync::new(SheetClient::from_config(&config_for(&server)));
        sync.request_rows();
        assert!(matches!(
            wait_for_rows(&mut sync),
            Err(SheetError::Status(503, _))
        ));
    }

    #[test]
    fn sync_write_failure_is_only_logged() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(POST).path("/edit");
            then.status(500).body("nope");
        });

        let mut sync = SheetSync::new(SheetClient::from_config(&config_for(&server)));
        sync.submit(WriteKind::Update, WorkoutRow::default());
        wait_for_writes(&mut sync);
        m.assert();
        assert!(!sync.is_fetching());
    }
}
