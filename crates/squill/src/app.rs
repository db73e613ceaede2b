use crate::cli::CliArgs;
use crate::command::{Command, CommandError, parse_command};
use squill_core::{
    AppSettings, ConnectionConfig, ConnectionStore, DbError, ExecutionReport, HistoryEntry,
    HistoryStore, IdleScheduler, MultiStatementResult, ProviderRegistry, QueryPipeline,
    QueryResult, RemoteExecutor, SessionFactory, SettingsStore, StarredStore, StatementOutcome,
    StatementResult, parse_connection_url,
};
use squill_ssh::SshTunnelFactory;
use squill_worker::{RemoteWorker, WorkerLifecycle};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

/// What the shell should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Continue,
    Quit,
    Message(String),
}

/// The service container the shell drives: registry, stores, session
/// handling, the query pipeline, and the worker lifecycle.
pub struct App {
    registry: Arc<ProviderRegistry>,
    session_factory: SessionFactory,
    settings_store: SettingsStore,
    pub settings: AppSettings,
    connection_store: Option<ConnectionStore>,
    pub history: Option<HistoryStore>,
    pub starred: Option<StarredStore>,
    scheduler: Arc<IdleScheduler>,
    worker: Arc<WorkerLifecycle>,
    pipeline: Option<Arc<QueryPipeline>>,
    current: Option<ConnectionConfig>,
    max_rows: usize,
}

impl App {
    pub fn new(args: &CliArgs) -> Result<Self, DbError> {
        let registry = Arc::new(squill_providers::default_registry());

        let settings_store = match &args.settings {
            Some(path) => SettingsStore::with_path(path.clone()),
            None => SettingsStore::new()?,
        };
        let settings = settings_store.load().unwrap_or_else(|e| {
            warn!("failed to load settings, using defaults: {}", e);
            AppSettings::default()
        });

        let connection_store = ConnectionStore::new()
            .map_err(|e| warn!("connection store unavailable: {}", e))
            .ok();
        let history = HistoryStore::new()
            .map_err(|e| warn!("history store unavailable: {}", e))
            .ok();
        let starred = StarredStore::new()
            .map_err(|e| warn!("starred store unavailable: {}", e))
            .ok();

        let scheduler = Arc::new(IdleScheduler::new(args.debug_idle_scheduler));
        let worker = WorkerLifecycle::new(scheduler.clone());
        worker.set_auto_shutdown(
            settings
                .process_worker_auto_shutdown_s
                .map(Duration::from_secs),
        );
        if settings.process_worker && settings.process_worker_warm {
            worker.warm_on_idle();
        }

        let session_factory =
            SessionFactory::new(registry.clone()).with_tunnels(Arc::new(SshTunnelFactory));

        let max_rows = args.max_rows.unwrap_or(settings.max_rows);

        Ok(Self {
            registry,
            session_factory,
            settings_store,
            settings,
            connection_store,
            history,
            starred,
            scheduler,
            worker,
            pipeline: None,
            current: None,
            max_rows,
        })
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    pub fn connected(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn current_connection(&self) -> Option<&ConnectionConfig> {
        self.current.as_ref()
    }

    /// Connect to a saved connection by name or to a connection URL.
    pub fn connect(&mut self, target: &str) -> Result<String, DbError> {
        let config = self.resolve_target(target)?;

        // Probe the connection through a session first so tunnel and auth
        // errors surface before the pipeline exists.
        let session = self.session_factory.build(&config)?;
        let provider = session.provider().clone();
        session.close();

        let mut pipeline = QueryPipeline::new(provider.adapter.clone(), config.clone());
        if self.settings.process_worker {
            pipeline = pipeline.with_remote(remote_of(self.worker.clone()));
        }

        self.pipeline = Some(Arc::new(pipeline));
        self.current = Some(config.clone());
        info!("connected: {}", config.name);

        Ok(format!(
            "Connected to {} ({})",
            config.name,
            self.registry.display_name(&config.db_type)?
        ))
    }

    fn resolve_target(&self, target: &str) -> Result<ConnectionConfig, DbError> {
        if target.contains("://") {
            return parse_connection_url(&self.registry, target);
        }

        let saved = self
            .connection_store
            .as_ref()
            .map(|store| store.load())
            .transpose()?
            .unwrap_or_default();

        saved
            .into_iter()
            .find(|c| c.name == target)
            .ok_or_else(|| DbError::invalid_config(format!("no saved connection named {}", target)))
    }

    pub fn disconnect(&mut self) -> String {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.cancel_operation();
            pipeline.reset();
        }
        let name = self
            .current
            .take()
            .map(|c| c.name)
            .unwrap_or_else(|| "connection".to_string());
        format!("Disconnected from {}", name)
    }

    /// Execute SQL through the pipeline, recording history.
    pub fn execute(&mut self, sql: &str) -> Result<ExecutionReport, DbError> {
        let pipeline = self.pipeline.clone().ok_or(DbError::NoActiveConnection)?;
        let report = pipeline.run_query(sql, Some(self.max_rows))?;

        if let Some(history) = &mut self.history
            && let Some(current) = &self.current
        {
            let row_count = match &report.outcome {
                StatementOutcome::Query(q) => Some(q.row_count),
                StatementOutcome::NonQuery(_) => None,
            };
            history.add(
                &current.name,
                HistoryEntry::new(
                    sql,
                    current.endpoint.database().map(String::from),
                    report.elapsed,
                    row_count,
                ),
            );
            if let Err(e) = history.save() {
                warn!("failed to persist history: {}", e);
            }
        }

        Ok(report)
    }

    /// Execute a script as a per-statement result stack.
    pub fn execute_script(&mut self, sql: &str) -> Result<MultiStatementResult, DbError> {
        let pipeline = self.pipeline.clone().ok_or(DbError::NoActiveConnection)?;
        Ok(pipeline.run_script(sql, Some(self.max_rows)).result)
    }

    pub fn cancel_operation(&self) {
        if let Some(pipeline) = &self.pipeline {
            pipeline.cancel_operation();
        }
    }

    /// Run a `:` command.
    pub fn run_command(&mut self, input: &str) -> Result<CommandOutcome, CommandError> {
        let command = parse_command(input)?;

        let outcome = match command {
            Command::Quit => CommandOutcome::Quit,
            Command::Help => CommandOutcome::Message(help_text()),
            Command::Connect(None) => {
                CommandOutcome::Message("usage: connect <name or URL>".to_string())
            }
            Command::Connect(Some(target)) => match self.connect(&target) {
                Ok(message) => CommandOutcome::Message(message),
                Err(e) => CommandOutcome::Message(e.to_string()),
            },
            Command::Disconnect => CommandOutcome::Message(self.disconnect()),
            Command::Theme(None) => {
                CommandOutcome::Message(format!("theme: {}", self.settings.theme))
            }
            Command::Theme(Some(theme)) => {
                self.settings.theme = theme.clone();
                self.persist_settings();
                CommandOutcome::Message(format!("theme set to {}", theme))
            }
            // `run`/`run!` are editor-buffer commands; the line shell treats
            // its own input as the buffer, so there is nothing extra to do.
            Command::Run | Command::RunStay => CommandOutcome::Continue,
            Command::SetProcessWorker(enabled) => {
                self.settings.process_worker = enabled;
                self.persist_settings();
                self.rebuild_pipeline_remote(enabled);
                if !enabled {
                    self.worker.close();
                }
                CommandOutcome::Message(format!(
                    "process worker {}",
                    if enabled { "on" } else { "off" }
                ))
            }
            Command::SetProcessWorkerWarm(enabled) => {
                self.settings.process_worker_warm = enabled;
                self.persist_settings();
                if enabled && self.settings.process_worker {
                    self.worker.warm_on_idle();
                }
                CommandOutcome::Message(format!(
                    "process worker warm-up {}",
                    if enabled { "on" } else { "off" }
                ))
            }
            Command::SetProcessWorkerAutoShutdown(window) => {
                self.settings.process_worker_auto_shutdown_s = window;
                self.persist_settings();
                self.worker
                    .set_auto_shutdown(window.map(Duration::from_secs));
                CommandOutcome::Message(match window {
                    Some(seconds) => format!("worker auto-shutdown after {}s idle", seconds),
                    None => "worker auto-shutdown off".to_string(),
                })
            }
        };

        Ok(outcome)
    }

    fn rebuild_pipeline_remote(&mut self, enabled: bool) {
        let Some(current) = &self.current else {
            return;
        };
        let Ok(provider) = self.registry.get(&current.db_type) else {
            return;
        };

        let mut pipeline = QueryPipeline::new(provider.adapter.clone(), current.clone());
        if enabled {
            pipeline = pipeline.with_remote(remote_of(self.worker.clone()));
        }
        self.pipeline = Some(Arc::new(pipeline));
    }

    fn persist_settings(&self) {
        if let Err(e) = self.settings_store.save(&self.settings) {
            warn!("failed to persist settings: {}", e);
        }
    }

    /// App exit: close the worker and drop timers before the runtime goes
    /// away.
    pub fn shutdown(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.reset();
        }
        self.worker.close();
        self.scheduler.cancel_all();
    }
}

/// The lifecycle's `Arc` implements `RemoteExecutor`; box it once more so
/// the pipeline holds a trait object.
fn remote_of(worker: Arc<WorkerLifecycle>) -> Arc<dyn RemoteExecutor> {
    Arc::new(RemoteWorker(worker))
}

fn help_text() -> String {
    "Commands:\n\
     \x20 :q | :quit | :exit        quit\n\
     \x20 :help | :h                this help\n\
     \x20 :connect | :c <target>    connect to a saved name or URL\n\
     \x20 :disconnect | :dc         drop the current connection\n\
     \x20 :theme [name]             show or set the theme\n\
     \x20 :run | :r                 execute the buffer\n\
     \x20 :run! | :r!               execute without leaving insert mode\n\
     \x20 :set process_worker {on|off}\n\
     \x20 :set process_worker_warm {on|off}\n\
     \x20 :set process_worker_auto_shutdown {SECONDS|off}"
        .to_string()
}

/// Render a result as an aligned text table.
pub fn format_result(result: &QueryResult) -> String {
    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.name.len()).collect();
    let rendered: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(|v| v.as_display_string()).collect())
        .collect();

    for row in &rendered {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            } else {
                widths.push(cell.len());
            }
        }
    }

    let mut out = String::new();
    let header: Vec<String> = result
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{:<width$}", c.name, width = widths[i]))
        .collect();
    out.push_str(&header.join(" | "));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.push('\n');

    for row in &rendered {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect();
        out.push_str(&cells.join(" | "));
        out.push('\n');
    }

    let mut footer = format!("({} rows)", result.row_count);
    if result.truncated {
        footer.push_str(" [truncated]");
    }
    out.push_str(&footer);
    out
}

/// Errors render as a one-row table so the user can copy them.
pub fn format_error(message: &str) -> String {
    format!("[Error]\n{}", message)
}

/// Render a per-statement result stack.
pub fn format_script_result(result: &MultiStatementResult) -> String {
    let mut out = String::new();
    for (index, entry) in result.results.iter().enumerate() {
        if index > 0 {
            out.push_str("\n\n");
        }
        out.push_str(&format!("-- statement {} --\n", index + 1));
        match entry {
            StatementResult::Query(q) => out.push_str(&format_result(q)),
            StatementResult::NonQuery(n) => {
                out.push_str(&format!("({} rows affected)", n.rows_affected));
            }
            StatementResult::Error { message } => out.push_str(&format_error(message)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use squill_core::{ColumnMeta, Value};

    #[test]
    fn result_table_alignment() {
        let result = QueryResult::new(
            vec![ColumnMeta::new("id"), ColumnMeta::new("name")],
            vec![
                vec![Value::Int(1), Value::Text("ada".into())],
                vec![Value::Int(2), Value::Text("grace".into())],
            ],
        );

        let table = format_result(&result);
        assert!(table.contains("id | name"));
        assert!(table.contains("1  | ada"));
        assert!(table.ends_with("(2 rows)"));
    }

    #[test]
    fn truncated_marker() {
        let mut result = QueryResult::new(vec![ColumnMeta::new("n")], vec![vec![Value::Int(1)]]);
        result.truncated = true;
        assert!(format_result(&result).contains("[truncated]"));
    }

    #[test]
    fn error_renders_as_copyable_table() {
        let rendered = format_error("no such table: users");
        assert!(rendered.starts_with("[Error]"));
        assert!(rendered.contains("no such table"));
    }
}
