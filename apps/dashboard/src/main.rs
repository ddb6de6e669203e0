use std::{future::Future, io::Write as _, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    load_settings, ClientError, ClientSettings, CollectionBackend, DataSnapshot, DataStore,
    Debouncer, FetchOutcome, HttpBackend, IdentityProvider, LocalBackend, SessionStore,
};
use server_api::DatasetConfig;
use shared::domain::CollectionView;
use storage::{database_url_for_path, Storage};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod render;

use commands::{parse, Command, HELP};

#[derive(Parser, Debug)]
#[command(name = "dashboard", about = "Terminal admin dashboard")]
struct Args {
    /// Backend base URL; takes precedence over DASHBOARD_BACKEND_URL.
    #[arg(long)]
    backend_url: Option<String>,
    /// Serve generated data in-process instead of calling a backend.
    #[arg(long)]
    local: bool,
    /// With --local, answer immediately instead of simulating network latency.
    #[arg(long, requires = "local")]
    instant: bool,
    #[arg(long)]
    page_size: Option<u32>,
    #[arg(long)]
    data_dir: Option<PathBuf>,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value_t = 100)]
    rows: usize,
}

type Backends = (Arc<dyn CollectionBackend>, Arc<dyn IdentityProvider>);

const PROGRESS_INTERVAL: Duration = Duration::from_millis(400);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let args = Args::parse();

    let settings = apply_args(load_settings(), &args);
    let (collections, identity) = build_backends(&args, &settings)?;

    let db_path = settings.database_path()?;
    let storage = Storage::new(&database_url_for_path(&db_path))
        .await
        .with_context(|| format!("failed to open client state at {}", db_path.display()))?;
    storage.health_check().await?;
    info!(path = %db_path.display(), "client state ready");

    let session = Arc::new(SessionStore::load(identity, Arc::new(storage)).await);
    let data = Arc::new(DataStore::with_page_size(collections, settings.page_size));
    tokio::spawn(render_updates(data.subscribe()));

    let mut dashboard = Dashboard {
        session,
        data,
        debouncer: Debouncer::default(),
        view: None,
    };
    dashboard.greet();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match parse(&line) {
            Ok(None) => continue,
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => dashboard.handle(command).await,
            Err(err) => println!("{err}"),
        }
    }
    Ok(())
}

fn apply_args(mut settings: ClientSettings, args: &Args) -> ClientSettings {
    if let Some(url) = &args.backend_url {
        settings.backend_url = Some(url.clone());
    }
    if let Some(size) = args.page_size {
        settings.page_size = size.max(1);
    }
    if let Some(dir) = &args.data_dir {
        settings.data_dir = Some(dir.clone());
    }
    settings
}

/// A missing backend URL is fatal here, before any request is attempted.
fn build_backends(args: &Args, settings: &ClientSettings) -> Result<Backends, ClientError> {
    if args.local {
        info!(seed = args.seed, rows = args.rows, "using in-process backend");
        let dataset = DatasetConfig {
            seed: args.seed,
            rows_per_collection: args.rows,
        };
        let backend = Arc::new(if args.instant {
            LocalBackend::instant(dataset)
        } else {
            LocalBackend::new(dataset)
        });
        let collections: Arc<dyn CollectionBackend> = backend.clone();
        let identity: Arc<dyn IdentityProvider> = backend;
        return Ok((collections, identity));
    }
    let backend = Arc::new(HttpBackend::from_settings(settings)?);
    info!(url = %backend.base_url(), "using HTTP backend");
    let collections: Arc<dyn CollectionBackend> = backend.clone();
    let identity: Arc<dyn IdentityProvider> = backend;
    Ok((collections, identity))
}

async fn render_updates(mut events: broadcast::Receiver<DataSnapshot>) {
    let mut last: Option<DataSnapshot> = None;
    loop {
        match events.recv().await {
            Ok(snapshot) => {
                if render::needs_redraw(last.as_ref(), &snapshot) {
                    if snapshot.loading {
                        println!("Loading...");
                    } else {
                        println!("\n{}", render::render_snapshot(&snapshot));
                    }
                }
                last = Some(snapshot);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "renderer fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

struct Dashboard {
    session: Arc<SessionStore>,
    data: Arc<DataStore>,
    debouncer: Debouncer,
    view: Option<CollectionView>,
}

impl Dashboard {
    fn greet(&self) {
        match self.session.user() {
            Some(user) => println!("Signed in as {} <{}>", user.display_name(), user.email),
            None => println!("Not signed in. Use 'login <email> <password>' or 'register'."),
        }
        println!("Type 'help' for commands.");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Login(form) => {
                let session = &self.session;
                match with_progress(session, session.login(&form)).await {
                    Ok(user) => println!("Welcome, {}.", user.display_name()),
                    Err(err) => report(&err),
                }
            }
            Command::Register(form) => {
                let session = &self.session;
                match with_progress(session, session.register(&form)).await {
                    Ok(()) => println!("Account created. Please log in."),
                    Err(err) => report(&err),
                }
            }
            Command::Logout => {
                self.session.logout().await;
                self.close_view();
                println!("Signed out.");
            }
            Command::ChangePassword(form) => {
                let session = &self.session;
                match with_progress(session, session.change_password(&form)).await {
                    Ok(()) => {
                        self.close_view();
                        println!("Password changed. Please log in again.");
                    }
                    Err(err) => report(&err),
                }
            }
            Command::WhoAmI => match self.session.user() {
                Some(user) => println!("{} <{}> (id {})", user.display_name(), user.email, user.id),
                None => println!("Not signed in."),
            },
            Command::Views => {
                for view in CollectionView::ALL {
                    println!("  {:<16} {}", view.slug(), view.title());
                }
            }
            Command::View(view) => {
                if !self.require_session() {
                    return;
                }
                self.view = Some(view);
                let search = self.data.search_query();
                self.data
                    .fetch_data(view.endpoint(), Some(&search), None, None)
                    .await;
            }
            Command::Next => {
                if let Some(endpoint) = self.open_endpoint() {
                    if self.data.go_to_next_page(endpoint).await == FetchOutcome::Skipped {
                        println!("No next page.");
                    }
                }
            }
            Command::Previous => {
                if let Some(endpoint) = self.open_endpoint() {
                    if self.data.go_to_previous_page(endpoint).await == FetchOutcome::Skipped {
                        println!("Already on the first page.");
                    }
                }
            }
            Command::Refresh | Command::Retry => {
                if let Some(endpoint) = self.open_endpoint() {
                    self.data.refresh_data(endpoint).await;
                }
            }
            Command::Search(text) => {
                let Some(endpoint) = self.open_endpoint() else {
                    return;
                };
                self.data.set_search_query(text.clone());
                let data = Arc::clone(&self.data);
                self.debouncer.call(move || async move {
                    data.fetch_data(endpoint, Some(&text), None, None).await;
                });
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => {}
        }
    }

    fn require_session(&self) -> bool {
        if self.session.is_authenticated() {
            return true;
        }
        println!("Please log in first.");
        false
    }

    fn open_endpoint(&self) -> Option<&'static str> {
        if !self.require_session() {
            return None;
        }
        match self.view {
            Some(view) => Some(view.endpoint()),
            None => {
                println!("Open a collection first: 'views' lists them.");
                None
            }
        }
    }

    fn close_view(&mut self) {
        self.debouncer.cancel();
        self.view = None;
    }
}

/// Drives an identity call, printing a progress line while the session is busy.
async fn with_progress<T>(session: &SessionStore, work: impl Future<Output = T>) -> T {
    tokio::pin!(work);
    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    ticker.tick().await;
    loop {
        tokio::select! {
            out = &mut work => return out,
            _ = ticker.tick() => {
                if session.is_busy() {
                    println!("Working...");
                }
            }
        }
    }
}

fn report(err: &ClientError) {
    match err.field_errors() {
        Some(fields) => {
            for (field, message) in fields.iter() {
                println!("  {}: {message}", field.name());
            }
        }
        None => println!("{err}"),
    }
}
