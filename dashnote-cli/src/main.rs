mod error;
mod output;

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use dashnote::{
    BootstrapOutcome, DashboardBootstrap, DashboardLoader, InitDashboardArgs, NoopServices,
};
use dashnote_annotations::{
    AnnotationOptions, AnnotationsCoordinator, HttpDatasourceResolver, PanelRef, WriteOutcome,
};
use dashnote_core::logging::init_from_config;
use dashnote_core::{BackendClient, CoreConfig, DashboardModel, NotificationHub, SessionUser};
use dashnote_protocol::annotation::AnnotationEvent;
use dashnote_protocol::time::TimeRange;
use tracing::debug;

use crate::error::CliError;
use crate::output::{
    drain_notifications, print_alert_state, print_dashboard, print_error, print_event,
    print_success, print_user, print_warning,
};

#[derive(Parser, Debug)]
#[command(name = "dashnote", author, version, about = "Dashboard annotations from the terminal", long_about = None)]
struct Cli {
    /// Backend base URL (defaults to DASHNOTE_BACKEND_URL)
    #[arg(long, global = true, env = "DASHNOTE_BACKEND_URL")]
    backend: Option<String>,

    /// API token sent as a bearer credential
    #[arg(long, global = true, env = "DASHNOTE_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read and write annotations on a dashboard
    #[command(subcommand)]
    Annotations(AnnotationCommands),
    /// Inspect dashboards
    #[command(subcommand)]
    Dashboard(DashboardCommands),
    /// Show the signed-in user
    Whoami,
}

#[derive(Subcommand, Debug)]
enum AnnotationCommands {
    /// List merged annotations for a panel
    List(ListArgs),
    /// Create an annotation in the dashboard's built-in store
    Add(AddArgs),
    /// Change the text or tags of an existing annotation
    Update(UpdateArgs),
    /// Delete an annotation
    Delete(DeleteArgs),
}

#[derive(Subcommand, Debug)]
enum DashboardCommands {
    /// Load a dashboard and print its annotation sources
    Show {
        /// Dashboard uid; the home dashboard when omitted
        uid: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ScopeArgs {
    /// Dashboard uid
    #[arg(long)]
    dashboard: String,

    /// Panel id
    #[arg(long, default_value_t = 1)]
    panel: i64,

    /// Start of the range (`now-6h`, epoch millis, ...)
    #[arg(long, default_value = "now-6h")]
    from: String,

    /// End of the range
    #[arg(long, default_value = "now")]
    to: String,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[command(flatten)]
    scope: ScopeArgs,

    /// Fetch the panel's alert state as well
    #[arg(long)]
    alerts: bool,

    /// Print raw JSON instead of a listing
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct AddArgs {
    #[command(flatten)]
    scope: ScopeArgs,

    #[arg(long)]
    text: String,

    /// Comma-separated tags
    #[arg(long, value_delimiter = ',')]
    tags: Vec<String>,

    /// Event time in epoch millis; now when omitted
    #[arg(long)]
    time: Option<i64>,

    /// Region end in epoch millis
    #[arg(long)]
    time_end: Option<i64>,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    #[command(flatten)]
    scope: ScopeArgs,

    #[arg(long)]
    id: String,

    #[arg(long)]
    text: Option<String>,

    /// Replacement tags, comma-separated
    #[arg(long, value_delimiter = ',')]
    tags: Option<Vec<String>>,
}

#[derive(Args, Debug)]
struct DeleteArgs {
    #[command(flatten)]
    scope: ScopeArgs,

    #[arg(long)]
    id: String,
}

struct Context {
    config: CoreConfig,
    backend: BackendClient,
    hub: NotificationHub,
    session: SessionUser,
}

impl Context {
    async fn connect(config: CoreConfig) -> Result<Self, CliError> {
        let backend = BackendClient::from_config(&config)?;
        let session = SessionUser::fetch(&backend).await?;
        debug!(login = %session.login, "session resolved");

        Ok(Self {
            config,
            backend,
            hub: NotificationHub::default(),
            session,
        })
    }

    fn bootstrap(&self) -> DashboardBootstrap {
        let resolver = Arc::new(HttpDatasourceResolver::new(
            self.backend.clone(),
            self.config.native_datasource.clone(),
        ));
        let coordinator = Arc::new(
            AnnotationsCoordinator::new(
                self.backend.clone(),
                resolver,
                Arc::new(self.hub.clone()),
                self.session.clone(),
            )
            .with_native_datasource(self.config.native_datasource.clone()),
        );
        let loader: Arc<dyn DashboardLoader> = Arc::new(self.backend.clone());

        DashboardBootstrap::new(
            loader,
            coordinator,
            Arc::new(NoopServices),
            Arc::new(self.hub.clone()),
            self.session.clone(),
            self.config.clone(),
        )
    }

    async fn load(
        &self,
        bootstrap: &DashboardBootstrap,
        uid: Option<&str>,
    ) -> Result<Arc<DashboardModel>, CliError> {
        let args = match uid {
            Some(uid) => InitDashboardArgs {
                fix_url: false,
                ..InitDashboardArgs::by_uid(uid, format!("/d/{}", uid))
            },
            None => InitDashboardArgs::home(),
        }
        .with_query("orgId", self.session.org_id.to_string());

        match bootstrap.init_dashboard(&args).await {
            BootstrapOutcome::Ready { dashboard, .. } => Ok(dashboard),
            BootstrapOutcome::Redirect(location) => Err(CliError::Validation(format!(
                "dashboard moved to {}",
                location.path.unwrap_or_default()
            ))),
            BootstrapOutcome::Failed(err) => Err(err.into()),
        }
    }
}

fn options(dashboard: Arc<DashboardModel>, scope: &ScopeArgs) -> Result<AnnotationOptions, CliError> {
    let panel = dashboard
        .panel(scope.panel)
        .map(PanelRef::from)
        .unwrap_or_else(|| PanelRef::new(scope.panel));
    Ok(AnnotationOptions {
        range: TimeRange::parse(&scope.from, &scope.to)?,
        panel,
        dashboard,
    })
}

/// Finds an event shown on the panel, keeping the source it was read from.
async fn find_event(
    coordinator: &AnnotationsCoordinator,
    options: &AnnotationOptions,
    id: &str,
) -> Result<AnnotationEvent, CliError> {
    coordinator
        .get_annotations(options)
        .await
        .annotations
        .into_iter()
        .find(|event| event.id.as_ref().map(|event_id| event_id.as_str()) == Some(id))
        .ok_or_else(|| CliError::NotFound(id.to_string()))
}

fn report(outcome: WriteOutcome, action: &str) {
    match outcome {
        WriteOutcome::Applied => print_success(&format!("Annotation {}", action)),
        WriteOutcome::Denied => print_warning("You may only change your own annotations"),
        WriteOutcome::Failed(reason) => print_error(&format!("Annotation not {}: {}", action, reason)),
    }
}

fn load_config(cli: &Cli) -> Result<CoreConfig, CliError> {
    let mut config = CoreConfig::from_env()?;
    if let Some(url) = &cli.backend {
        config.backend_url = url.clone();
    }
    if let Some(token) = &cli.token {
        config.api_token = Some(token.clone());
    }
    Ok(config)
}

async fn run(cli: Cli, config: CoreConfig) -> Result<(), CliError> {
    let ctx = Context::connect(config).await?;
    let mut notifications = ctx.hub.subscribe();

    let result = match &cli.command {
        Commands::Whoami => {
            print_user(&ctx.session);
            Ok(())
        }
        Commands::Dashboard(DashboardCommands::Show { uid }) => {
            let bootstrap = ctx.bootstrap();
            let dashboard = ctx.load(&bootstrap, uid.as_deref()).await?;
            print_dashboard(&dashboard);
            Ok(())
        }
        Commands::Annotations(command) => annotations(&ctx, command).await,
    };

    drain_notifications(&mut notifications);
    result
}

async fn annotations(ctx: &Context, command: &AnnotationCommands) -> Result<(), CliError> {
    let bootstrap = ctx.bootstrap();
    let coordinator = bootstrap.coordinator().clone();

    match command {
        AnnotationCommands::List(args) => {
            let dashboard = ctx.load(&bootstrap, Some(&args.scope.dashboard)).await?;
            let mut options = options(dashboard, &args.scope)?;
            if args.alerts {
                options.panel = options.panel.with_alert();
            }
            let result = coordinator.get_annotations(&options).await;

            if args.json {
                let rendered = serde_json::to_string_pretty(&result.annotations)
                    .map_err(|err| CliError::Validation(err.to_string()))?;
                println!("{}", rendered);
                return Ok(());
            }
            if result.annotations.is_empty() {
                println!("No annotations in range.");
            }
            for event in &result.annotations {
                print_event(event);
            }
            if let Some(state) = &result.alert_state {
                print_alert_state(state);
            }
        }
        AnnotationCommands::Add(args) => {
            let dashboard = ctx.load(&bootstrap, Some(&args.scope.dashboard)).await?;
            let time = args
                .time
                .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
            let mut event = AnnotationEvent::new(time, args.text.clone())
                .with_panel(args.scope.panel)
                .with_tags(args.tags.iter().cloned())
                .with_user(ctx.session.id);
            if let Some(id) = dashboard.id() {
                event = event.with_dashboard(id);
            }
            event.dashboard_uid = dashboard.uid().map(str::to_string);
            if let Some(end) = args.time_end {
                event = event.with_time_end(end);
                event.is_region = end != time;
            }
            report(coordinator.save_annotation_event(&event).await?, "added");
        }
        AnnotationCommands::Update(args) => {
            if args.text.is_none() && args.tags.is_none() {
                return Err(CliError::Validation(
                    "nothing to update: pass --text or --tags".to_string(),
                ));
            }
            let dashboard = ctx.load(&bootstrap, Some(&args.scope.dashboard)).await?;
            let options = options(dashboard, &args.scope)?;
            let mut event = find_event(&coordinator, &options, &args.id).await?;
            if let Some(text) = &args.text {
                event.text = text.clone();
            }
            if let Some(tags) = &args.tags {
                event.tags = tags.clone();
            }
            report(coordinator.update_annotation_event(&event).await?, "updated");
        }
        AnnotationCommands::Delete(args) => {
            let dashboard = ctx.load(&bootstrap, Some(&args.scope.dashboard)).await?;
            let options = options(dashboard, &args.scope)?;
            let event = find_event(&coordinator, &options, &args.id).await?;
            report(coordinator.delete_annotation_event(&event).await?, "deleted");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match load_config(&cli) {
        Ok(config) => {
            if let Err(err) = init_from_config(&config) {
                eprintln!("failed to initialize logging: {}", err);
            }
            run(cli, config).await
        }
        Err(err) => Err(err),
    };

    if let Err(err) = result {
        print_error(&err.to_string());
        std::process::exit(1);
    }
}
