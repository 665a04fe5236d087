//! petlog - command-line client for the shared pet-care log
//!
//! Wires together:
//! - Configuration loading and flag overrides
//! - The HTTP backend and its session
//! - The home model (cached bundle, activity cards, writes)

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use clap::{Args as ClapArgs, Parser, Subcommand};
use petlog_api::{
    ActivityKind, CurrentUser, Gender, NewGroup, Profile, ProfileUpdate, RegisterRequest,
    parse_wire_time,
};
use petlog_client::{HttpBackend, Session};
use petlog_config::{Settings, load_config_or_default, normalize_base_url};
use petlog_core::{
    ActivityStatus, CoreEvent, HomeModel, HomeView, LoadPolicy, format_status_line,
};
use petlog_util::{SystemClock, default_config_path, format_clock_time};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// petlog - shared pet-care log
#[derive(Parser, Debug)]
#[command(name = "petlog")]
#[command(about = "Check pet-care schedules and record activities for your group", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/petlog/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Backend base URL override (or set PETLOG_BASE_URL env var)
    #[arg(long, env = "PETLOG_BASE_URL")]
    base_url: Option<String>,

    /// Access token (or set PETLOG_TOKEN env var)
    #[arg(long, env = "PETLOG_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Refresh token (or set PETLOG_REFRESH_TOKEN env var)
    #[arg(long, env = "PETLOG_REFRESH_TOKEN", hide_env_values = true)]
    refresh_token: Option<String>,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the activity cards
    Status,

    /// Keep the cards current and print status changes until Ctrl-C
    Watch {
        /// Seconds between server refreshes (default from config)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Record an activity (feeding, watering, poop)
    Log {
        kind: ActivityKind,

        /// Who did it
        #[arg(long)]
        by: String,

        #[arg(long)]
        memo: Option<String>,
    },

    /// Read or edit the group's care note
    #[command(subcommand)]
    Note(NoteCommand),

    /// Create, join or share a group
    #[command(subcommand)]
    Group(GroupCommand),

    /// Edit the pet profile or schedules
    Profile(ProfileArgs),

    /// Sign in and manage the account
    #[command(subcommand)]
    Auth(AuthCommand),
}

#[derive(Subcommand, Debug)]
enum NoteCommand {
    Show,
    /// Replace the note; empty text deletes it
    Set { text: String },
    Clear,
}

#[derive(Subcommand, Debug)]
enum GroupCommand {
    /// Create a group around a new pet
    Create(CreateGroupArgs),
    /// Join a group by invite code
    Join { code: String },
    /// Print the invite code
    Invite,
}

#[derive(ClapArgs, Debug)]
struct CreateGroupArgs {
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "")]
    age: String,
    /// Weight in kg
    #[arg(long, default_value_t = 0.0)]
    weight: f64,
    #[arg(long, default_value = "female")]
    gender: Gender,
    #[arg(long, default_value = "")]
    image_url: String,
    /// Hours between feedings
    #[arg(long)]
    feeding_cycle: u32,
    /// Last feeding, YYYY-MM-DDTHH:MM (default: now)
    #[arg(long, value_parser = parse_time)]
    last_feeding: Option<DateTime<Local>>,
    /// Hours between water changes
    #[arg(long)]
    watering_cycle: u32,
    /// Last water change, YYYY-MM-DDTHH:MM (default: now)
    #[arg(long, value_parser = parse_time)]
    last_watering: Option<DateTime<Local>>,
    #[arg(long)]
    notice: Option<String>,
}

#[derive(ClapArgs, Debug)]
struct ProfileArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    age: Option<String>,
    #[arg(long)]
    weight: Option<f64>,
    #[arg(long)]
    gender: Option<Gender>,
    #[arg(long)]
    image_url: Option<String>,
    #[arg(long)]
    feeding_cycle: Option<u32>,
    #[arg(long, value_parser = parse_time)]
    last_feeding: Option<DateTime<Local>>,
    #[arg(long)]
    watering_cycle: Option<u32>,
    #[arg(long, value_parser = parse_time)]
    last_watering: Option<DateTime<Local>>,
    #[arg(long)]
    notice: Option<String>,
}

impl From<ProfileArgs> for ProfileUpdate {
    fn from(args: ProfileArgs) -> Self {
        ProfileUpdate {
            image_url: args.image_url,
            name: args.name,
            age: args.age,
            weight_kg: args.weight,
            gender: args.gender,
            feeding_cycle_hours: args.feeding_cycle,
            last_feeding_time: args.last_feeding,
            watering_cycle_hours: args.watering_cycle,
            last_watering_time: args.last_watering,
            notice: args.notice,
        }
    }
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Sign in with a provider account and print the tokens as shell exports
    Login {
        #[arg(long, default_value = "kakao")]
        provider: String,
        #[arg(long)]
        oauth_id: String,
        #[arg(long)]
        email: Option<String>,
        /// Register the account if it does not exist yet
        #[arg(long)]
        register: bool,
        #[arg(long)]
        nickname: Option<String>,
    },
    /// Exchange a Kakao authorization code for tokens
    Kakao { code: String },
    /// Renew the access token
    Refresh,
    /// Show the signed-in account
    Whoami,
    /// Delete the account
    Withdraw,
}

fn parse_time(s: &str) -> std::result::Result<DateTime<Local>, String> {
    parse_wire_time(s).ok_or_else(|| format!("expected YYYY-MM-DDTHH:MM, got '{}'", s))
}

/// Command-line client state
struct App {
    settings: Settings,
    backend: Arc<HttpBackend>,
    model: HomeModel<HttpBackend>,
}

impl App {
    fn new(args: &Args) -> Result<Self> {
        let mut settings = load_config_or_default(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        if let Some(url) = &args.base_url {
            settings.client.base_url = normalize_base_url(url);
        }

        info!(
            config_path = %args.config.display(),
            base_url = %settings.client.base_url,
            "Configuration loaded"
        );

        let session = Arc::new(Session::with_tokens(
            args.token.clone(),
            args.refresh_token.clone(),
        ));
        let backend = Arc::new(
            HttpBackend::new(&settings.client, session)
                .context("Failed to create HTTP client")?,
        );

        let model = HomeModel::new(Arc::clone(&backend), Arc::new(SystemClock))
            .with_ttl(settings.client.cache_ttl)
            .with_swipe_threshold(settings.cards.swipe_threshold);

        Ok(Self {
            settings,
            backend,
            model,
        })
    }

    async fn run(self, command: Command) -> Result<()> {
        match command {
            Command::Status => self.status().await,
            Command::Watch { interval } => {
                let interval = interval
                    .map(Duration::from_secs)
                    .unwrap_or(self.settings.cards.refresh_interval);
                self.watch(interval).await
            }
            Command::Log { kind, by, memo } => self.log(kind, &by, memo).await,
            Command::Note(cmd) => self.note(cmd).await,
            Command::Group(cmd) => self.group(cmd).await,
            Command::Profile(args) => self.profile(args.into()).await,
            Command::Auth(cmd) => self.auth(cmd).await,
        }
    }

    async fn status(&self) -> Result<()> {
        self.model.refresh(LoadPolicy::UseCache).await;
        let view = self.model.view();
        if view.cards.is_empty()
            && !view.is_empty
            && let Some(err) = &view.error
        {
            bail!("Failed to load home: {}", err);
        }
        print_view(&view);
        Ok(())
    }

    async fn watch(&self, interval: Duration) -> Result<()> {
        let mut refresh_timer = tokio::time::interval(interval);
        let mut tick_timer = tokio::time::interval(Duration::from_secs(1));
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        self.model.refresh(LoadPolicy::UseCache).await;
        print_view(&self.model.view());
        // Statuses were just printed; drop the events of the first load
        self.model.tick();

        info!(interval = ?interval, "Watching");

        loop {
            tokio::select! {
                result = &mut ctrl_c => {
                    result.context("Failed to listen for Ctrl-C")?;
                    info!("Received Ctrl-C, stopping");
                    break;
                }

                _ = refresh_timer.tick() => {
                    let cached = self.model.refresh(LoadPolicy::ForceRefresh).await;
                    if let Some(err) = &cached.last_error {
                        warn!(error = %err, "Refresh failed, showing last good data");
                    }
                    print_events(&self.model.tick());
                }

                _ = tick_timer.tick() => {
                    print_events(&self.model.tick());
                }
            }
        }

        Ok(())
    }

    async fn log(&self, kind: ActivityKind, by: &str, memo: Option<String>) -> Result<()> {
        self.model.refresh(LoadPolicy::UseCache).await;
        let record = self
            .model
            .submit_log(kind, by, memo)
            .await
            .with_context(|| format!("Failed to record {}", kind))?;
        debug!(id = %record.id, "Log stored");

        let view = self.model.view();
        match view.cards.iter().find(|card| card.kind == kind) {
            Some(card) => println!("{}", format_status_line(card)),
            None => println!("Recorded {}", kind),
        }
        Ok(())
    }

    async fn note(&self, cmd: NoteCommand) -> Result<()> {
        match cmd {
            NoteCommand::Show => match self.model.note().await.context("Failed to load note")? {
                Some(note) => println!("{}", note),
                None => println!("(no note)"),
            },
            NoteCommand::Set { text } => {
                self.model.save_note(&text).await.context("Failed to save note")?;
                println!("Note saved");
            }
            NoteCommand::Clear => {
                self.model.save_note("").await.context("Failed to delete note")?;
                println!("Note deleted");
            }
        }
        Ok(())
    }

    async fn group(&self, cmd: GroupCommand) -> Result<()> {
        match cmd {
            GroupCommand::Create(args) => {
                let now = petlog_util::now();
                let group = NewGroup {
                    profile: Profile {
                        image_url: args.image_url,
                        name: args.name,
                        age: args.age,
                        weight_kg: args.weight,
                        gender: args.gender,
                    },
                    feeding_cycle_hours: args.feeding_cycle,
                    last_feeding_time: args.last_feeding.unwrap_or(now),
                    watering_cycle_hours: args.watering_cycle,
                    last_watering_time: args.last_watering.unwrap_or(now),
                    notice: args.notice,
                };
                self.model
                    .create_group(&group)
                    .await
                    .context("Failed to create group")?;
                let view = self.model.view();
                match view.invite_code {
                    Some(code) => println!("Group created, invite code: {}", code),
                    None => println!("Group created"),
                }
            }
            GroupCommand::Join { code } => {
                self.model
                    .join_group(&code)
                    .await
                    .context("Failed to join group")?;
                print_view(&self.model.view());
            }
            GroupCommand::Invite => {
                let code = self
                    .model
                    .invite_code()
                    .await
                    .context("Failed to load invite code")?;
                println!("{}", code);
            }
        }
        Ok(())
    }

    async fn profile(&self, update: ProfileUpdate) -> Result<()> {
        if update.is_empty() {
            bail!("Nothing to update; pass at least one field");
        }
        self.model
            .update_profile(update)
            .await
            .context("Failed to update profile")?;
        print_view(&self.model.view());
        Ok(())
    }

    async fn auth(&self, cmd: AuthCommand) -> Result<()> {
        let backend = &self.backend;
        match cmd {
            AuthCommand::Login {
                provider,
                oauth_id,
                email,
                register,
                nickname,
            } => {
                let login = backend.login(&provider, &oauth_id, email.as_deref()).await;
                let credentials = match login {
                    Err(err) if err.is_not_found() && register => {
                        info!(provider = %provider, "Account not found, registering");
                        let request = RegisterRequest {
                            oauth_provider: provider,
                            oauth_id,
                            email,
                            nickname,
                            profile_image_url: None,
                        };
                        backend.register(&request).await.context("Failed to register")?
                    }
                    other => other.context("Failed to sign in")?,
                };
                print_exports(&credentials.access_token, credentials.refresh_token.as_deref());
            }
            AuthCommand::Kakao { code } => {
                let credentials = backend
                    .kakao_login(&code)
                    .await
                    .context("Failed to exchange Kakao code")?;
                print_exports(&credentials.access_token, credentials.refresh_token.as_deref());
            }
            AuthCommand::Refresh => {
                let token = backend.refresh().await.context("Failed to refresh token")?;
                print_exports(&token, None);
            }
            AuthCommand::Whoami => {
                let user = backend
                    .current_user()
                    .await
                    .context("Failed to load account")?;
                print_user(&user);
            }
            AuthCommand::Withdraw => {
                backend.withdraw().await.context("Failed to delete account")?;
                println!("Account deleted");
                println!("unset PETLOG_TOKEN PETLOG_REFRESH_TOKEN");
            }
        }
        Ok(())
    }
}

fn print_view(view: &HomeView) {
    if view.is_empty {
        println!("No group yet. Create one with `petlog group create` or join with `petlog group join <code>`.");
        return;
    }
    if let Some(name) = &view.pet_name {
        println!("{}", name);
    }
    for card in &view.cards {
        println!("{}", format_status_line(card));
    }
    if let Some(err) = &view.error {
        eprintln!("warning: {}", err);
    }
}

fn print_events(events: &[CoreEvent]) {
    for event in events {
        println!("[{}] {}", format_clock_time(&petlog_util::now()), describe_event(event));
    }
}

fn describe_event(event: &CoreEvent) -> String {
    match event {
        CoreEvent::StatusChanged {
            kind,
            previous,
            current,
        } => {
            let marker = if current.needs_attention() { " (!)" } else { "" };
            format!(
                "{}: {} -> {}{}",
                kind,
                bucket_name(previous),
                bucket_name(current),
                marker
            )
        }
        CoreEvent::CompletionConfirmed { kind } => format!("{}: confirmed by server", kind),
        CoreEvent::HomeCleared => "group no longer available".to_string(),
    }
}

fn bucket_name(status: &ActivityStatus) -> &'static str {
    match status {
        ActivityStatus::Upcoming { .. } => "upcoming",
        ActivityStatus::Due => "due",
        ActivityStatus::Overdue { .. } => "overdue",
    }
}

fn print_exports(access_token: &str, refresh_token: Option<&str>) {
    println!("export PETLOG_TOKEN={}", access_token);
    if let Some(refresh) = refresh_token {
        println!("export PETLOG_REFRESH_TOKEN={}", refresh);
    }
}

fn print_user(user: &CurrentUser) {
    println!("user:     {}", user.user_id);
    println!("provider: {}", user.oauth_provider);
    if let Some(nickname) = &user.nickname {
        println!("nickname: {}", nickname);
    }
    if let Some(email) = &user.email {
        println!("email:    {}", email);
    }
    match &user.group_id {
        Some(group) => println!("group:    {}", group),
        None => println!("group:    (none)"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    debug!(version = env!("CARGO_PKG_VERSION"), "petlog starting");
    if petlog_util::is_mock_time_active() {
        warn!(now = %petlog_util::now(), "Mock time is active, schedules use a shifted clock");
    }

    let app = App::new(&args)?;
    app.run(args.command).await
}
