//! `termipics` command-line client.
//!
//! Drives the same session core as the web client: tokens persist in a JSON
//! file instead of cookies, and every protected command runs the bootstrap
//! pass and the route guard before touching the gallery.

mod api;
mod store;

#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;

use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use termipics::config::{
    ClientConfig, CONNECT_TIMEOUT_VAR, DEFAULT_SERVER_URL, GOOGLE_CLIENT_ID_VAR, OAUTH_REDIRECT_URI_VAR,
    REQUEST_TIMEOUT_VAR, SERVER_URL_VAR, Timeouts, normalize_base_url,
};
use termipics::gallery::{ImageQuery, Pager, SortBy, SortOrder, UserInfoKey, parse_labels};
use termipics::guard::{GuardDecision, ProtectedViewRequest};
use termipics::notice::Notice;
use termipics::oauth::{AuthorizationRequest, OAuthError, parse_callback};
use termipics::upload::{SelectedFile, UploadDraft, UploadError, guess_content_type};
use termipics::validation::{LoginForm, SignupForm};
use termipics::{ClientError, SessionCell, SessionStatus, SessionStore, SignOutCause, bootstrap, exchange, renewal};
use tracing_subscriber::EnvFilter;

use crate::api::HttpAuthority;
use crate::store::FileTokenStore;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("{0}")]
    Upload(#[from] UploadError),
    #[error("{0}")]
    OAuth(#[from] OAuthError),
    #[error("{0}")]
    NotLoggedIn(String),
    #[error("could not determine home directory; pass --session-file")]
    NoHomeDir,
    #[error("{}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to read input: {0}")]
    Input(io::Error),
    #[error("invalid session file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("http client setup failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Parser, Debug)]
#[command(name = "termipics", about = "TermiPics gallery command-line client")]
struct Cli {
    #[arg(long, env = SERVER_URL_VAR, default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    #[arg(long, env = "TERMIPICS_SESSION_FILE", help = "Token file (default ~/.termipics/session.json)")]
    session_file: Option<PathBuf>,

    #[arg(long, env = REQUEST_TIMEOUT_VAR, default_value_t = Timeouts::default().request_secs)]
    request_timeout_secs: u64,

    #[arg(long, env = CONNECT_TIMEOUT_VAR, default_value_t = Timeouts::default().connect_secs)]
    connect_timeout_secs: u64,

    #[arg(long, env = GOOGLE_CLIENT_ID_VAR)]
    google_client_id: Option<String>,

    #[arg(long, env = OAUTH_REDIRECT_URI_VAR)]
    oauth_redirect_uri: Option<String>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            server_url: normalize_base_url(&self.server_url),
            timeouts: Timeouts { request_secs: self.request_timeout_secs, connect_secs: self.connect_timeout_secs },
            google_client_id: self.google_client_id.clone(),
            oauth_redirect_uri: self.oauth_redirect_uri.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in with email and password.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TERMIPICS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Create an account; log in afterwards.
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long, env = "TERMIPICS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Print the Google sign-in URL to open in a browser.
    OauthUrl,
    /// Exchange a Google authorization code, or the full callback URL.
    Oauth {
        code: String,
        #[arg(long, help = "State printed by oauth-url, checked against the callback")]
        state: Option<String>,
    },
    /// Forget the stored session.
    Logout,
    /// Resolve the stored session and print its status.
    Status,
    /// Print the signed-in user's profile.
    Whoami,
    Images(ImagesCommand),
}

#[derive(Args, Debug)]
struct ImagesCommand {
    #[command(subcommand)]
    command: ImagesSubcommand,
}

#[derive(Subcommand, Debug)]
enum ImagesSubcommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: u64,
        #[arg(long, default_value_t = SortBy::default())]
        sort_by: SortBy,
        #[arg(long, default_value_t = SortOrder::default())]
        sort_order: SortOrder,
        #[arg(long, help = "Comma-separated labels to filter by")]
        labels: Option<String>,
    },
    Info {
        image_uid: String,
    },
    Upload {
        path: PathBuf,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "", help = "Comma-separated labels")]
        labels: String,
    },
}

type Session = RefCell<SessionStore<FileTokenStore>>;

struct CliContext {
    session: Session,
    api: HttpAuthority,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.client_config();
    let session_path = match &cli.session_file {
        Some(path) => path.clone(),
        None => FileTokenStore::default_path()?,
    };
    let store = FileTokenStore::open(session_path)?;
    let ctx = CliContext {
        session: RefCell::new(SessionStore::new(store, config.cookie_options())),
        api: HttpAuthority::new(config)?,
    };

    match cli.command {
        Command::Login { email, password } => run_login(&ctx, email, password).await,
        Command::Signup { email, username, password } => run_signup(&ctx, email, username, password).await,
        Command::OauthUrl => run_oauth_url(&ctx),
        Command::Oauth { code, state } => run_oauth(&ctx, &code, state.as_deref()).await,
        Command::Logout => {
            exchange::logout(&ctx.session);
            announce(&Notice::logged_out());
            Ok(())
        }
        Command::Status => run_status(&ctx).await,
        Command::Whoami => run_whoami(&ctx).await,
        Command::Images(images) => run_images(&ctx, images).await,
    }
}

async fn run_login(ctx: &CliContext, email: String, password: Option<String>) -> Result<(), CliError> {
    let password = password_or_prompt(password)?;
    let user_uid = exchange::login(&ctx.session, &ctx.api, &LoginForm { email, password }).await?;
    announce(&Notice::logged_in());
    println!("{user_uid}");
    Ok(())
}

async fn run_signup(ctx: &CliContext, email: String, username: String, password: Option<String>) -> Result<(), CliError> {
    let password = password_or_prompt(password)?;
    exchange::signup(&ctx.api, &SignupForm { email, username, password }).await?;
    announce(&Notice::account_created());
    eprintln!("log in with: termipics login --email <email>");
    Ok(())
}

fn run_oauth_url(ctx: &CliContext) -> Result<(), CliError> {
    let state = uuid::Uuid::new_v4().simple().to_string();
    let request = AuthorizationRequest::from_config(ctx.api.config(), state)?;
    println!("{}", request.authorization_url());
    eprintln!("state: {}", request.state);
    Ok(())
}

async fn run_oauth(ctx: &CliContext, input: &str, state: Option<&str>) -> Result<(), CliError> {
    let code = match input.split_once('?') {
        Some((_, query)) => parse_callback(query, state)?,
        None if input.contains("code=") => parse_callback(input, state)?,
        None => input.to_owned(),
    };
    match exchange::exchange_oauth_code(&ctx.session, &ctx.api, &code).await {
        Ok(user_uid) => {
            announce(&Notice::logged_in_with_google());
            println!("{user_uid}");
            Ok(())
        }
        Err(err) => {
            announce(&Notice::google_exchange_failed());
            Err(err.into())
        }
    }
}

async fn run_status(ctx: &CliContext) -> Result<(), CliError> {
    bootstrap::run(&ctx.session, &ctx.api).await;
    let status = ctx.session.read(|s| s.status().clone()).unwrap_or(SessionStatus::Resolving);
    match status {
        SessionStatus::Authenticated { user_uid } => println!("authenticated as {user_uid}"),
        SessionStatus::Unauthenticated { cause: SignOutCause::Expired } => println!("session expired"),
        SessionStatus::Unauthenticated { cause: SignOutCause::Unreachable } => {
            println!("server unreachable; stored session kept");
        }
        SessionStatus::Unauthenticated { .. } => println!("not logged in"),
        SessionStatus::Resolving => println!("resolving"),
    }
    Ok(())
}

async fn run_whoami(ctx: &CliContext) -> Result<(), CliError> {
    require_session(ctx, "whoami").await?;
    let info = renewal::with_access(&ctx.session, &ctx.api, |access| async move {
        ctx.api.user_info(&access, &UserInfoKey::PROFILE).await
    })
    .await?;
    println!("username:    {}", info.username().unwrap_or("-"));
    println!("avatar:      {}", info.avatar().unwrap_or("-"));
    println!("images:      {}", info.image_count());
    println!("labels:      {}", info.labels().join(", "));
    Ok(())
}

async fn run_images(ctx: &CliContext, images: ImagesCommand) -> Result<(), CliError> {
    match images.command {
        ImagesSubcommand::List { page, sort_by, sort_order, labels } => {
            require_session(ctx, "images list").await?;
            let query = ImageQuery {
                page: page.max(1),
                sort_by,
                sort_order,
                labels: labels.as_deref().map(parse_labels).unwrap_or_default(),
            };
            let listing = renewal::with_access(&ctx.session, &ctx.api, |access| {
                let query = &query;
                async move { ctx.api.list_images(&access, query).await }
            })
            .await?;
            let info = renewal::with_access(&ctx.session, &ctx.api, |access| async move {
                ctx.api.user_info(&access, &[UserInfoKey::ImageCount]).await
            })
            .await?;
            if listing.is_empty() {
                eprintln!("no images");
            }
            for image_uid in &listing.image_uid {
                println!("{image_uid}");
            }
            let pager = Pager::new(query.page, info.image_count());
            if pager.is_visible() {
                eprintln!("page {} / {}", pager.page, pager.total);
            }
            Ok(())
        }
        ImagesSubcommand::Info { image_uid } => {
            require_session(ctx, "images info").await?;
            let info = renewal::with_access(&ctx.session, &ctx.api, |access| {
                let image_uid = &image_uid;
                async move { ctx.api.image_info(&access, image_uid).await }
            })
            .await?;
            print_json(&serde_json::json!({
                "title": info.display_title(),
                "file_name": info.file_name,
                "labels": info.labels,
                "created": info.created_date(),
                "thumbnail": ctx.api.thumbnail_url(&image_uid),
            }))
        }
        ImagesSubcommand::Upload { path, title, labels } => {
            require_session(ctx, "images upload").await?;
            let bytes = std::fs::read(&path).map_err(|source| CliError::Io { path: path.clone(), source })?;
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let draft = UploadDraft {
                file: Some(SelectedFile {
                    content_type: guess_content_type(&name).unwrap_or_default().to_owned(),
                    size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
                    name,
                }),
                title,
                labels,
            };
            let upload = draft.validate()?;
            let result = renewal::with_access(&ctx.session, &ctx.api, |access| {
                let (upload, bytes) = (&upload, bytes.clone());
                async move { ctx.api.upload(&access, upload, bytes).await }
            })
            .await;
            match result {
                Ok(response) => {
                    announce(&Notice::uploaded());
                    println!("{}", response.image_uid.unwrap_or_default());
                    Ok(())
                }
                Err(err) => {
                    announce(&Notice::upload_failed());
                    Err(err.into())
                }
            }
        }
    }
}

/// Resolve the stored session and apply the route guard for `command`.
async fn require_session(ctx: &CliContext, command: &str) -> Result<(), CliError> {
    bootstrap::run(&ctx.session, &ctx.api).await;
    let status = ctx.session.read(|s| s.status().clone()).unwrap_or(SessionStatus::Resolving);
    match ProtectedViewRequest::new(command).resolve(&status) {
        GuardDecision::Render => Ok(()),
        GuardDecision::Redirect { notice: Some(notice), .. } => Err(CliError::NotLoggedIn(notice.text)),
        GuardDecision::Redirect { notice: None, .. } | GuardDecision::Pending => {
            Err(CliError::NotLoggedIn("not logged in; run `termipics login`".to_owned()))
        }
    }
}

fn password_or_prompt(password: Option<String>) -> Result<String, CliError> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint!("password: ");
    io::stderr().flush().map_err(CliError::Input)?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).map_err(CliError::Input)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

fn announce(notice: &Notice) {
    eprintln!("[{}] {}", notice.title, notice.text);
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
