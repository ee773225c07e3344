//! trickshelf - CLI entry point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};
use trickshelf::{
    api::{ApiClient, UploadProgress},
    cli::{display, Args, Commands, TerminalMirror, Verbosity},
    config::AppConfig,
    controllers::{
        prepare_for_render, CsrfToken, ForgotPasswordForm, PasswordController, ResetPasswordForm,
        TrickController,
    },
    dom::{self, Document},
    progress::{ProgressBar, ProgressOptions, ProgressStatus},
    shell::{open_store, SessionBootstrap},
};

fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbosity());

    let mut config = AppConfig::load(args.config.clone())?;
    if let Some(base_url) = &args.base_url {
        config.server.base_url = Some(base_url.clone());
        config.validate()?;
    }

    let outcome = match &args.command {
        Commands::Demo {
            operations,
            speed,
            trickle,
            seed,
        } => run_demo(&args, &config, *operations, *speed, *trickle, *seed).await,
        Commands::Tricks { user_id, username } => {
            list_user_tricks(&args, &config, user_id, username).await
        }
        Commands::AllTricks => list_all_tricks(&args, &config).await,
        Commands::ImportBookmarks { file } => import_bookmarks(&args, &config, file).await,
        Commands::Session => show_session(&config).await,
        Commands::ForgotPassword { email } => forgot_password(&args, &config, email).await,
        Commands::ResetPassword {
            token,
            password,
            confirm,
        } => reset_password(&args, &config, token, password, confirm).await,
        Commands::Config => show_config(&args, &config),
    };

    if let Err(e) = &outcome {
        display::show_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

/// Indicator on a scratch document, configured like a booted page
fn page_indicator(
    config: &AppConfig,
    overrides: &ProgressOptions,
    seed: Option<u64>,
) -> Result<ProgressBar> {
    let mut settings = config.progress.to_settings();
    settings.apply(overrides);
    settings.validate()?;
    let document = dom::shared(Document::new());
    let bar = match seed {
        Some(seed) => ProgressBar::with_seed(document, settings, seed)?,
        None => ProgressBar::with_settings(document, settings)?,
    };
    Ok(bar)
}

async fn run_demo(
    args: &Args,
    config: &AppConfig,
    operations: usize,
    speed: Option<u64>,
    trickle: bool,
    seed: Option<u64>,
) -> Result<()> {
    let verbosity = args.verbosity();
    let overrides = ProgressOptions {
        speed,
        trickle: Some(trickle),
        ..ProgressOptions::default()
    };
    let progress = page_indicator(config, &overrides, seed)?;

    if verbosity.show_progress() {
        display::show_banner(&format!("{} progress demo", config.app.name));
    }

    let handles: Vec<_> = (0..operations)
        .map(|i| {
            let delay = Duration::from_millis(400 * (i as u64 + 1));
            progress.promise(tokio::time::sleep(delay))
        })
        .collect();

    if verbosity.show_markup() {
        let doc = dom::lock(progress.document());
        println!("{}\n", doc.outer_html(doc.document_element()).dimmed());
    }

    let mirror = TerminalMirror::new(verbosity.show_progress());
    mirror.set_message(format!("{} operations", operations));
    mirror
        .follow(&progress, futures_util::future::join_all(handles))
        .await
        .into_iter()
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("simulated operation failed")?;
    mirror.finish("done");

    let doc = dom::lock(progress.document());
    println!("{}", doc.outer_html(doc.document_element()));
    Ok(())
}

async fn list_user_tricks(
    args: &Args,
    config: &AppConfig,
    user_id: &str,
    username: &str,
) -> Result<()> {
    let controller = trick_controller(args, config)?;
    let progress = page_indicator(config, &ProgressOptions::default(), None)?;
    let mirror = TerminalMirror::new(args.verbosity().show_progress());
    mirror.set_message(format!("tricks by {}", username));

    let (user_id, username) = (user_id.to_string(), username.to_string());
    let listing = mirror
        .follow(
            &progress,
            progress.promise(async move { controller.tricks_by_user(&user_id, &username).await }),
        )
        .await??;
    mirror.finish(format!("{} tricks", listing.tricks_count));

    display::show_cards(&prepare_for_render(listing.tricks));
    Ok(())
}

async fn list_all_tricks(args: &Args, config: &AppConfig) -> Result<()> {
    let controller = trick_controller(args, config)?;
    let progress = page_indicator(config, &ProgressOptions::default(), None)?;
    let mirror = TerminalMirror::new(args.verbosity().show_progress());
    mirror.set_message("all tricks");

    let tricks = mirror
        .follow(&progress, progress.promise(async move { controller.all_tricks().await }))
        .await??;
    mirror.finish(format!("{} tricks", tricks.len()));

    display::show_cards(&prepare_for_render(tricks));
    Ok(())
}

async fn import_bookmarks(args: &Args, config: &AppConfig, file: &Path) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bookmarks.html".to_string());

    let controller = trick_controller(args, config)?;
    let mirror = TerminalMirror::new(args.verbosity().show_progress());
    mirror.set_message(format!("uploading {}", file_name));

    let upload_mirror = mirror.clone();
    let message = controller
        .import_bookmark(&file_name, bytes, move |sent: UploadProgress| {
            upload_mirror.update(ProgressStatus::Ratio(sent.ratio()))
        })
        .await?;
    mirror.finish("uploaded");
    display::show_success(message.as_deref().unwrap_or("Bookmarks imported."));
    Ok(())
}

fn trick_controller(args: &Args, config: &AppConfig) -> Result<TrickController> {
    let store = Arc::new(open_store(config)?);
    Ok(TrickController::new(
        ApiClient::from_config(config)?,
        store,
        CsrfToken::from_option(args.csrf.clone()),
        config.tricks_ttl(),
        None,
    ))
}

async fn show_session(config: &AppConfig) -> Result<()> {
    let store = Arc::new(open_store(config)?);
    let client = ApiClient::from_config(config)?;
    let session = SessionBootstrap::new(client, store, config.session_ttl());
    let user = session.current_user().await?;

    println!("{} {}", "Signed in as".dimmed(), user.username.bold());
    if let Some(name) = &user.name {
        println!("  Name:  {}", name);
    }
    if let Some(email) = &user.email {
        println!("  Email: {}", email);
    }
    Ok(())
}

fn password_controller(
    args: &Args,
    config: &AppConfig,
) -> Result<(PasswordController, ProgressBar)> {
    let progress = page_indicator(config, &ProgressOptions::default(), None)?;
    let controller = PasswordController::new(
        ApiClient::from_config(config)?,
        progress.clone(),
        CsrfToken::from_option(args.csrf.clone()),
    );
    Ok((controller, progress))
}

async fn forgot_password(args: &Args, config: &AppConfig, email: &str) -> Result<()> {
    let (controller, progress) = password_controller(args, config)?;
    let mirror = TerminalMirror::new(args.verbosity().show_progress());
    let form = ForgotPasswordForm {
        email: email.to_string(),
    };
    let message = mirror
        .follow(&progress, controller.forgot_password(&form))
        .await?;
    mirror.finish("sent");
    display::show_success(&message);
    Ok(())
}

async fn reset_password(
    args: &Args,
    config: &AppConfig,
    token: &str,
    password: &str,
    confirm: &str,
) -> Result<()> {
    let (controller, progress) = password_controller(args, config)?;
    let mirror = TerminalMirror::new(args.verbosity().show_progress());
    let form = ResetPasswordForm {
        new_password: password.to_string(),
        confirm_new_password: confirm.to_string(),
    };
    let target = mirror
        .follow(&progress, controller.reset_password(token, &form))
        .await?;
    mirror.finish("reset");
    display::show_success(&format!(
        "Password updated, sign in at {}{}",
        config.base_url(),
        target
    ));
    Ok(())
}

fn show_config(args: &Args, config: &AppConfig) -> Result<()> {
    display::show_banner("trickshelf configuration");

    println!("Environment: {}", config.environment.as_str());
    println!("App:         {}", config.app.name);
    println!();

    println!("Server:");
    println!("  Base URL:  {}", config.base_url());
    println!("  API:       {}", config.api_base_url());
    println!("  Timeout:   {}s", config.http.timeout_sec);
    println!();

    println!("Storage:");
    match config.storage_path() {
        Some(path) => println!("  File:         {}", path.display()),
        None => println!("  File:         (in memory)"),
    }
    println!("  Session TTL:  {} ms", config.storage.session_ttl_ms);
    println!("  Tricks TTL:   {} ms", config.storage.tricks_ttl_ms);
    println!();

    let settings = config.progress.to_settings();
    println!("Progress:");
    println!("  Minimum:  {}", settings.minimum);
    println!("  Easing:   {}", settings.easing);
    println!("  Speed:    {} ms", settings.speed_ms);
    println!("  Trickle:  {}", if settings.trickle { "enabled" } else { "disabled" });
    println!();

    println!("Verbosity: {}", args.verbosity().as_str());
    if let Some(path) = AppConfig::default_path() {
        println!("Config file: {}", path.display());
    }
    println!();

    Ok(())
}
