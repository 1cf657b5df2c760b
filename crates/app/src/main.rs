mod args;

use std::sync::Arc;

use doric_core::ConnectivityStatus;
use doric_core::geo::{GeoPoint, distance_to_aberdeen};
use doric_core::lesson::LessonSequence;
use doric_core::model::{UserId, UserProfile};
use services::connectivity::{probe_reachable, status_after_probe};
use services::place_summary::REFERENCE_PLACE;
use services::{
    AppServices, Clock, ConnectivityObserver, HttpRemoteStore, PlaceSummaryClient, ProbeConfig,
    ProbeConnectivity, RemoteConfig, SummaryConfig,
};

use crate::args::{Args, Command, Invocation, print_usage};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_lesson(args: &Args) -> Result<LessonSequence, Box<dyn std::error::Error>> {
    match &args.lesson_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            Ok(LessonSequence::from_json(&raw)?)
        }
        None => Ok(LessonSequence::conversation()),
    }
}

/// One probe for commands that run once. Without a remote there is nothing
/// to reach, so the answer is `Unavailable`.
async fn one_shot_status(
    offline: bool,
    remote_enabled: bool,
) -> Result<ConnectivityStatus, Box<dyn std::error::Error>> {
    if offline || !remote_enabled {
        return Ok(ConnectivityStatus::Unavailable);
    }
    let probe = ProbeConfig::from_env()?;
    let reachable = probe_reachable(&probe.addr, probe.timeout).await;
    Ok(status_after_probe(ConnectivityStatus::Unavailable, reachable))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let invocation = Invocation::parse_env().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    let args = match invocation {
        Invocation::Help => {
            print_usage();
            return Ok(());
        }
        Invocation::About => return about().await,
        Invocation::Distance(point) => {
            distance(&point);
            return Ok(());
        }
        Invocation::Run(args) => args,
    };

    let lesson = load_lesson(&args)?;
    let remote_config = RemoteConfig::from_env_with_url(args.remote_url.as_deref())?;
    let remote = HttpRemoteStore::new(remote_config)?;
    let remote_enabled = remote.enabled();
    if !remote_enabled {
        tracing::info!("no remote store configured, progress stays queued locally");
    }

    tracing::debug!(db = %args.db_url, course = lesson.course(), "opening local store");
    let services =
        AppServices::new_sqlite(&args.db_url, Clock::default(), lesson, Arc::new(remote)).await?;

    let user = args.user.clone();
    match args.command {
        Command::Login => login(&services, &args).await,
        Command::Train => train(&services, user, args.steps, args.offline, remote_enabled).await,
        Command::Status => status(&services, &user).await,
        Command::Sync => sync(&services, &user, remote_enabled).await,
        Command::Reset => {
            services.progress().reset_progress(&user).await?;
            println!("Progress reset for {user}");
            Ok(())
        }
        Command::Delete => {
            services.progress().delete_account(&user).await?;
            println!("Deleted all progress for {user}");
            Ok(())
        }
        Command::Watch => watch(&services, user).await,
    }
}

async fn about() -> Result<(), Box<dyn std::error::Error>> {
    let client = PlaceSummaryClient::new(SummaryConfig::from_env()?)?;
    let summary = client.summary_or_empty(REFERENCE_PLACE).await;
    println!("{REFERENCE_PLACE}");
    if !summary.is_empty() {
        println!("{summary}");
    }
    Ok(())
}

fn distance(point: &GeoPoint) {
    println!("Distance to Aberdeen: {}", distance_to_aberdeen(point));
}

async fn login(services: &AppServices, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let profile = UserProfile::new(
        args.user.clone(),
        args.name.as_deref().unwrap_or_default(),
        args.email.as_deref().unwrap_or_default(),
    )?;
    let record = services.progress().bootstrap_user(&profile).await?;
    println!(
        "Signed in as {} at step {}",
        profile.name(),
        record.last_step_index()
    );
    println!("{}", services.progress().widget_text(Some(profile.id())).await?);
    Ok(())
}

async fn train(
    services: &AppServices,
    user: UserId,
    steps: u32,
    offline: bool,
    remote_enabled: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let network = one_shot_status(offline, remote_enabled).await?;
    if network.is_available() {
        services.orchestrator().drain_pending(&user).await?;
    }

    let mut session = services.start_training(user.clone()).await;
    if let Some(sentence) = session.current_sentence() {
        println!("{} = {}", sentence.doric, sentence.translation);
    }
    for _ in 0..steps {
        if session.is_complete() {
            println!("Course complete");
            break;
        }
        let outcome = session.next(network).await?;
        if let Some(sentence) = session.current_sentence() {
            let marker = if outcome.is_synced() { "synced" } else { "queued" };
            println!("{} = {} [{marker}]", sentence.doric, sentence.translation);
        }
    }
    println!("{}", services.progress().widget_text(Some(&user)).await?);
    Ok(())
}

async fn status(services: &AppServices, user: &UserId) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", services.progress().widget_text(Some(user)).await?);
    for course in services.progress().course_progress(user).await? {
        println!(
            "{}: {:.0} (step {})",
            course.course, course.progress, course.last_step_index
        );
    }
    let pending = services.orchestrator().pending(user).await?;
    println!("Pending sync entries: {}", pending.len());
    Ok(())
}

async fn sync(
    services: &AppServices,
    user: &UserId,
    remote_enabled: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let network = one_shot_status(false, remote_enabled).await?;
    if !network.is_available() {
        let pending = services.orchestrator().pending(user).await?;
        println!("Offline; {} entries still queued", pending.len());
        return Ok(());
    }
    if services.orchestrator().drain_pending(user).await? {
        println!("Pending progress synced");
    } else {
        let pending = services.orchestrator().pending(user).await?;
        println!("Nothing synced; {} entries still queued", pending.len());
    }
    Ok(())
}

async fn watch(services: &AppServices, user: UserId) -> Result<(), Box<dyn std::error::Error>> {
    let probe = ProbeConnectivity::spawn(ProbeConfig::from_env()?);
    let worker = services.spawn_sync_worker(probe.observe(), user.clone());
    let mut network = probe.observe();
    let mut feed = services.progress().subscribe(&user).await?;

    println!("{}", services.progress().widget_text(Some(&user)).await?);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            next = network.changed() => match next {
                Some(status) => println!("Network: {status}"),
                None => break,
            },
            record = feed.changed() => match record {
                Ok(Some(record)) => println!("Your progress: {}%", record.progress().percent()),
                Ok(None) => println!("No progress saved"),
                Err(err) => {
                    tracing::warn!(error = %err, "progress feed closed");
                    break;
                }
            },
        }
    }

    feed.cancel();
    worker.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
