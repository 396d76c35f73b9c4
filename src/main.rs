use clap::Parser;
use color_eyre::eyre::eyre;
use log::*;
use std::{env, sync::Arc};
use strum::IntoEnumIterator;

use depwatch::{
    Result,
    adapter::CheckOptions,
    cli::{Args, Command},
    config::Config,
    entity::Ecosystem,
    forge::github::Github,
    git::{GitOrchestrator, credentials::GitIdentity},
    process::{CommandRunner, SystemRunner},
    scheduler::WatchScheduler,
    store::{MemoryStore, Store},
    watcher::Watcher,
};

fn initialize_logger(debug: bool) -> Result<()> {
    let filter = if debug {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };

    let config = simplelog::ConfigBuilder::new()
        .add_filter_allow_str("depwatch")
        .build();

    simplelog::TermLogger::init(
        filter,
        config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    Ok(())
}

/// Everything the commands share, built once from the configuration.
struct App {
    store: Arc<dyn Store>,
    watcher: Arc<Watcher>,
}

impl App {
    async fn build(config: &Config) -> Result<Self> {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);

        let store: Arc<dyn Store> = match config.store_file.as_deref() {
            Some(path) => Arc::new(MemoryStore::open(path).await?),
            None => Arc::new(MemoryStore::new()),
        };
        config.sync_into(store.as_ref()).await?;

        let env_dir = match config.env_dir.clone() {
            Some(dir) => dir,
            None => env::current_dir()?,
        };
        let identity = Arc::new(GitIdentity::discover(&env_dir).await?);

        let git = Arc::new(GitOrchestrator::new(
            runner.clone(),
            store.clone(),
            identity,
            Arc::new(Github::new()),
        ));
        let watcher = Arc::new(Watcher::new(
            runner,
            store.clone(),
            git,
            config.work_dir.clone(),
        ));

        Ok(Self { store, watcher })
    }
}

async fn watch(config: &Config, once: bool) -> Result<()> {
    let app = App::build(config).await?;
    let scheduler = WatchScheduler::new(
        app.store,
        app.watcher,
        config.run_interval(),
        config.tick_delay(),
    );

    let registered = scheduler.register_new_projects().await?;
    info!("registered {registered} new projects");

    if once {
        scheduler.tick().await?;
        return Ok(());
    }

    scheduler
        .run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("failed to listen for ctrl-c: {err}");
                std::future::pending::<()>().await;
            }
        })
        .await
}

async fn check(
    config: &Config,
    name: &str,
    validity_only: bool,
) -> color_eyre::Result<()> {
    let app = App::build(config).await?;

    let project = app
        .store
        .find_project_by_name(name)
        .await?
        .ok_or_else(|| eyre!("project {name} is not configured"))?;

    let options = CheckOptions { validity_only };
    let project = app.watcher.check(project, options).await?;

    if validity_only {
        println!("{} is a valid {} project", project.name, project.ecosystem);
        return Ok(());
    }

    for dependency in project.dependencies() {
        let available = dependency.available_versions()?;
        if available.is_empty() {
            println!("{} {}", dependency.name, dependency.current_version);
        } else {
            println!(
                "{} {} -> {}",
                dependency.name,
                dependency.current_version,
                available.join(", ")
            );
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli_args = Args::parse();

    initialize_logger(cli_args.debug)?;

    let config = Config::load(&cli_args.config).await?;

    match cli_args.command {
        Command::Watch { once } => watch(&config, once).await?,
        Command::Check {
            name,
            validity_only,
        } => check(&config, &name, validity_only).await?,
        Command::Types => {
            for ecosystem in Ecosystem::iter() {
                println!("{ecosystem}");
            }
        }
    }

    Ok(())
}
