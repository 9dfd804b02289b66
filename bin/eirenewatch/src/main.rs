mod cli;
mod taskfile;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eirene_config::{parse_config, parse_process_data, ProcessConfig, ProcessItem};
use eirene_pool::ManagerPool;
use eirene_supervisor::{DataDeriver, Supervisor};
use eirene_spawn::SpawnError;
use eirene_tasks::{LaunchContext, LaunchError, TaskTemplate};
use eirene_watch::NotifyWatcher;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::cli::Cli;
use crate::taskfile::{expand_paths, TaskFile};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let mut task_file_paths: Vec<PathBuf> = Vec::new();
    for pattern in &cli.task_files {
        match expand_paths(pattern) {
            Ok(paths) => task_file_paths.extend(paths),
            Err(err) => {
                eprintln!("error: {err}");
                std::process::exit(1);
            }
        }
    }

    let mut task_files = Vec::new();
    for path in &task_file_paths {
        match taskfile::load(path) {
            Ok(file) => task_files.push(file),
            Err(err) => {
                eprintln!("error: {err}");
                std::process::exit(1);
            }
        }
    }

    let root_cancel = CancellationToken::new();

    let mut handles = Vec::new();
    for file in task_files {
        let supervisor = match build_supervisor(&file, root_cancel.clone()) {
            Ok(supervisor) => supervisor,
            Err(err) => {
                error!(error = %err, config = %file.config.display(), "failed to start watcher");
                continue;
            }
        };

        let shutdown = root_cancel.clone();
        handles.push(tokio::spawn(supervisor.run(shutdown)));
    }

    let root_cancel_for_signal = root_cancel.clone();
    wait_for_shutdown(root_cancel_for_signal).await;

    for handle in handles {
        let _ = handle.await;
    }
}

async fn wait_for_shutdown(root_cancel: CancellationToken) {
    eirene_supervisor::wait_shutdown_signal().await;
    tracing::info!("shutdown signal received");
    root_cancel.cancel();

    // Subsequent signals are ignored with a warning rather than acted on a
    // second time; this keeps listening only to log that fact.
    tokio::spawn(async {
        loop {
            eirene_supervisor::wait_shutdown_signal().await;
            warn!("shutdown already in progress, ignoring signal");
        }
    });
}

fn build_supervisor(
    file: &TaskFile,
    parent_cancel: CancellationToken,
) -> anyhow::Result<Supervisor<ProcessConfig, ProcessItem>> {
    let template_spec = file.template.clone();
    let retry = template_spec.retry.to_policy();
    let throttle = template_spec.throttle.to_throttle();
    let cwd = template_spec.cwd.clone();
    let command = template_spec.command.clone();
    let base_args = template_spec.args.clone();

    let launch = Arc::new(move |ctx: LaunchContext<ProcessConfig, ProcessItem>| {
        let command = command.clone();
        let mut args = base_args.clone();
        let mut extra: Vec<_> = ctx.data.args.iter().collect();
        extra.sort_by(|a, b| a.0.cmp(b.0));
        for (key, value) in extra {
            args.push(format!("--{key}={value}"));
        }

        async move {
            ctx.spawn.run(&command, &args).await.map_err(|err| match err {
                SpawnError::Cancelled => LaunchError::Cancelled,
                other => LaunchError::Failed(other.into()),
            })
        }
        .boxed()
    });

    let mut builder = TaskTemplate::builder(template_spec.name.clone(), launch)
        .parent_cancel(parent_cancel)
        .retry(retry)
        .throttle(throttle)
        .initial_run(template_spec.initial_run)
        .interruptible(template_spec.interruptible)
        .persistent(template_spec.persistent);
    if let Some(cwd) = cwd {
        builder = builder.cwd(cwd);
    }
    let template = Arc::new(builder.build()?);

    let pool = ManagerPool::new(template);
    let watcher = Box::new(NotifyWatcher::new(&file.config)?);

    let load_config = Arc::new(|raw: &str| parse_config(raw).map_err(anyhow::Error::from));
    let derive_data: DataDeriver<ProcessConfig, ProcessItem> =
        Arc::new(|config: &ProcessConfig| parse_process_data(config).into_iter().map(Some).collect());

    Ok(Supervisor::new(
        file.config.clone(),
        std::time::Duration::from_millis(file.wait_ms),
        watcher,
        pool,
        load_config,
        derive_data,
    ))
}

fn init_logging(cli: &Cli) {
    let format = cli.log_format;
    let result = if cli.verbose {
        eirene_tracing::TracingBuilder::with_format(format).with_filter("debug").and_then(|b| b.try_init())
    } else {
        if std::env::var("RUST_LOG").is_err() {
            eprintln!("warning: RUST_LOG is not set, using default log filter");
        }
        eirene_tracing::init(format)
    };

    if let Err(err) = result {
        eprintln!("warning: failed to initialize logging: {err}");
    }
}
