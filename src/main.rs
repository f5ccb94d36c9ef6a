use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use news_pusher::archive::{ArchiveStore, FileArchive};
use news_pusher::config::{Cli, Config};
use news_pusher::feed::FeedClient;
use news_pusher::notifier::{Notifier, ReqwestTransport};
use news_pusher::{runner, Outcome, PusherError};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match execute(&cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(level: &str) {
    // RUST_LOG wins when set and valid.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "news_pusher={level},reqwest=warn,hyper=warn,rustls=warn"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .with_target(false)
        .init();
}

async fn execute(cli: &Cli) -> anyhow::Result<ExitCode> {
    let config = match Config::from_cli(cli) {
        Ok(c) => c,
        Err(e @ PusherError::ConfigurationMissing(_)) => {
            return Err(e)
                .context("set DINGTALK_WEBHOOK and DINGTALK_SECRET (or --webhook/--secret)");
        }
        Err(e) => return Err(e).context("invalid configuration"),
    };

    let run_id = Uuid::new_v4();
    let span = info_span!("run", %run_id);

    async move {
        info!(
            feed = %config.feed.url,
            webhook_host = %config.credential.host(),
            archive = ?config.archive.as_ref().map(|a| &a.dir),
            "starting"
        );

        let feed = FeedClient::new(config.timeout).context("failed to build HTTP client")?;
        let transport =
            ReqwestTransport::new(config.timeout).context("failed to build HTTP client")?;
        let notifier = Notifier::new(Arc::new(transport), config.message.clone());

        let mut file_archive = config.archive.as_ref().map(|a| FileArchive::new(a.dir.clone()));
        let archive = file_archive.as_mut().map(|a| a as &mut dyn ArchiveStore);

        let outcome = runner::run(&config, &feed, &notifier, archive, chrono::Utc::now()).await;

        match &outcome {
            Outcome::DryRun { message } => println!("{message}"),
            Outcome::DeliveryFailed(result) => error!(?result, "delivery failed"),
            other => info!(outcome = ?other, "finished"),
        }

        Ok::<_, anyhow::Error>(ExitCode::from(outcome.exit_code() as u8))
    }
    .instrument(span)
    .await
}
