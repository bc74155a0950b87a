use crate::cli::GenerateArgs;
use crate::config::Config;
use crate::provider::create_provider;
use crate::runner::{Generator, TriviaQuestionDraft};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub async fn execute(args: GenerateArgs) -> anyhow::Result<()> {
    if args.count == 0 {
        anyhow::bail!("--count must be at least 1");
    }

    let mut config = Config::discover(args.question.config.as_deref())?;

    if let Some(concurrency) = args.concurrency {
        config.generation.concurrency = concurrency;
    }
    config.validate()?;

    let provider = create_provider(&config)?;
    info!(
        provider = provider.name(),
        models = config.provider.models.len(),
        "Provider ready"
    );

    // Ctrl-C cancels in-flight requests and pending backoff sleeps
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling generation");
            on_signal.cancel();
        }
    });

    let request = args.question.to_request(&config.generation);
    let generator = Arc::new(Generator::new(provider, config.generation.clone()));

    let results = if args.count == 1 {
        vec![generator.generate(&request, &cancel).await]
    } else {
        generator.generate_batch(&request, args.count, &cancel).await
    };

    let produced = results.len();
    let mut failures = 0;
    for result in results {
        match result {
            Ok(draft) => print_draft(&draft, args.compact)?,
            Err(e) => {
                failures += 1;
                error!("{}: {}", e, e.cause);
            }
        }
    }

    check_outcome(args.count, produced, failures)
}

/// Every requested question must come back as a draft; lost tasks count as failures
fn check_outcome(requested: usize, produced: usize, failures: usize) -> anyhow::Result<()> {
    let failed = failures + requested.saturating_sub(produced);
    if failed > 0 {
        anyhow::bail!("{} of {} generations failed", failed, requested);
    }
    Ok(())
}

fn print_draft(draft: &TriviaQuestionDraft, compact: bool) -> anyhow::Result<()> {
    let json = if compact {
        serde_json::to_string(draft)?
    } else {
        serde_json::to_string_pretty(draft)?
    };
    println!("{}", json);
    Ok(())
}
