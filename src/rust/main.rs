use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use tokio::sync::watch;
use tokio::time::Instant;

use textclf_console::{
    render_report, ConsoleConfig, NotificationChannel, NotificationPhase, NotificationState, OperationKind,
    OperationStatus, ParameterForm, PipelineController,
};

#[derive(Parser)]
#[command(author, version, about = "Drive the text classification pipeline", long_about = None)]
struct Cli {
    /// Base URL of the classification service (overrides TEXTCLF_SERVICE_URL)
    #[arg(long)]
    service_url: Option<String>,

    /// Give up on an operation after this many seconds (0 waits forever)
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract category keywords and n-grams from a corpus
    Preprocess(CorpusArgs),
    /// Train the model on the preprocessed corpus
    Train,
    /// Evaluate the trained model
    Test,
    /// Preprocess, train and test, stopping at the first failure
    Run(CorpusArgs),
}

#[derive(Args)]
struct CorpusArgs {
    /// Location of the corpus on the service host
    #[arg(long, default_value = "")]
    file_path: String,

    /// Number of articles to read
    #[arg(long, default_value = "")]
    articles: String,

    /// Number of categories to extract
    #[arg(long, default_value = "")]
    categories: String,

    /// Enable dimension reduction down to this many features
    #[arg(long)]
    reduce_to: Option<String>,
}

impl Command {
    fn steps(&self) -> &'static [OperationKind] {
        match self {
            Command::Preprocess(_) => &[OperationKind::Preprocess],
            Command::Train => &[OperationKind::Train],
            Command::Test => &[OperationKind::Test],
            Command::Run(_) => &OperationKind::ALL,
        }
    }

    fn corpus(&self) -> Option<&CorpusArgs> {
        match self {
            Command::Preprocess(corpus) | Command::Run(corpus) => Some(corpus),
            Command::Train | Command::Test => None,
        }
    }
}

fn fill_form(form: &ParameterForm, corpus: &CorpusArgs) {
    form.set_file_path(corpus.file_path.as_str());
    form.set_article_count(corpus.articles.as_str());
    form.set_category_count(corpus.categories.as_str());
    match &corpus.reduce_to {
        Some(threshold) => {
            form.select_dimension_reduction("yes");
            form.set_reduction_threshold(threshold.as_str());
        }
        None => form.select_dimension_reduction("no"),
    }
}

async fn print_notifications(mut receiver: watch::Receiver<NotificationState>) {
    while receiver.changed().await.is_ok() {
        let state = receiver.borrow_and_update().clone();
        if state.phase == NotificationPhase::Appearing {
            if let Some(message) = state.active_message {
                eprintln!(">> {}", message);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = ConsoleConfig::from_env();
    if let Some(url) = cli.service_url.clone() {
        config = config.with_service_url(url);
    }
    if let Some(secs) = cli.timeout_secs {
        config = config.with_operation_timeout((secs > 0).then(|| Duration::from_secs(secs)));
    }
    config.validate().context("Invalid console configuration")?;

    info!("=== Text Classifier console ({}) ===", config.service_url);

    let notifier = NotificationChannel::new(config.notification);
    let printer = tokio::spawn(print_notifications(notifier.subscribe()));
    let controller = PipelineController::with_http(&config, ParameterForm::new(), notifier.clone())?;

    if let Some(corpus) = cli.command.corpus() {
        fill_form(controller.form(), corpus);
    }

    let mut failed = None;
    for &kind in cli.command.steps() {
        // Let the previous outcome finish displaying; the channel drops overlapping messages.
        notifier.wait_until_hidden().await;

        let started = Instant::now();
        info!("Requesting {}", kind);
        let status = match controller.request(kind) {
            Some(handle) => handle.wait().await,
            None => OperationStatus::Idle,
        };
        info!("{} ended as {:?} after {:.2?}", kind, status, started.elapsed());

        if status != OperationStatus::Succeeded {
            failed = Some(kind);
            break;
        }
    }

    print!("{}", render_report(&controller.result()));

    notifier.wait_until_hidden().await;
    printer.abort();

    if let Some(kind) = failed {
        bail!("{} did not succeed", kind);
    }
    Ok(())
}
