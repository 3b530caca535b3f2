//! Headless operator console for a remote text-classification pipeline.
//!
//! The console drives three remote operations (preprocessing a corpus,
//! training the gcForest model, testing it) and turns their payloads into a
//! display model of category keywords, n-grams and test metrics. Outcomes are
//! surfaced through a single-slot, self-expiring notification channel.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use textclf_console::{ConsoleConfig, NotificationChannel, ParameterForm, PipelineController};
//!
//! let config = ConsoleConfig::from_env();
//! let form = ParameterForm::new();
//! form.set_file_path("/data/corpus");
//! form.set_article_count("1000");
//! form.set_category_count("5");
//!
//! let notifier = NotificationChannel::new(config.notification);
//! let controller = PipelineController::with_http(&config, form, notifier)?;
//!
//! if let Some(handle) = controller.request_preprocess() {
//!     handle.wait().await;
//! }
//! println!("{:?}", controller.result().categories);
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! Different operation kinds may be in flight at the same time; a second
//! request for a kind that is already running is ignored. All state is
//! published through `tokio::sync::watch` channels so views can subscribe.

pub mod config;
pub mod controller;
pub mod error;
pub mod fields;
pub mod notification;
pub mod projection;
pub mod remote;
pub mod report;
pub mod runner;

pub use config::{ConsoleConfig, NotificationTimings};
pub use controller::{PipelineController, INCOMPLETE_FIELDS_MESSAGE};
pub use error::{ConfigError, FieldError, RemoteError};
pub use fields::{FieldSnapshot, FormValues, ParameterForm};
pub use notification::{NotificationChannel, NotificationPhase, NotificationState};
pub use projection::{
    project_metrics, project_preprocess, Metric, PipelineResult, PreprocessPayload, TestMetrics, WordGroup,
    WordSets,
};
pub use remote::{ClassificationService, HttpClassificationService, PreprocessRequest};
pub use report::render_report;
pub use runner::{OperationHandle, OperationKind, OperationRunner, OperationState, OperationStatus};

pub fn init_logger() {
    env_logger::init();
}
