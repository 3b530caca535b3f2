use std::sync::Arc;

use tokio::sync::watch;

use crate::config::ConsoleConfig;
use crate::error::ConfigError;
use crate::fields::ParameterForm;
use crate::notification::NotificationChannel;
use crate::projection::{project_metrics, project_preprocess, PipelineResult, TestMetrics, WordSets};
use crate::remote::{ClassificationService, HttpClassificationService, PreprocessRequest};
use crate::runner::{OperationHandle, OperationKind, OperationRunner, OperationState};

/// Shown when preprocessing is requested with an incomplete form.
pub const INCOMPLETE_FIELDS_MESSAGE: &str = "信息未填写完整";

/// Owns the three operation runners and the results they produce.
///
/// No ordering is enforced between the operations: training and testing may
/// be requested before any preprocessing has succeeded. Each kind only
/// guards against overlapping with itself.
#[derive(Clone)]
pub struct PipelineController {
    form: ParameterForm,
    service: Arc<dyn ClassificationService>,
    notifier: NotificationChannel,
    preprocess: OperationRunner,
    train: OperationRunner,
    test: OperationRunner,
    result: Arc<watch::Sender<PipelineResult>>,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    #[allow(dead_code)]
    fn verify_thread_safety() {
        assert_send_sync::<PipelineController>();
        assert_send_sync::<NotificationChannel>();
    }
};

impl PipelineController {
    pub fn new(
        config: &ConsoleConfig,
        service: Arc<dyn ClassificationService>,
        form: ParameterForm,
        notifier: NotificationChannel,
    ) -> Self {
        let runner = |kind| OperationRunner::new(kind, notifier.clone(), config.operation_timeout);
        let preprocess = runner(OperationKind::Preprocess);
        let train = runner(OperationKind::Train);
        let test = runner(OperationKind::Test);
        let (result, _) = watch::channel(PipelineResult::default());
        Self {
            preprocess,
            train,
            test,
            result: Arc::new(result),
            form,
            service,
            notifier,
        }
    }

    /// Controller talking to the HTTP service named in `config`
    pub fn with_http(
        config: &ConsoleConfig,
        form: ParameterForm,
        notifier: NotificationChannel,
    ) -> Result<Self, ConfigError> {
        let service = HttpClassificationService::from_config(config)?;
        Ok(Self::new(config, Arc::new(service), form, notifier))
    }

    /// Validates the form and starts preprocessing.
    ///
    /// An incomplete form is reported on the notification channel and leaves
    /// the preprocess state untouched. Returns `None` when nothing started.
    pub fn request_preprocess(&self) -> Option<OperationHandle> {
        let snapshot = match self.form.snapshot() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::info!("Preprocess not started: {}", err);
                self.notifier.show(INCOMPLETE_FIELDS_MESSAGE);
                return None;
            }
        };

        let request = PreprocessRequest::from(&snapshot);
        let service = Arc::clone(&self.service);
        let result = Arc::clone(&self.result);
        self.preprocess.start(
            move || async move { service.preprocess(&request).await.map(project_preprocess) },
            move |sets: WordSets| result.send_modify(|r| r.replace_word_sets(sets)),
        )
    }

    /// Starts training. The model stays on the service; nothing is stored here.
    pub fn request_train(&self) -> Option<OperationHandle> {
        let service = Arc::clone(&self.service);
        self.train.start(move || async move { service.train().await }, |()| {})
    }

    pub fn request_test(&self) -> Option<OperationHandle> {
        let service = Arc::clone(&self.service);
        let result = Arc::clone(&self.result);
        self.test.start(
            move || async move { service.test().await.and_then(project_metrics) },
            move |metrics: TestMetrics| result.send_modify(|r| r.replace_test_metrics(metrics)),
        )
    }

    pub fn request(&self, kind: OperationKind) -> Option<OperationHandle> {
        match kind {
            OperationKind::Preprocess => self.request_preprocess(),
            OperationKind::Train => self.request_train(),
            OperationKind::Test => self.request_test(),
        }
    }

    pub fn runner(&self, kind: OperationKind) -> &OperationRunner {
        match kind {
            OperationKind::Preprocess => &self.preprocess,
            OperationKind::Train => &self.train,
            OperationKind::Test => &self.test,
        }
    }

    pub fn operation_state(&self, kind: OperationKind) -> OperationState {
        self.runner(kind).state()
    }

    pub fn subscribe_operation(&self, kind: OperationKind) -> watch::Receiver<OperationState> {
        self.runner(kind).subscribe()
    }

    pub fn cancel(&self, kind: OperationKind) -> bool {
        self.runner(kind).cancel()
    }

    pub fn result(&self) -> PipelineResult {
        self.result.borrow().clone()
    }

    pub fn subscribe_result(&self) -> watch::Receiver<PipelineResult> {
        self.result.subscribe()
    }

    pub fn form(&self) -> &ParameterForm {
        &self.form
    }

    pub fn notifier(&self) -> &NotificationChannel {
        &self.notifier
    }
}
