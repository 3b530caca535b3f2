use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use env_logger::{Builder, Env};
use serde_json::{json, Value};

use textclf_console::{
    ClassificationService, ConsoleConfig, HttpClassificationService, NotificationChannel, OperationStatus,
    ParameterForm, PipelineController, RemoteError,
};

type SeenQueries = Arc<Mutex<Vec<HashMap<String, String>>>>;

fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("warn")).try_init();
}

async fn spawn_service(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn preprocess(State(seen): State<SeenQueries>, Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    seen.lock().unwrap().push(params);
    let data = json!({
        "Keywords": [["股票", "市场"], ["比赛"]],
        "2-gram": ["股票 市场"],
        "3-gram": ["股票 市场 上涨"],
    });
    Json(json!({ "code": 200, "data": data.to_string() }))
}

fn service_app(seen: SeenQueries, train_code: i64) -> Router {
    Router::new()
        .route("/preProcess", get(preprocess))
        .route("/gcForest/train", get(move || async move { Json(json!({ "code": train_code })) }))
        .route(
            "/gcForest/test",
            get(|| async { r#"{"zeta":0.1,"alpha":"0.2","mid":3,"acc":0.9512}"# }),
        )
        .with_state(seen)
}

fn controller_for(url: &str) -> PipelineController {
    let config = ConsoleConfig::default().with_service_url(url);
    PipelineController::with_http(&config, ParameterForm::new(), NotificationChannel::default()).unwrap()
}

#[tokio::test]
async fn test_preprocess_over_http() {
    init();
    let seen = SeenQueries::default();
    let url = spawn_service(service_app(seen.clone(), 200)).await;
    let controller = controller_for(&url);

    let form = controller.form();
    form.set_file_path("/corpus/sogou");
    form.set_article_count("500");
    form.set_category_count("2");
    form.select_dimension_reduction("yes");
    form.set_reduction_threshold("300");

    let status = controller.request_preprocess().unwrap().wait().await;
    assert_eq!(status, OperationStatus::Succeeded);

    let result = controller.result();
    assert_eq!(result.categories.len(), 2);
    assert_eq!(result.categories[0].name, "类别 1");
    assert_eq!(result.categories[0].words, vec!["股票".to_string(), "市场".to_string()]);
    assert_eq!(result.categories[1].name, "类别 2");
    assert_eq!(result.bigrams, vec!["股票 市场".to_string()]);
    assert_eq!(result.trigrams, vec!["股票 市场 上涨".to_string()]);

    let queries = seen.lock().unwrap();
    let query = &queries[0];
    assert_eq!(query["filePath"], "/corpus/sogou");
    assert_eq!(query["fileNumber"], "500");
    assert_eq!(query["categoryNumber"], "2");
    assert_eq!(query["dimensionReduction"], "true");
    assert_eq!(query["reductionNumber"], "300");
}

#[tokio::test]
async fn test_reduction_number_not_sent_when_disabled() {
    init();
    let seen = SeenQueries::default();
    let url = spawn_service(service_app(seen.clone(), 200)).await;
    let controller = controller_for(&url);

    let form = controller.form();
    form.set_file_path("/corpus/sogou");
    form.set_article_count("500");
    form.set_category_count("2");
    form.set_reduction_threshold("300");

    controller.request_preprocess().unwrap().wait().await;

    let queries = seen.lock().unwrap();
    assert_eq!(queries[0]["dimensionReduction"], "false");
    assert!(!queries[0].contains_key("reductionNumber"));
}

#[tokio::test]
async fn test_train_rejected_by_envelope() {
    init();
    let url = spawn_service(service_app(SeenQueries::default(), 500)).await;
    let controller = controller_for(&url);

    let status = controller.request_train().unwrap().wait().await;
    assert_eq!(status, OperationStatus::Failed);
    assert_eq!(controller.notifier().state().active_message.as_deref(), Some("训练失败"));
}

#[tokio::test]
async fn test_train_transport_error_is_contained() {
    init();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let controller = controller_for(&format!("http://{}", addr));
    let status = controller.request_train().unwrap().wait().await;
    assert_eq!(status, OperationStatus::Failed);
    assert_eq!(controller.notifier().state().active_message.as_deref(), Some("训练失败"));
}

#[tokio::test]
async fn test_transport_error_variant() {
    init();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = ConsoleConfig::default().with_service_url(format!("http://{}", addr));
    let service = HttpClassificationService::from_config(&config).unwrap();
    assert!(matches!(service.train().await, Err(RemoteError::Transport(_))));
}

#[tokio::test]
async fn test_metrics_order_survives_http() {
    init();
    let url = spawn_service(service_app(SeenQueries::default(), 200)).await;
    let controller = controller_for(&url);

    let status = controller.request_test().unwrap().wait().await;
    assert_eq!(status, OperationStatus::Succeeded);

    let rows = controller.result().test_metrics.display_rows();
    assert_eq!(
        rows,
        vec![
            ("zeta".to_string(), "0.100000".to_string()),
            ("alpha".to_string(), "0.200000".to_string()),
            ("mid".to_string(), "3.000000".to_string()),
            ("acc".to_string(), "95.12%".to_string()),
        ]
    );
}
