use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use actix_web::{App, http::StatusCode, test};
use async_trait::async_trait;
use chatbot::{
    Candidate, DatasetError, DatasetProvider, GenerationError, GenerationParams, ModelHandle,
    ModelLoadError, ModelProvider, ModelSelection, RecordStream, TextGenerator,
};
use chatbot_server::{
    config::ModelConfig,
    startup::{AppData, Services},
};
use futures::{StreamExt, stream};
use serde_json::{Value, json};
use uuid::Uuid;

struct Echo(String);

#[async_trait]
impl TextGenerator for Echo {
    fn model_id(&self) -> &str {
        &self.0
    }

    async fn generate(
        &self,
        prompt: &str,
        _params: GenerationParams,
    ) -> Result<Vec<Candidate>, GenerationError> {
        match prompt {
            "boom" => return Err(GenerationError::Backend("model crashed".into())),
            "slow" => tokio::time::sleep(Duration::from_millis(200)).await,
            _ => {}
        }
        Ok(vec![Candidate::new(format!("{prompt}! {prompt}!"))])
    }
}

/// `gpt2` loads, `distilgpt2` is missing, everything else is unreachable.
#[derive(Clone, Default)]
struct FakeModels {
    loads: Arc<AtomicUsize>,
}

#[async_trait]
impl ModelProvider for FakeModels {
    async fn load(&self, selection: &ModelSelection) -> Result<ModelHandle, ModelLoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match selection.as_str() {
            "gpt2" => Ok(Arc::new(Echo(selection.to_string()))),
            "distilgpt2" => Err(ModelLoadError::NotFound(selection.to_string())),
            other => Err(ModelLoadError::Backend {
                model: other.to_string(),
                source: "hub unreachable".into(),
            }),
        }
    }
}

struct FakeDatasets;

#[async_trait]
impl DatasetProvider for FakeDatasets {
    async fn stream(&self, dataset_id: &str, limit: usize) -> Result<RecordStream, DatasetError> {
        if dataset_id == "owner/missing" {
            return Err(DatasetError::NotFound(dataset_id.to_string()));
        }
        let records = (0..limit.min(10)).map(|i| Ok(json!({ "text": format!("row {i}") })));
        Ok(stream::iter(records).boxed())
    }
}

fn app_data(models: FakeModels) -> AppData {
    AppData::new(Services::new(
        models,
        FakeDatasets,
        ModelConfig::new("gpt2").unwrap(),
    ))
}

macro_rules! init_app {
    ($data:expr) => {
        test::init_service(App::new().configure(|config| $data.configure(config))).await
    };
}

macro_rules! create_session {
    ($app:expr) => {{
        let req = test::TestRequest::post().uri("/sessions").to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        body["id"].as_str().unwrap().to_string()
    }};
}

fn submit(id: &str, body: Value) -> test::TestRequest {
    test::TestRequest::post()
        .uri(&format!("/sessions/{id}/messages"))
        .set_json(body)
}

fn get(uri: &str) -> test::TestRequest {
    test::TestRequest::get().uri(uri)
}

#[actix_web::test]
async fn serves_chat_page_and_health_check() {
    let data = app_data(FakeModels::default());
    let app = init_app!(data);

    let resp = test::call_service(&app, get("/").to_request()).await;
    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/html; charset=utf-8"
    );
    let body = test::read_body(resp).await;
    assert!(String::from_utf8_lossy(&body).contains("AI Chatbot"));

    let resp = test::call_service(&app, get("/health_check").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn lists_selectable_models() {
    let data = app_data(FakeModels::default());
    let app = init_app!(data);

    let body: Value = test::call_and_read_body_json(&app, get("/models").to_request()).await;
    assert_eq!(
        body,
        json!({
            "models": ["distilgpt2", "gpt2", "EleutherAI/gpt-neo-125M"],
            "default": "gpt2",
            "loaded": []
        })
    );
}

#[actix_web::test]
async fn chat_turns_are_recorded_in_order() {
    let models = FakeModels::default();
    let data = app_data(models.clone());
    let app = init_app!(data);
    let id = create_session!(app);

    let req = submit(&id, json!({ "model": "gpt2", "prompt": "Hello" })).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["state"], "idle");
    assert_eq!(
        body["messages"],
        json!([
            { "role": "user", "content": "Hello" },
            { "role": "assistant", "content": "Hello! Hello!" }
        ])
    );

    // model falls back to the configured default
    let req = submit(&id, json!({ "prompt": "Again" })).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["messages"].as_array().unwrap().len(), 4);
    assert_eq!(body["messages"][3]["content"], "Again! Again!");

    let req = get(&format!("/sessions/{id}")).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["messages"].as_array().unwrap().len(), 4);

    // the model was loaded once and reused
    assert_eq!(models.loads.load(Ordering::SeqCst), 1);
    let body: Value = test::call_and_read_body_json(&app, get("/models").to_request()).await;
    assert_eq!(body["loaded"], json!(["gpt2"]));
}

#[actix_web::test]
async fn failed_generation_keeps_user_message() {
    let data = app_data(FakeModels::default());
    let app = init_app!(data);
    let id = create_session!(app);

    let req = submit(&id, json!({ "prompt": "boom" })).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Generation failed: model crashed");

    let req = get(&format!("/sessions/{id}")).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["messages"], json!([{ "role": "user", "content": "boom" }]));
}

#[actix_web::test]
async fn model_load_failure_blocks_the_turn() {
    let models = FakeModels::default();
    let data = app_data(models.clone());
    let app = init_app!(data);
    let id = create_session!(app);

    let resp = test::call_service(
        &app,
        submit(&id, json!({ "model": "distilgpt2", "prompt": "Hello" })).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = test::call_service(
        &app,
        submit(&id, json!({ "model": "EleutherAI/gpt-neo-125M", "prompt": "Hello" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let req = get(&format!("/sessions/{id}")).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["messages"], json!([]));
    assert_eq!(models.loads.load(Ordering::SeqCst), 2);
}

#[actix_web::test]
async fn unlisted_model_is_never_loaded() {
    let models = FakeModels::default();
    let data = app_data(models.clone());
    let app = init_app!(data);
    let id = create_session!(app);

    let resp = test::call_service(
        &app,
        submit(&id, json!({ "model": "bert-base-uncased", "prompt": "Hello" })).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::post()
        .uri("/models/load")
        .set_json(json!({ "model": "bert-base-uncased" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["error"],
        "Model bert-base-uncased is not one of the selectable models"
    );

    assert_eq!(models.loads.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn preload_model() {
    let data = app_data(FakeModels::default());
    let app = init_app!(data);

    let req = test::TestRequest::post()
        .uri("/models/load")
        .set_json(json!({ "model": "gpt2" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({ "model": "gpt2" }));

    let req = test::TestRequest::post()
        .uri("/models/load")
        .set_json(json!({ "model": "distilgpt2" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn empty_prompt_is_rejected() {
    let data = app_data(FakeModels::default());
    let app = init_app!(data);
    let id = create_session!(app);

    let resp = test::call_service(&app, submit(&id, json!({ "prompt": "  " })).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = get(&format!("/sessions/{id}")).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["messages"], json!([]));
}

#[actix_web::test]
async fn clear_chat_empties_transcript() {
    let data = app_data(FakeModels::default());
    let app = init_app!(data);
    let id = create_session!(app);

    for prompt in ["one", "two", "boom"] {
        test::call_service(&app, submit(&id, json!({ "prompt": prompt })).to_request()).await;
    }

    let req = test::TestRequest::delete()
        .uri(&format!("/sessions/{id}/messages"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["messages"], json!([]));
}

#[actix_web::test]
async fn concurrent_turn_is_rejected_as_busy() {
    let data = app_data(FakeModels::default());
    let app = init_app!(data);
    let id = create_session!(app);

    let slot = data
        .sessions()
        .get(&Uuid::parse_str(&id).unwrap())
        .unwrap();
    let _in_flight = slot.lock().await;

    let req = submit(&id, json!({ "prompt": "Hello" })).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["error"],
        "A response is still being generated for this session"
    );

    let req = test::TestRequest::delete()
        .uri(&format!("/sessions/{id}/messages"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn session_reports_generating_during_turn() {
    let data = app_data(FakeModels::default());
    let app = init_app!(data);
    let id = create_session!(app);
    test::call_service(&app, submit(&id, json!({ "prompt": "Hello" })).to_request()).await;

    let turn = test::call_service(&app, submit(&id, json!({ "prompt": "slow" })).to_request());
    let read_during_turn = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let req = get(&format!("/sessions/{id}")).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        body
    };
    let (resp, during) = futures::join!(turn, read_during_turn);

    assert_eq!(during["state"], "generating");
    assert_eq!(during["messages"].as_array().unwrap().len(), 2);

    assert_eq!(resp.status(), StatusCode::OK);
    let req = get(&format!("/sessions/{id}")).to_request();
    let after: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(after["state"], "idle");
    assert_eq!(after["messages"][3]["content"], "slow! slow!");
}

#[actix_web::test]
async fn idle_sessions_are_dropped() {
    let data = AppData::new(
        Services::new(
            FakeModels::default(),
            FakeDatasets,
            ModelConfig::new("gpt2").unwrap(),
        )
        .with_session_idle_timeout(Duration::ZERO),
    );
    let app = init_app!(data);

    let first = create_session!(app);
    for _ in 0..20 {
        create_session!(app);
    }
    assert_eq!(data.sessions().len(), 1);

    let resp = test::call_service(&app, get(&format!("/sessions/{first}")).to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn unknown_session_is_not_found() {
    let data = app_data(FakeModels::default());
    let app = init_app!(data);
    let id = Uuid::new_v4();

    let resp = test::call_service(&app, get(&format!("/sessions/{id}")).to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = submit(&id.to_string(), json!({ "prompt": "Hi" })).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], format!("Session {id} not found"));
}

#[actix_web::test]
async fn deleted_session_is_gone() {
    let data = app_data(FakeModels::default());
    let app = init_app!(data);
    let id = create_session!(app);

    let req = test::TestRequest::delete()
        .uri(&format!("/sessions/{id}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(data.sessions().is_empty());

    let resp = test::call_service(&app, get(&format!("/sessions/{id}")).to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn dataset_preview_is_isolated_from_chat() {
    let data = app_data(FakeModels::default());
    let app = init_app!(data);
    let id = create_session!(app);
    test::call_service(&app, submit(&id, json!({ "prompt": "Hello" })).to_request()).await;

    let req = test::TestRequest::post()
        .uri("/datasets/preview")
        .set_json(json!({ "dataset": "microsoft/DialogStudio" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["dataset"], "microsoft/DialogStudio");
    assert_eq!(body["sample_size"], 1000);
    assert_eq!(
        body["records"],
        json!([{ "text": "row 0" }, { "text": "row 1" }, { "text": "row 2" }])
    );

    let req = test::TestRequest::post()
        .uri("/datasets/preview")
        .set_json(json!({ "dataset": "owner/missing" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::post()
        .uri("/datasets/preview")
        .set_json(json!({ "dataset": "" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = get(&format!("/sessions/{id}")).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
}
