use std::{net::TcpListener, time::Duration};

use actix_web::{
    App, HttpServer,
    dev::Server,
    middleware::{NormalizePath, TrailingSlash},
    web::{self, ServiceConfig},
};
use chatbot::{
    DatasetProvider, ModelCache, ModelProvider,
    huggingface::{HuggingFaceDatasets, HuggingFaceModels},
};
use tracing_actix_web::TracingLogger;

use crate::{
    config::{AppConfig, ModelConfig},
    handler,
    scope::{datasets::datasets_scope, models::models_scope, sessions::sessions_scope},
    session_store::{DEFAULT_IDLE_TIMEOUT, SessionStore},
};

pub struct DatasetSource(pub Box<dyn DatasetProvider>);

/// The external collaborators the server talks to.
pub struct Services {
    pub models: ModelCache,
    pub datasets: Box<dyn DatasetProvider>,
    pub model_config: ModelConfig,
    pub session_idle_timeout: Duration,
}

impl Services {
    pub fn new(
        models: impl ModelProvider + 'static,
        datasets: impl DatasetProvider + 'static,
        model_config: ModelConfig,
    ) -> Self {
        Self {
            models: ModelCache::new(models),
            datasets: Box::new(datasets),
            model_config,
            session_idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_session_idle_timeout(mut self, timeout: Duration) -> Self {
        self.session_idle_timeout = timeout;
        self
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let hf = &config.hugging_face;
        Self::new(
            HuggingFaceModels::new(hf.endpoints.clone(), hf.token.clone()),
            HuggingFaceDatasets::new(hf.endpoints.clone(), hf.token.clone()),
            config.model.clone(),
        )
        .with_session_idle_timeout(config.server.session_idle_timeout)
    }
}

/// Shared application state, cloned into every worker.
#[derive(Clone)]
pub struct AppData {
    models: web::Data<ModelCache>,
    datasets: web::Data<DatasetSource>,
    model_config: web::Data<ModelConfig>,
    sessions: web::Data<SessionStore>,
}

impl AppData {
    pub fn new(services: Services) -> Self {
        Self {
            models: web::Data::new(services.models),
            datasets: web::Data::new(DatasetSource(services.datasets)),
            model_config: web::Data::new(services.model_config),
            sessions: web::Data::new(SessionStore::new(services.session_idle_timeout)),
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Registers the state and every route on `config`.
    pub fn configure(&self, config: &mut ServiceConfig) {
        config
            .app_data(self.models.clone())
            .app_data(self.datasets.clone())
            .app_data(self.model_config.clone())
            .app_data(self.sessions.clone());
        configure_server(config);
    }
}

fn configure_server(config: &mut ServiceConfig) {
    config
        .route("/", web::get().to(handler::page::index))
        .route("/health_check", web::get().to(handler::health::health_check))
        .service(models_scope())
        .service(sessions_scope())
        .service(datasets_scope());
}

pub fn create_server(listener: TcpListener, services: Services) -> anyhow::Result<Server> {
    let data = AppData::new(services);

    let server = HttpServer::new(move || {
        let data = data.clone();
        App::new()
            .wrap(TracingLogger::default())
            .wrap(NormalizePath::new(TrailingSlash::MergeOnly))
            .configure(move |config| data.configure(config))
    });

    Ok(server.listen(listener)?.run())
}

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    let listener = TcpListener::bind(&config.server.addr)?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    let server = create_server(listener, Services::from_config(&config))?;
    server.await?;

    Ok(())
}
