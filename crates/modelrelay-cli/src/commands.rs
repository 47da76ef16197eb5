use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use modelrelay_agents::OpenAiCompatBackend;
use modelrelay_config::{AppConfig, ConfigLoader};
use modelrelay_gateway::{ChatService, GatewayServer, serve_stdio};
use modelrelay_store::ConversationStore;
use modelrelay_supervisor::{
    DetachedLauncher, EnsureOutcome, LivenessProbe, ProcessSupervisor, reclaim_port,
};
use tracing::{info, warn};

pub struct GlobalOpts {
    pub config: Option<PathBuf>,
    pub port: Option<u16>,
}

impl GlobalOpts {
    fn loader(&self) -> anyhow::Result<ConfigLoader> {
        Ok(ConfigLoader::resolve(self.config.clone())?)
    }

    fn load(&self) -> anyhow::Result<(ConfigLoader, AppConfig)> {
        let loader = self.loader()?;
        let config = loader.load()?;
        Ok((loader, config))
    }

    fn port_for(&self, config: &AppConfig) -> u16 {
        self.port.unwrap_or(config.http_port)
    }

    /// `--port` wins; otherwise the port comes from the config file.
    fn port(&self) -> anyhow::Result<u16> {
        match self.port {
            Some(port) => Ok(port),
            None => Ok(self.load()?.1.http_port),
        }
    }
}

fn build_service(config: AppConfig) -> anyhow::Result<Arc<ChatService>> {
    let backend = OpenAiCompatBackend::new(Duration::from_secs(config.request_timeout_secs))?;
    let store = ConversationStore::new(config.truncate_limit);
    Ok(Arc::new(ChatService::new(
        Arc::new(config),
        Arc::new(store),
        Arc::new(backend),
    )))
}

pub async fn serve(opts: &GlobalOpts) -> anyhow::Result<ExitCode> {
    let (_, config) = opts.load()?;
    let port = opts.port_for(&config);
    info!(
        "starting server with {} model(s), truncate limit {}",
        config.models.len(),
        config.truncate_limit
    );
    let service = build_service(config)?;
    GatewayServer::new(service, port)
        .run(shutdown_signal())
        .await?;
    Ok(ExitCode::SUCCESS)
}

pub async fn stdio(opts: &GlobalOpts) -> anyhow::Result<ExitCode> {
    let (_, config) = opts.load()?;
    serve_stdio(build_service(config)?).await?;
    Ok(ExitCode::SUCCESS)
}

pub async fn launch(opts: &GlobalOpts) -> anyhow::Result<ExitCode> {
    // Validate here so a broken config fails loudly instead of inside the daemon.
    let (loader, config) = opts.load()?;
    let port = opts.port_for(&config);

    let exe = std::env::current_exe().context("cannot locate the modelrelay executable")?;
    let config_path = std::path::absolute(loader.path())
        .with_context(|| format!("cannot resolve {}", loader.path().display()))?;

    let mut launcher = DetachedLauncher::new(
        exe,
        [
            "--config".into(),
            config_path.into_os_string(),
            "serve".into(),
        ],
    );
    if let Some(cache) = dirs::cache_dir() {
        launcher = launcher.with_log_file(cache.join("modelrelay").join("server.log"));
    }

    let mut supervisor = ProcessSupervisor::new(port, launcher)?;
    match supervisor.ensure_running().await? {
        EnsureOutcome::AlreadyRunning => info!("server already running on port {port}"),
        EnsureOutcome::Started { attempts } => info!(
            "server started on port {port} (pid {:?}, {attempts} poll(s))",
            supervisor.spawned_pid()
        ),
    }

    println!("http://127.0.0.1:{port}/mcp");
    Ok(ExitCode::SUCCESS)
}

pub async fn status(opts: &GlobalOpts) -> anyhow::Result<ExitCode> {
    let port = opts.port()?;
    if LivenessProbe::with_default_timeout()?
        .is_running(port)
        .await {
        println!("running on port {port}");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("not running on port {port}");
        Ok(ExitCode::FAILURE)
    }
}

pub async fn restart(opts: &GlobalOpts) -> anyhow::Result<ExitCode> {
    let port = opts.port()?;
    let killed = reclaim_port(port)
        .await
        .with_context(|| format!("failed to reclaim port {port}"))?;
    if killed.is_empty() {
        println!("nothing was listening on port {port}");
    } else {
        println!("killed {} process(es) on port {port}: {killed:?}", killed.len());
    }
    Ok(ExitCode::SUCCESS)
}

pub fn models(opts: &GlobalOpts) -> anyhow::Result<ExitCode> {
    let (_, config) = opts.load()?;
    let default = config.default_model().map(|m| m.id.clone());
    for model in &config.models {
        let marker = if Some(&model.id) == default.as_ref() { "*" } else { " " };
        println!(
            "{marker} {:<16} {:<32} {}",
            model.id, model.model_name, model.base_url
        );
    }
    Ok(ExitCode::SUCCESS)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
