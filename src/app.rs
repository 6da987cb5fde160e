// ABOUTME: App orchestrator — wires config, downstream client, store, coordinator, and dispatcher.
// ABOUTME: Serves line-delimited JSON-RPC over stdio while a background sweeper expires proposals.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::approval::{
    ApprovalCoordinator, AuditSink, DisabledFollowUp, DownstreamFollowUp, FollowUpScheduler,
    JsonlAuditSink, TracingAuditSink,
};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::dispatch::{Dispatcher, OperatingMode};
use crate::downstream::{Downstream, HttpDownstream};
use crate::proposals::{JsonFileBackend, ProposalStore, Sweeper};
use crate::rpc::RpcServer;
use crate::scanner::{ContentClassifier, PatternScanner};
use crate::tools::ToolRegistry;
use crate::tools::allowlist::ToolAllowlist;
use crate::tools::catalog::register_builtin;

/// Fully assembled gate: the RPC surface plus the store it fronts.
pub struct Gate {
    pub rpc: Arc<RpcServer>,
    pub store: Arc<ProposalStore>,
    pub sweeper: Sweeper,
}

impl Gate {
    /// Assemble every component from `config` around the given downstream and clock.
    pub fn assemble(
        config: &Config,
        downstream: Arc<dyn Downstream>,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let ttl = config.gate.proposal_ttl();
        let store = match &config.gate.state_file {
            Some(path) => {
                let backend = Arc::new(JsonFileBackend::new(path.clone()));
                ProposalStore::open(ttl, clock, backend)
                    .with_context(|| format!("failed to open proposal state at {}", path.display()))?
            }
            None => ProposalStore::in_memory(ttl, clock),
        };
        let store = Arc::new(store);

        let mut registry = ToolRegistry::new(ToolAllowlist::new(&config.tools.allowlist));
        register_builtin(&mut registry, downstream.clone());
        let registry = Arc::new(registry);

        let classifier: Arc<dyn ContentClassifier> =
            Arc::new(PatternScanner::new(config.scanner.proximity_window));

        let mut sinks: Vec<Arc<dyn AuditSink>> = vec![Arc::new(TracingAuditSink)];
        if let Some(dir) = &config.gate.audit_dir {
            match JsonlAuditSink::new_in_dir(dir) {
                Ok(sink) => {
                    tracing::info!(path = %sink.path.display(), "writing audit trail");
                    sinks.push(Arc::new(sink));
                }
                Err(e) => tracing::warn!(error = %e, "failed to open audit trail file"),
            }
        }

        let execution_timeout = config.gate.execution_timeout();
        let coordinator = Arc::new(ApprovalCoordinator::new(
            store.clone(),
            registry.clone(),
            classifier.clone(),
            Arc::new(sinks),
            execution_timeout,
        ));

        let follow_up: Arc<dyn FollowUpScheduler> = if config.follow_up.enabled {
            Arc::new(DownstreamFollowUp::new(downstream, config.follow_up.assignee.clone()))
        } else {
            Arc::new(DisabledFollowUp)
        };

        let mode = if config.gate.dry_run {
            OperatingMode::DryRun
        } else {
            OperatingMode::Live
        };

        let dispatcher = Arc::new(Dispatcher::new(
            registry,
            classifier,
            coordinator.clone(),
            follow_up,
            mode,
            execution_timeout,
        ));

        Ok(Self {
            rpc: Arc::new(RpcServer::new(dispatcher, coordinator)),
            sweeper: Sweeper::new(store.clone(), config.gate.sweep_interval()),
            store,
        })
    }
}

/// Top-level application.
pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Apply command-line overrides on top of the loaded config.
    pub fn with_overrides(mut self, dry_run: bool, state_file: Option<PathBuf>) -> Self {
        if dry_run {
            self.config.gate.dry_run = true;
        }
        if state_file.is_some() {
            self.config.gate.state_file = state_file;
        }
        self
    }

    /// Serve requests from stdin until it closes.
    pub async fn run(self) -> anyhow::Result<()> {
        let downstream: Arc<dyn Downstream> = Arc::new(
            HttpDownstream::from_config(&self.config.downstream)
                .context("failed to build downstream client")?,
        );
        let gate = Gate::assemble(&self.config, downstream, Arc::new(SystemClock))?;
        tracing::info!(
            ttl_seconds = self.config.gate.proposal_ttl_seconds,
            dry_run = self.config.gate.dry_run,
            durable = self.config.gate.state_file.is_some(),
            "toolgate ready"
        );

        let sweep_handle = gate.sweeper.spawn();
        let result = serve_stdio(gate.rpc).await;
        sweep_handle.abort();
        result
    }
}

/// Read one request per line; each is handled on its own task so a slow
/// approval never holds up other calls. Responses are written in completion order.
async fn serve_stdio(rpc: Arc<RpcServer>) -> anyhow::Result<()> {
    let (out_tx, mut out_rx) = mpsc::channel::<String>(64);

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = out_rx.recv().await {
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
        Ok::<(), std::io::Error>(())
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        let rpc = rpc.clone();
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            if let Some(response) = rpc.handle_line(&line).await {
                let _ = out_tx.send(response).await;
            }
        });
    }

    drop(out_tx);
    writer.await??;
    tracing::info!("stdin closed, shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downstream::{DownstreamRequest, ExecutionError};
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct Echo;

    #[async_trait]
    impl Downstream for Echo {
        async fn send(&self, request: DownstreamRequest) -> Result<Value, ExecutionError> {
            Ok(json!({ "path": request.path }))
        }
    }

    #[test]
    fn overrides_apply_on_top_of_config() {
        let app = App::new(Config::default())
            .with_overrides(true, Some(PathBuf::from("/tmp/state.json")));
        assert!(app.config.gate.dry_run);
        assert_eq!(
            app.config.gate.state_file.as_deref(),
            Some(std::path::Path::new("/tmp/state.json"))
        );
    }

    #[test]
    fn absent_overrides_keep_config() {
        let mut config = Config::default();
        config.gate.dry_run = true;
        let app = App::new(config).with_overrides(false, None);
        assert!(app.config.gate.dry_run);
        assert!(app.config.gate.state_file.is_none());
    }

    #[test]
    fn assemble_with_state_file_and_audit_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.gate.state_file = Some(dir.path().join("proposals.json"));
        config.gate.audit_dir = Some(dir.path().join("audit"));

        let gate = Gate::assemble(&config, Arc::new(Echo), Arc::new(SystemClock)).unwrap();
        assert!(gate.store.is_empty());
        assert!(dir.path().join("audit").is_dir());
    }
}
