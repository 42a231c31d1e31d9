// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-photoacoustic project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info, warn};
use rocket::config::LogLevel;
use rocket::data::{Limits, ToByteUnit};
use tokio::task::JoinHandle;

use crate::alarm::AlarmMonitor;
use crate::api::{build_rocket, ApiState};
use crate::callback::{HttpNotifier, MemoryNotifier, Notifier};
use crate::config::Config;
use crate::plc::{
    ConnectionManager, ConnectionSettings, ModbusTcpLink, PlcMemory, RegisterLink, SimulatedLink,
};
use crate::tasks::TaskPipeline;
use crate::utility::ShutdownSignal;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Owner of the gateway components and their background tasks
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    shutdown: ShutdownSignal,
    plc: Option<Arc<ConnectionManager>>,
    pipeline: Option<TaskPipeline>,
    simulated_memory: Option<PlcMemory>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    pub fn new() -> Self {
        Daemon {
            tasks: Vec::new(),
            shutdown: ShutdownSignal::new(),
            plc: None,
            pipeline: None,
            simulated_memory: None,
        }
    }

    /// Connection manager, once launched.
    pub fn plc(&self) -> Option<&Arc<ConnectionManager>> {
        self.plc.as_ref()
    }

    /// Task submission handle, once launched.
    pub fn pipeline(&self) -> Option<&TaskPipeline> {
        self.pipeline.as_ref()
    }

    /// Memory of the simulated controller when running with `plc.simulated`.
    pub fn simulated_memory(&self) -> Option<&PlcMemory> {
        self.simulated_memory.as_ref()
    }

    /// Launch all configured components
    ///
    /// A failed initial connection is only logged; every component reconnects
    /// on its next controller access.
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        let plc = Arc::new(ConnectionManager::new(
            self.build_link(config),
            ConnectionSettings::from(&config.plc),
        ));
        info!("Using PLC link {}", plc.endpoint());
        if let Err(e) = plc.connect().await {
            warn!("Initial PLC connection failed, will retry on demand: {}", e);
        }

        let notifier = build_notifier(config);
        info!("Edge notifications via {} notifier", notifier.notifier_type());

        let (pipeline, worker) = TaskPipeline::new(plc.clone(), notifier.clone());
        self.tasks.push(worker.spawn(self.shutdown.clone()));

        if config.alarm.enabled {
            let monitor = AlarmMonitor::new(plc.clone(), notifier.clone(), &config.alarm);
            self.tasks.push(monitor.spawn(self.shutdown.clone()));
        } else {
            info!("Alarm monitor disabled by configuration");
        }

        if config.server.enabled {
            self.start_web_server(config, plc.clone(), pipeline.clone())
                .await?;
        }

        self.start_heartbeat(plc.clone());

        self.plc = Some(plc);
        self.pipeline = Some(pipeline);
        Ok(())
    }

    fn build_link(&mut self, config: &Config) -> Box<dyn RegisterLink> {
        if config.plc.simulated {
            info!("PLC simulation enabled, no controller will be contacted");
            let memory = PlcMemory::new();
            self.simulated_memory = Some(memory.clone());
            Box::new(SimulatedLink::new(memory).with_command_effects())
        } else {
            Box::new(
                ModbusTcpLink::new(config.plc.address.clone(), config.plc.port)
                    .with_unit_id(config.plc.unit_id)
                    .with_response_timeout(Duration::from_millis(config.plc.response_timeout_ms)),
            )
        }
    }

    /// Start the Rocket web server
    async fn start_web_server(
        &mut self,
        config: &Config,
        plc: Arc<ConnectionManager>,
        pipeline: TaskPipeline,
    ) -> Result<()> {
        info!(
            "Starting web server on {}:{}",
            config.server.address, config.server.port
        );

        let figment = rocket::Config::figment()
            .merge(("ident", config.server.name.clone()))
            .merge(("limits", Limits::new().limit("json", 64.kibibytes())))
            .merge(("address", config.server.address.clone()))
            .merge(("port", config.server.port))
            .merge(("shutdown.ctrlc", false))
            .merge(("log_level", LogLevel::Normal));

        let state = ApiState {
            plc,
            pipeline,
            plc_host: config.plc.address.clone(),
            plc_port: config.plc.port,
            simulated: config.plc.simulated,
        };

        let ignited = build_rocket(figment, state).ignite().await?;
        let handle = ignited.shutdown();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            shutdown.wait().await;
            debug!("Stopping web server");
            handle.notify();
        });

        let task = tokio::spawn(async move {
            ignited.launch().await?;
            Ok::<(), anyhow::Error>(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Start a heartbeat task that logs the link state periodically
    fn start_heartbeat(&mut self, plc: Arc<ConnectionManager>) {
        debug!("Starting heartbeat monitor");

        let shutdown = self.shutdown.clone();
        let task = tokio::spawn(async move {
            while shutdown.sleep(HEARTBEAT_INTERVAL).await {
                debug!(
                    "Daemon heartbeat: PLC {} {:?}, {} pending reset(s)",
                    plc.endpoint(),
                    plc.state().await,
                    plc.pending_resets()
                );
            }
            Ok(())
        });

        self.tasks.push(task);
    }

    /// Ask every background loop to stop
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.shutdown.trigger();
    }

    /// Wait for all tasks, then let pending command resets run and close the link
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Task failed: {}", e),
                Err(e) => error!("Task panicked: {}", e),
            }
        }
        if let Some(plc) = self.plc {
            plc.shutdown().await;
        }
        info!("Daemon stopped");
        Ok(())
    }
}

fn build_notifier(config: &Config) -> Arc<dyn Notifier> {
    if config.edge.enabled {
        Arc::new(HttpNotifier::from_config(&config.edge))
    } else {
        Arc::new(MemoryNotifier::new())
    }
}
