use anyhow::Result;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::info;

use crate::config::Config;

use lnbridge_routing::{ApplicationHandler, Router};
use lnbridge_transport::BusTransport;

/// Hosts a router and drives its transports on a fixed cadence
pub struct GatewayNode {
    router: Router,
    interval: Duration,
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl GatewayNode {
    pub fn new(
        config: &Config,
        control_bus: Box<dyn BusTransport>,
        broker: Box<dyn BusTransport>,
        application: impl ApplicationHandler + 'static,
    ) -> Result<Self> {
        config.validate()?;

        let mut router = match config.gateway.request_id_seed {
            Some(seed) => Router::with_seed(config.gateway.mode, seed),
            None => Router::new(config.gateway.mode),
        };
        router.attach_control_bus(control_bus)?;
        router.attach_broker(broker)?;
        router.set_application_handler(application);
        info!("✓ Router initialized in {} mode", router.mode());

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        Ok(Self {
            router,
            interval: Duration::from_millis(config.runtime.process_interval_ms),
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Sender that stops `run` when signalled
    pub fn shutdown_handle(&self) -> mpsc::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Drive the router until shutdown is requested or Ctrl-C arrives
    ///
    /// One last processing pass runs after the loop exits.
    pub async fn run(&mut self) -> Result<()> {
        info!("Gateway running, processing every {:?}", self.interval);

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = ticker.tick() => self.router.process(),
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = signal::ctrl_c() => {
                    info!("Received Ctrl-C, shutting down");
                    break;
                }
            }
        }

        // Route whatever the transports already hold.
        self.router.process();

        let stats = self.router.stats();
        info!(
            delivered = stats.delivered,
            to_broker = stats.forwarded_to_broker,
            to_control_bus = stats.forwarded_to_control_bus,
            echoes_suppressed = stats.echoes_suppressed,
            "Gateway stopped"
        );
        Ok(())
    }
}
