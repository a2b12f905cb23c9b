use crate::config::{GatewayConfig, SerialConfig};
use crate::http::{self, AppState};
use crate::mqtt;
use anyhow::{bail, Context, Result};
use mysensors_core::{Fanout, Handler, Message, MetricsHub, Network};
use serial_transport::{LinkHalves, MockLink, SerialLink};
use std::fs;
use std::path::Path;
use std::sync::mpsc::{sync_channel, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

const CHANNEL_CAPACITY: usize = 256;

pub async fn run(cfg: GatewayConfig) -> Result<()> {
    let network = Arc::new(Network::new(cfg.protocol.clone()));
    network
        .load_snapshot(&cfg.state_file)
        .with_context(|| format!("loading state from {}", cfg.state_file.display()))?;

    let link = open_link(&cfg.serial)?;
    let handler = Arc::new(Handler::new(link.writer));
    let metrics = Arc::new(MetricsHub::new().context("registering metrics")?);

    let mut fanout = Fanout::new();
    fanout.add(metrics.clone());
    if cfg.mqtt.enabled {
        fanout.add(mqtt::start(&cfg.mqtt, handler.clone()));
    }
    info!(sinks = ?fanout.sink_names(), "event sinks ready");

    let (tx, rx) = sync_channel::<Message>(CHANNEL_CAPACITY);
    let dispatch = {
        let network = network.clone();
        let handler = handler.clone();
        thread::Builder::new()
            .name("dispatch".into())
            .spawn(move || dispatch_loop(rx, fanout, &network, &handler))
            .context("spawning dispatch thread")?
    };

    // Completes once the read loop has ended and every queued message has
    // been applied.
    let (done_tx, done_rx) = oneshot::channel();
    {
        let handler = handler.clone();
        let reader = link.reader;
        thread::Builder::new()
            .name("serial-rx".into())
            .spawn(move || {
                let res = handler.start(reader, &tx);
                drop(tx);
                if dispatch.join().is_err() {
                    error!("dispatch thread panicked");
                }
                let _ = done_tx.send(res);
            })
            .context("spawning serial read thread")?;
    }

    let addr = cfg.http.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding http listener on {addr}"))?;
    info!(%addr, "http server listening");
    let app = http::router(AppState {
        network: network.clone(),
        metrics,
        handler,
    });
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "http server stopped");
        }
    });

    if cfg.status_interval_secs > 0 {
        let network = network.clone();
        let period = Duration::from_secs(cfg.status_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                print!("{}", network.status_string());
            }
        });
    }

    tokio::select! {
        res = done_rx => {
            save_state(&network, &cfg.state_file);
            match res {
                Ok(Ok(())) if cfg.serial.replay.is_some() => {
                    info!("replay finished");
                    Ok(())
                }
                Ok(Ok(())) => bail!("serial transport closed"),
                Ok(Err(e)) => Err(e).context("serial read loop failed"),
                Err(_) => bail!("serial read thread exited unexpectedly"),
            }
        }
        _ = shutdown_signal() => {
            info!("shutdown requested");
            save_state(&network, &cfg.state_file);
            Ok(())
        }
    }
}

fn open_link(cfg: &SerialConfig) -> Result<LinkHalves> {
    if let Some(path) = &cfg.replay {
        let bytes =
            fs::read(path).with_context(|| format!("reading replay file {}", path.display()))?;
        let mut link = MockLink::open("replay")?;
        link.feed(&bytes);
        info!(link = link.name(), path = %path.display(), bytes = bytes.len(), "replaying capture");
        return Ok(link.split()?);
    }
    let link = SerialLink::open(&cfg.port, cfg.baud)
        .with_context(|| format!("opening serial port {}", cfg.port))?;
    info!(port = %link.path(), baud = cfg.baud, "serial port open");
    Ok(link.split()?)
}

fn dispatch_loop(rx: Receiver<Message>, fanout: Fanout, network: &Network, handler: &Handler) {
    for msg in rx {
        fanout.deliver(&msg);
        if let Err(e) = network.handle_message(&msg, |reply| handler.transmit(reply)) {
            warn!(%msg, error = %e, "message not applied");
        }
    }
    debug!("dispatch loop finished");
}

fn save_state(network: &Network, path: &Path) {
    if let Err(e) = network.save_snapshot(path) {
        error!(path = %path.display(), error = %e, "saving state failed");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
