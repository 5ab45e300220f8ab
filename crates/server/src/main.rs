use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use tanknet::PacketConditions;
use tanknet_server::{GameServer, ServerConfig};

#[derive(Parser)]
#[command(name = "tanknet-server")]
#[command(about = "Authoritative tank arena server")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = tanknet::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = tanknet::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    #[arg(short, long, default_value_t = 20)]
    max_players: usize,

    #[arg(long, default_value_t = 0, help = "Seed for spawn placement and packet simulation")]
    seed: u64,

    #[arg(long, help = "Enable packet loss/latency simulation")]
    simulate_packet_loss: bool,

    #[arg(long, default_value_t = 0.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, default_value_t = 0, help = "Added latency in ms")]
    latency: u32,

    #[arg(long, default_value_t = 0, help = "Jitter in ms")]
    jitter: u32,

    #[arg(long, help = "Stop after this many seconds")]
    duration_secs: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let packet_conditions = args.simulate_packet_loss.then(|| PacketConditions {
        enabled: true,
        loss_percent: args.loss_percent.clamp(0.0, 100.0),
        latency_ms: args.latency,
        jitter_ms: args.jitter,
    });

    let config = ServerConfig {
        bind: args.bind,
        port: args.port,
        tick_rate: args.tick_rate,
        max_players: args.max_players,
        seed: args.seed,
        packet_conditions,
        ..Default::default()
    };

    let mut server = GameServer::new(config)?;
    let running = server.running();
    watch_for_shutdown(Arc::clone(&running))?;

    if let Some(secs) = args.duration_secs {
        let running = Arc::clone(&running);
        thread::Builder::new()
            .name("deadline".into())
            .spawn(move || {
                thread::sleep(Duration::from_secs(secs));
                log::info!("Run time of {secs}s reached");
                running.store(false, Ordering::SeqCst);
            })?;
    }

    server.run();
    Ok(())
}

/// Clears `running` on Ctrl-C or SIGTERM so the server loop can say goodbye
/// to its players.
fn watch_for_shutdown(running: Arc<AtomicBool>) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            runtime.block_on(shutdown_signal());
            log::info!("Shutdown requested");
            running.store(false, Ordering::SeqCst);
        })?;
    Ok(())
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Could not listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            log::warn!("Could not listen for SIGTERM: {e}");
            ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    ctrl_c().await;
}
