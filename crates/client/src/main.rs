use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;

use tanknet::PacketConditions;
use tanknet_client::bot::DEFAULT_SHOOT_CHANCE;
use tanknet_client::{Bot, ClientConfig, ClientEvent, ConnectionState, GameClient};

const STATUS_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "tanknet-client")]
#[command(about = "Headless tank arena client running random bots")]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1", help = "Server hostname or IP")]
    server: String,

    #[arg(short, long, default_value_t = tanknet::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value = "Bot")]
    name: String,

    #[arg(short, long, default_value_t = 1, help = "Number of bots to run")]
    bots: u32,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(long, default_value_t = DEFAULT_SHOOT_CHANCE, help = "Chance to shoot per input (0-1)")]
    shoot_chance: f64,

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

struct BotClient {
    name: String,
    client: GameClient,
    bot: Bot,
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

    let started = Instant::now();
    let mut bots = Vec::with_capacity(args.bots as usize);
    for index in 0..args.bots {
        let seed = args.seed.wrapping_add(index as u64);
        let config = ClientConfig {
            seed,
            ..Default::default()
        };
        let name = if args.bots == 1 {
            args.name.clone()
        } else {
            format!("{}{}", args.name, index + 1)
        };

        let mut client = GameClient::new(config)?;
        if let Some(conditions) = packet_conditions {
            client.set_packet_conditions(conditions);
        }
        client.connect(&args.server, args.port, &name);
        let bot = Bot::new(seed, args.shoot_chance, client.input_interval(), started);
        bots.push(BotClient { name, client, bot });
    }

    let deadline = args.duration_secs.map(|secs| started + Duration::from_secs(secs));
    let mut last_status = started;

    loop {
        let now = Instant::now();
        for entry in &mut bots {
            if entry.client.state() == ConnectionState::InGame {
                entry.bot.drive(&mut entry.client, now);
            }
            entry.client.update(now);
            for event in entry.client.drain_events() {
                log_event(&entry.name, &event);
            }
        }

        if bots.iter().all(|entry| entry.client.state() == ConnectionState::Disconnected) {
            log::info!("All bots disconnected");
            break;
        }
        if now.duration_since(last_status) >= STATUS_INTERVAL {
            for entry in &bots {
                log::info!(
                    "{}: {:?}, {} entities, rtt {:.1}ms, sent {} / received {}",
                    entry.name,
                    entry.client.state(),
                    entry.client.entities().count(),
                    entry.client.rtt_ms(),
                    entry.client.stats().packets_sent,
                    entry.client.stats().packets_received
                );
            }
            last_status = now;
        }
        if deadline.is_some_and(|deadline| now >= deadline) {
            break;
        }

        std::thread::sleep(Duration::from_millis(1));
    }

    for entry in &mut bots {
        entry.client.disconnect();
    }
    Ok(())
}

fn log_event(name: &str, event: &ClientEvent) {
    match event {
        ClientEvent::Connected {
            client_id,
            entity_id,
        } => log::info!("{name}: joined as client {client_id}, tank {entity_id}"),
        ClientEvent::Disconnected { reason } => log::info!("{name}: disconnected ({reason})"),
        ClientEvent::ConnectionFailed { reason } => log::warn!("{name}: connection failed ({reason})"),
        ClientEvent::Died {
            player_id,
            killer_id,
        } => log::info!("{name}: tank {player_id} destroyed by {killer_id}"),
        other => log::trace!("{name}: {other:?}"),
    }
}
