use std::error::Error;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{Level, warn};

use kpro_panel::meter::hold::{MeterConfig, PeakHoldMeter};
use kpro_panel::meter::view::ChannelView;
use kpro_panel::net::commands::CommandClient;
use kpro_panel::net::protocol::{AudioCommand, AudioParams, DelayCommand, DeviceStatus, VuFrame};
use kpro_panel::net::stream::VuStream;
use kpro_panel::render::MeterBar;

type BoxError = Box<dyn Error + Send + Sync>;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt().with_max_level(Level::WARN).init();

    let api_url = env_or("KPRO_API_URL", "http://127.0.0.1:8787");
    let ws_url = env_or("KPRO_WS_URL", "ws://127.0.0.1:8787");
    let device_id = env_or("KPRO_DEVICE", "SMX-KPRO-001");
    let mut ch: usize = env_or("KPRO_CHANNEL", "1").parse().unwrap_or(1);

    let commands = CommandClient::new(api_url);
    let mut status = fetch_status(&commands, &device_id).await?;

    println!("SMX K Pro panel — {} (fw {})", status.device_id, status.fw);
    println!(
        "power {}  channels {}  wifi {}  lan {}",
        if status.power_on { "ON" } else { "OFF" },
        status.channels_count,
        status.net.wifi,
        status.net.lan,
    );
    println!("commands: m mute | p polarity | o power | g <dB> | d <samples> | <n> channel | q quit");
    println!();

    let config = MeterConfig::default();
    let mut meter = PeakHoldMeter::new(config);
    meter.reset_channel(ch, Instant::now());

    let mut stream = VuStream::subscribe(VuStream::url(&ws_url, &device_id, Some(ch)));
    let mut tick = tokio::time::interval(Duration::from_millis(config.tick_ms));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut bar = MeterBar::new();
    let mut latest: Option<VuFrame> = None;

    loop {
        tokio::select! {
            // A frame and a tick landing in the same instant must apply the
            // rise before the decay check reads the peak timestamp.
            biased;

            frame = stream.recv() => match frame {
                Some(frame) if frame.ch == ch => {
                    let now = Instant::now();
                    meter.on_sample(
                        ch,
                        frame.rms_db_or(config.floor_db),
                        frame.peak_db_or(config.floor_db),
                        now,
                    );
                    latest = Some(frame);
                    render(&mut bar, &latest, &meter, ch, config.floor_db)?;
                }
                Some(_) => {}
                None => break,
            },

            _ = tick.tick() => {
                meter.on_tick(Instant::now());
                render(&mut bar, &latest, &meter, ch, config.floor_db)?;
            }

            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Some(PanelCommand::Quit) => break,
                    Some(PanelCommand::Channel(n)) => {
                        if status.channel(n).is_none() {
                            warn!("no such channel: {n}");
                            continue;
                        }
                        ch = n;
                        latest = None;
                        meter.reset_channel(ch, Instant::now());
                        // Dropping the old handle tears its task down.
                        stream = VuStream::subscribe(VuStream::url(&ws_url, &device_id, Some(ch)));
                        println!("\nwatching channel {ch}");
                    }
                    Some(cmd) => apply_command(&commands, &mut status, &device_id, ch, cmd).await,
                    None => warn!("unrecognized command: {}", line.trim()),
                }
            }
        }
    }

    println!();
    Ok(())
}

fn render(
    bar: &mut MeterBar,
    latest: &Option<VuFrame>,
    meter: &PeakHoldMeter,
    ch: usize,
    floor_db: f64,
) -> std::io::Result<()> {
    if let Some(frame) = latest {
        let view = ChannelView::from_frame(frame, meter.held_peak_db(ch), floor_db);
        bar.display(&view)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PanelCommand {
    Mute,
    Polarity,
    Power,
    Gain(f64),
    Delay(f64),
    Channel(usize),
    Quit,
}

fn parse_command(line: &str) -> Option<PanelCommand> {
    let mut parts = line.split_whitespace();
    match parts.next()? {
        "m" => Some(PanelCommand::Mute),
        "p" => Some(PanelCommand::Polarity),
        "o" => Some(PanelCommand::Power),
        "q" => Some(PanelCommand::Quit),
        "g" => Some(PanelCommand::Gain(parts.next()?.parse().ok()?)),
        "d" => Some(PanelCommand::Delay(parts.next()?.parse().ok()?)),
        n => Some(PanelCommand::Channel(n.parse().ok()?)),
    }
}

/// Run a command against the registry and merge the authoritative response
/// back into the local status. Failures are logged, never fatal.
async fn apply_command(
    commands: &CommandClient,
    status: &mut DeviceStatus,
    device_id: &str,
    ch: usize,
    cmd: PanelCommand,
) {
    match cmd {
        PanelCommand::Mute => {
            let mute = status.channel(ch).map(|c| !c.audio.mute).unwrap_or(true);
            let cmd = AudioCommand {
                mute: Some(mute),
                ..Default::default()
            };
            match send_audio(commands, device_id, ch, cmd).await {
                Ok(audio) => {
                    merge_audio(status, ch, audio);
                    println!("\nch{ch} mute {}", if audio.mute { "ON" } else { "off" });
                }
                Err(e) => warn!("mute command failed: {e}"),
            }
        }
        PanelCommand::Polarity => {
            let polarity = match status.channel(ch).map(|c| c.audio.polarity) {
                Some(-1) => 1,
                _ => -1,
            };
            let cmd = AudioCommand {
                polarity: Some(polarity),
                ..Default::default()
            };
            match send_audio(commands, device_id, ch, cmd).await {
                Ok(audio) => {
                    merge_audio(status, ch, audio);
                    println!("\nch{ch} polarity {:+}", audio.polarity);
                }
                Err(e) => warn!("polarity command failed: {e}"),
            }
        }
        PanelCommand::Gain(db) => {
            let cmd = AudioCommand {
                gain_db: Some(db),
                ..Default::default()
            };
            match send_audio(commands, device_id, ch, cmd).await {
                Ok(audio) => {
                    merge_audio(status, ch, audio);
                    println!("\nch{ch} gain {:.1} dB", audio.gain_db);
                }
                Err(e) => warn!("gain command failed: {e}"),
            }
        }
        PanelCommand::Power => {
            let power_on = !status.power_on;
            let c = commands.clone();
            let id = device_id.to_string();
            let result =
                tokio::task::spawn_blocking(move || c.set_power(&id, power_on)).await;
            match result {
                Ok(Ok(resp)) => {
                    status.power_on = resp.power_on;
                    println!("\npower {}", if resp.power_on { "ON" } else { "OFF" });
                }
                Ok(Err(e)) => warn!("power command failed: {e}"),
                Err(e) => warn!("power command failed: {e}"),
            }
        }
        PanelCommand::Delay(samples) => {
            let cmd = DelayCommand {
                value_samples: Some(samples),
                ..Default::default()
            };
            let c = commands.clone();
            let id = device_id.to_string();
            let result =
                tokio::task::spawn_blocking(move || c.set_delay(&id, ch, cmd)).await;
            match result {
                Ok(Ok(resp)) => {
                    if let Some(channel) = status.channels.iter_mut().find(|c| c.ch == ch) {
                        channel.delay.enabled = resp.enabled;
                        channel.delay.value_samples = resp.value_samples;
                    }
                    println!(
                        "\nch{ch} delay {} samples (max {} @ {} Hz)",
                        resp.value_samples, resp.max_samples, resp.sample_rate
                    );
                }
                Ok(Err(e)) => warn!("delay command failed: {e}"),
                Err(e) => warn!("delay command failed: {e}"),
            }
        }
        // Handled in the event loop.
        PanelCommand::Channel(_) | PanelCommand::Quit => {}
    }
}

async fn send_audio(
    commands: &CommandClient,
    device_id: &str,
    ch: usize,
    cmd: AudioCommand,
) -> Result<AudioParams, BoxError> {
    let c = commands.clone();
    let id = device_id.to_string();
    let resp = tokio::task::spawn_blocking(move || c.set_audio(&id, ch, cmd)).await??;
    Ok(resp.audio)
}

fn merge_audio(status: &mut DeviceStatus, ch: usize, audio: AudioParams) {
    if let Some(channel) = status.channels.iter_mut().find(|c| c.ch == ch) {
        channel.audio = audio;
    }
}

async fn fetch_status(
    commands: &CommandClient,
    device_id: &str,
) -> Result<DeviceStatus, BoxError> {
    let c = commands.clone();
    let id = device_id.to_string();
    Ok(tokio::task::spawn_blocking(move || c.status(&id)).await??)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_panel_commands() {
        assert_eq!(parse_command("m"), Some(PanelCommand::Mute));
        assert_eq!(parse_command(" p "), Some(PanelCommand::Polarity));
        assert_eq!(parse_command("o"), Some(PanelCommand::Power));
        assert_eq!(parse_command("q"), Some(PanelCommand::Quit));
        assert_eq!(parse_command("g -12.5"), Some(PanelCommand::Gain(-12.5)));
        assert_eq!(parse_command("d 480"), Some(PanelCommand::Delay(480.0)));
        assert_eq!(parse_command("3"), Some(PanelCommand::Channel(3)));
    }

    #[test]
    fn rejects_garbage_lines() {
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("g"), None);
        assert_eq!(parse_command("g notanumber"), None);
        assert_eq!(parse_command("xyz"), None);
    }
}
