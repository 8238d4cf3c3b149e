use std::{
    io::{self, BufRead},
    path::PathBuf,
    process::ExitCode,
    sync::{
        mpsc::{self, TryRecvError},
        Arc,
    },
    thread,
    time::Duration,
};

use clap::Parser;
use log::{error, info, warn};
use rigview::{
    animation::player::{AnimationPlayer, PlayerConfig},
    client::{Client, ClientConfig},
    protocol::message::{ClientMessage, ReloadMessage},
    render::{camera::OrbitCamera, render_loop::RenderLoop, texture::TextureLoader},
    scene::SceneSlot,
    transport::tokio::TokioTransportParam,
};
use tokio_serde::formats::Json;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use web_time::Instant;

use log_backend::LogBackend;

mod log_backend;

/// Headless rigview client: follows the reload server and plays the
/// character without a window. Type an action name on stdin to switch to it.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Reload server to follow
    #[arg(long, default_value = "ws://127.0.0.1:8989")]
    server: String,
    /// PNG texture of the character
    #[arg(long, default_value = "cowboy-texture.png")]
    texture: PathBuf,
    /// Action played first
    #[arg(long, default_value = "Walk_polish")]
    action: String,
    /// Crossfade between actions in seconds
    #[arg(long, default_value_t = 0.2)]
    crossfade: f32,
    #[arg(long, default_value_t = 60)]
    fps: u32,
    /// Delay before reconnecting after the connection is lost
    #[arg(long, default_value_t = 2000)]
    reconnect_ms: u64,
}

enum Command {
    Select(String),
    Quit,
}

fn spawn_stdin_reader() -> mpsc::Receiver<Command> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let line = line.trim();
            let command = match line {
                "" => continue,
                "quit" | "exit" => Command::Quit,
                action => Command::Select(action.to_string()),
            };
            if tx.send(command).is_err() {
                break;
            }
        }
    });
    rx
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let request = match args.server.as_str().into_client_request() {
        Ok(request) => request,
        Err(err) => {
            error!("Bad server address {}: {}", args.server, err);
            return ExitCode::FAILURE;
        }
    };

    let scenes = Arc::new(SceneSlot::new());
    let param = TokioTransportParam::new(request, Json::<ReloadMessage, ClientMessage>::default);
    let mut client = Client::new(
        Box::new(param),
        scenes.clone(),
        ClientConfig {
            reconnect_delay: Duration::from_millis(args.reconnect_ms),
        },
    );

    let fps = args.fps.max(1);
    let player = AnimationPlayer::new(
        args.action.clone(),
        PlayerConfig {
            crossfade: args.crossfade,
        },
    );
    let mut render_loop = RenderLoop::new(
        LogBackend::new(u64::from(fps)),
        scenes,
        player,
        OrbitCamera::default(),
        TextureLoader::spawn(&args.texture),
    );

    let commands = spawn_stdin_reader();
    let frame_time = Duration::from_secs(1) / fps;
    info!("Following {}", args.server);

    loop {
        let now = Instant::now();
        client.tick(now);

        loop {
            match commands.try_recv() {
                Ok(Command::Select(action)) => {
                    if !render_loop.select_action(&action) {
                        warn!("Still playing {}", render_loop.player().current().action);
                    }
                }
                Ok(Command::Quit) => {
                    info!("Quitting after {} frames", render_loop.backend().draws());
                    client.close();
                    return ExitCode::SUCCESS;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        render_loop.frame(now);

        let elapsed = now.elapsed();
        if elapsed < frame_time {
            thread::sleep(frame_time - elapsed);
        }
    }
}
