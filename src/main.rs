/// Entry point and event loop.
///
/// The loop is the single thread of control for game state: each frame it
/// routes key presses, drains sync events from the network runtime, fires
/// the grace timer, and redraws. The tokio runtime only does I/O and talks
/// back through a channel.

mod config;
mod domain;
mod net;
mod sim;
mod ui;

use std::fs::OpenOptions;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossterm::event::KeyCode;
use rand::Rng;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use config::{GameConfig, LogConfig};
use domain::direction::SequenceGenerator;
use net::{Endpoints, ScaleSyncClient, SyncEvent, SyncLink};
use sim::machine::GameStateMachine;
use sim::session::Session;
use ui::gamepad::GamepadState;
use ui::input::InputState;
use ui::renderer::Renderer;
use ui::router::{self, Command};
use ui::sound::{process_sound_events, SoundEngine};

const FRAME_SLEEP: Duration = Duration::from_millis(5);
const RUNTIME_SHUTDOWN: Duration = Duration::from_millis(500);

fn main() {
    let config = GameConfig::load();

    if let Err(e) = init_logging(&config.log) {
        eprintln!("Warning: logging disabled: {e}");
    }

    let endpoints = match Endpoints::from_base(&config.base_url) {
        Ok(ep) => ep,
        Err(e) => {
            eprintln!("Invalid backend address: {e}");
            std::process::exit(2);
        }
    };
    info!(trigger = %endpoints.trigger, stream = %endpoints.stream, "backend endpoints");

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("scalerace-net")
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Network runtime failed to start: {e}");
            return;
        }
    };

    let (sync_tx, sync_rx) = mpsc::unbounded_channel();
    let client = match ScaleSyncClient::new(runtime.handle().clone(), endpoints, sync_tx) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };

    let machine = GameStateMachine::new(SequenceGenerator::from_entropy());
    let mut session = Session::new(machine, client);

    let mut renderer = Renderer::new();

    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let sound = SoundEngine::new();

    let result = game_loop(&mut session, sync_rx, &mut renderer, sound.as_ref(), &config);

    session.shutdown();

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    if let Err(e) = result {
        error!(error = %e, "event loop failed");
        eprintln!("Game error: {e}");
    }

    let snap = session.snapshot();
    println!();
    println!("Thanks for playing Scale Race!");
    println!("Final Score: {}  |  Replicas: {}", snap.score, snap.replicas);

    // Tasks still in flight are dropped once the runtime shuts down, so let
    // the close frame go out first.
    let mut client = session.into_link();
    client.drain(RUNTIME_SHUTDOWN);
    drop(client);
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN);
}

fn init_logging(cfg: &LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let file = OpenOptions::new().create(true).append(true).open(&cfg.file)?;
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&cfg.filter))?;
    // The terminal is in raw mode; logs go to the file only.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn game_loop<R: Rng, L: SyncLink>(
    session: &mut Session<R, L>,
    mut sync_rx: UnboundedReceiver<SyncEvent>,
    renderer: &mut Renderer,
    sound: Option<&SoundEngine>,
    config: &GameConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    let mut gp = GamepadState::new(&config.gamepad);

    loop {
        kb.drain_events();
        gp.update();

        if kb.ctrl_c_pressed() {
            break;
        }

        // One key, at most one command, strictly in arrival order.
        let keys: Vec<KeyCode> = kb.pressed_codes().chain(gp.pressed_codes()).collect();
        for code in keys {
            let command = router::route(code, session.phase());
            debug!(?code, ?command, "routed key");
            let events = match command {
                Some(Command::Quit) => return Ok(()),
                Some(Command::Start) => session.start(),
                Some(Command::Input(dir)) => session.submit_input(dir),
                Some(Command::Reset) => session.reset(),
                None => continue,
            };
            process_sound_events(sound, &events);
        }

        // Inputs go first, so a winning key in this frame beats the grace timer.
        while let Ok(event) = sync_rx.try_recv() {
            let events = session.on_sync_event(event, Instant::now());
            process_sound_events(sound, &events);
        }

        let events = session.tick(Instant::now());
        process_sound_events(sound, &events);

        renderer.render(session.snapshot())?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}
