mod command;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use viewer::config::DEFAULT_SESSION_COUNT;
use viewer::engine::sim::{SimConfig, SimulatedEngine};
use viewer::store::JsonFileBackend;
use viewer::{StreamLibrary, Viewer, ViewerBuilder, ViewerConfig, ViewerEvent};

use command::{HELP, Input};

#[derive(Parser)]
#[command(
    name = "rtsp-viewer",
    about = "Watch and control several RTSP players from one prompt"
)]
struct Args {
    /// JSON file the player configurations are loaded from and saved to
    #[arg(long, short, default_value = "rtsp-viewer.json")]
    store: PathBuf,

    /// JSON file holding the saved-stream library
    #[arg(long, default_value = "rtsp-library.json")]
    library: PathBuf,

    /// Number of players
    #[arg(long, short = 'n', default_value_t = DEFAULT_SESSION_COUNT)]
    sessions: usize,

    /// Stream duration reported by the simulated engine (0 = live)
    #[arg(long, default_value_t = 0)]
    duration_ms: u64,

    /// Position report period of the simulated engine
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> viewer::Result<()> {
    let backend = JsonFileBackend::open(&args.store)?;
    let mut library = StreamLibrary::open(Box::new(JsonFileBackend::open(&args.library)?));
    let engine = SimulatedEngine::new(SimConfig {
        tick: Duration::from_millis(args.tick_ms.max(1)),
        duration_ms: args.duration_ms,
        ..SimConfig::default()
    });

    let mut app = ViewerBuilder::new(Arc::new(engine))
        .config(ViewerConfig {
            session_count: args.sessions,
            ..ViewerConfig::default()
        })
        .store(Box::new(backend))
        .build()?;

    let events = app.subscribe();
    thread::spawn(move || {
        for event in events {
            report(&event);
        }
    });

    app.start()?;
    println!(
        "{} players, store {} (type `help`)",
        app.session_count(),
        args.store.display()
    );

    let stdin = io::stdin();
    prompt();
    for line in stdin.lock().lines() {
        let line = line?;
        match Input::parse(&line) {
            Ok(Input::Quit) => break,
            Ok(input) => {
                if let Err(e) = execute(&app, &mut library, input) {
                    eprintln!("{e}");
                }
            }
            Err(e) => eprintln!("{e}"),
        }
        prompt();
    }

    app.stop()
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

fn execute(app: &Viewer, library: &mut StreamLibrary, input: Input) -> viewer::Result<()> {
    match input {
        Input::Select(slot) => app.select_active(slot),
        Input::Next => app.cycle_active(),
        Input::Play => app.play(),
        Input::Pause => app.pause(),
        Input::Stop => app.stop_playback(),
        Input::Set(slot, config) => app.set_config(slot, config),
        Input::SeekStart => app.seek_start(),
        Input::SeekDrag(ms) => app.seek_drag(ms),
        Input::SeekCommit(ms) => app.seek_commit(ms),
        Input::Surface(slot, surface) => app.bind_surface(slot, surface),
        Input::Unsurface(slot) => app.unbind_surface(slot),
        Input::Restart(slot) => app.restart(slot),
        Input::LibraryList => {
            for (i, entry) in library.entries().iter().enumerate() {
                println!("{i}: {}  {}", entry.name, entry.uri);
            }
            Ok(())
        }
        Input::LibraryAdd(config) => {
            let index = library.add(config)?;
            println!("saved as {index}");
            library.save()
        }
        Input::LibraryEdit(index, config) => {
            library.edit(index, config)?;
            library.save()
        }
        Input::LibraryRemove(index) => {
            library.remove(index)?;
            library.save()
        }
        Input::LibraryUse(index) => library.apply(index, app),
        Input::Status => {
            for view in app.views()? {
                let seek = if view.seekable { "" } else { " (live)" };
                println!("[{}] {}  {}{}", view.slot, view.title, view.time_text, seek);
            }
            Ok(())
        }
        Input::Help => {
            println!("{HELP}");
            Ok(())
        }
        Input::Quit | Input::Empty => Ok(()),
    }
}

/// Print the notifications a user should see; per-tick redraws are left to
/// `status`.
fn report(event: &ViewerEvent) {
    match event {
        ViewerEvent::ActiveChanged { name, .. } => println!("\nactive: {name}"),
        ViewerEvent::Error { message, .. } => println!("\n{message}"),
        ViewerEvent::Rejected { slot, reason } => println!("\nplayer {slot} rejected: {reason}"),
        ViewerEvent::MediaSize {
            slot,
            width,
            height,
        } => println!("\nplayer {slot} video {width}x{height}"),
        ViewerEvent::Fatal(reason) => eprintln!("\nplayback unavailable: {reason}"),
        ViewerEvent::SessionChanged(_) => {}
    }
}
