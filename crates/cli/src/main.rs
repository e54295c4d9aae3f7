//! Courseplay CLI - terminal front end for the course player.

mod render;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use courseplay_core::{CourseId, PlayerError};
use courseplay_loader::{HttpCourseSource, LoaderConfig, DEFAULT_BASE_URL};
use courseplay_progress::{
    LoadOutcome, PersistConfig, Persistence, PlayBounds, PlayerStore, StoreConfig,
};
use courseplay_storage::JsonStorage;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "courseplay")]
#[command(about = "Video course player", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding saved progress
    #[arg(long, env = "COURSEPLAY_DATA_DIR", default_value = ".courseplay")]
    data_dir: PathBuf,

    /// Base URL of the course API
    #[arg(long, env = "COURSEPLAY_API_URL", default_value = DEFAULT_BASE_URL)]
    api_url: String,

    /// Course to load when none is present
    #[arg(long, default_value = "1")]
    course: u64,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Save only the cursor, not the course itself
    #[arg(long)]
    cursor_only: bool,

    /// Reject `play` targets outside the course
    #[arg(long)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current lesson
    Status,
    /// Fetch the course again
    Load {
        /// Course ID (defaults to --course)
        #[arg(long)]
        id: Option<u64>,
    },
    /// Jump to a lesson (0-based indices)
    Play {
        /// Module index
        module: usize,
        /// Lesson index within the module
        lesson: usize,
    },
    /// Advance to the next lesson
    Next,
    /// Forget the course and progress
    Reset,
    /// List modules and lessons
    Outline,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let store = open_store(&cli)?;
    let course_id = CourseId::new(cli.course);

    // Announce whenever the lesson under the cursor changes.
    let _title = {
        let last = std::sync::Mutex::new(store.with_state(|s| {
            courseplay_core::selectors::current_lesson(s).map(|l| l.id.clone())
        }));
        store.subscribe(move |state| {
            let lesson = courseplay_core::selectors::current_lesson(state);
            let mut last = last.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            if lesson.map(|l| &l.id) != last.as_ref() {
                *last = lesson.map(|l| l.id.clone());
                if let Some(lesson) = lesson {
                    info!("Now playing: {}", lesson.title);
                }
            }
        })
    };

    match cli.command {
        Commands::Status => {
            report_load(store.ensure_loaded(course_id).await);
            print!("{}", render::header(&store.state()));
            if store.is_complete() {
                println!("  (last lesson)");
            }
        }
        Commands::Load { id } => {
            let id = id.map(CourseId::new).unwrap_or(course_id);
            report_load(Some(store.load(id).await));
            print!("{}", render::header(&store.state()));
        }
        Commands::Play { module, lesson } => {
            report_load(store.ensure_loaded(course_id).await);
            match store.play(module, lesson) {
                Ok(_) => print!("{}", render::header(&store.state())),
                Err(e) => println!("Cannot play: {}", e),
            }
        }
        Commands::Next => {
            report_load(store.ensure_loaded(course_id).await);
            match store.next() {
                Ok(_) => print!("{}", render::header(&store.state())),
                Err(PlayerError::CourseComplete) => println!("Course complete!"),
                Err(e) => println!("Cannot advance: {}", e),
            }
        }
        Commands::Reset => {
            store.reset_progress();
            println!("Progress reset");
        }
        Commands::Outline => {
            report_load(store.ensure_loaded(course_id).await);
            if store.is_loading() {
                println!("Loading modules...");
            } else {
                print!("{}", render::outline(&store.outline()));
            }
        }
    }

    Ok(())
}

fn open_store(cli: &Cli) -> Result<PlayerStore> {
    let storage = JsonStorage::new(&cli.data_dir)?;
    let persistence = Persistence::new(Arc::new(storage)).with_config(PersistConfig {
        persist_course: !cli.cursor_only,
        ..Default::default()
    });

    let source = HttpCourseSource::new(
        LoaderConfig::default()
            .with_base_url(cli.api_url.clone())
            .with_timeout(Duration::from_secs(cli.timeout)),
    );

    let play_bounds = if cli.strict { PlayBounds::Strict } else { PlayBounds::Permissive };

    Ok(PlayerStore::builder(source)
        .with_persistence(persistence)
        .with_config(StoreConfig { play_bounds })
        .build())
}

fn report_load(outcome: Option<LoadOutcome>) {
    if let Some(LoadOutcome::Failed(e)) = outcome {
        eprintln!("Could not load course: {}", e);
    }
}
