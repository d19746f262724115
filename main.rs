mod cache;
mod config;
mod db;
mod error;
mod filters;
mod jobs;
mod models;
mod random;
mod scan;
mod schema;
mod tagging;
mod thumbnails;
mod watcher;

use crate::cache::HandleCache;
use crate::config::{AppPaths, Settings};
use crate::error::{Error, Result};
use crate::filters::Library;
use crate::models::{FilterState, ImageRecord, SortDir, SortKey, TagMatchMode};
use crate::scan::{HandleBackend, PathBackend, ScanBackend};
use chrono::{Local, LocalResult, TimeZone};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "meme-browser", version, about = "Local-first image library browser and tagger")]
struct Cli {
    /// Override the data directory (defaults to the platform app-data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory tree and merge it into the library
    Scan {
        root: PathBuf,
        /// Walk with per-level directory handles instead of walkdir
        #[arg(long)]
        handle_walker: bool,
    },
    /// List images from the filtered, sorted view
    List {
        #[command(flatten)]
        filter: FilterArgs,
        /// Also print a display-handle token per stored thumbnail
        #[arg(long)]
        urls: bool,
    },
    /// Pick one random image from the filtered view (favorites count double)
    Random {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Toggle an image's favorite flag
    Favorite { id: i64 },
    /// Delete an image record from the library
    Delete { id: i64 },
    /// Render missing thumbnails for files under a scanned root
    Thumbs { root: PathBuf },
    /// Watch a directory and report image-file changes
    Watch { root: PathBuf },
    /// Tag operations
    Tag {
        #[command(subcommand)]
        command: TagCommand,
    },
    /// List scanned directories
    Dirs,
}

#[derive(Subcommand)]
enum TagCommand {
    /// Create a tag (random palette color unless given)
    Create {
        name: String,
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete a tag, removing it from every image
    Delete { name: String },
    /// Add a tag to an image
    Add { id: i64, name: String },
    /// Remove a tag from an image
    Remove { id: i64, name: String },
    /// Change a tag's color
    Color { name: String, color: String },
    /// List tags with usage counts
    List,
}

#[derive(Args)]
struct FilterArgs {
    /// Substring match against the file name (case-insensitive)
    #[arg(long, default_value = "")]
    search: String,
    /// Filter by tag; repeatable
    #[arg(long = "tag")]
    tags: Vec<String>,
    /// Require every selected tag instead of any
    #[arg(long)]
    all_tags: bool,
    /// Favorites only
    #[arg(long)]
    favorites: bool,
    /// Sort key: name, date or size
    #[arg(long, default_value = "name")]
    sort: String,
    /// Sort descending
    #[arg(long)]
    desc: bool,
}

impl FilterArgs {
    fn to_state(&self) -> Result<FilterState> {
        let sort_by = match self.sort.as_str() {
            "name" => SortKey::Name,
            "date" => SortKey::Date,
            "size" => SortKey::Size,
            other => return Err(Error::Init(format!("unknown sort key '{other}'"))),
        };
        Ok(FilterState {
            search: self.search.clone(),
            tags: self.tags.clone(),
            tag_mode: if self.all_tags {
                TagMatchMode::All
            } else {
                TagMatchMode::Any
            },
            favorites_only: self.favorites,
            sort_by,
            sort_dir: if self.desc { SortDir::Desc } else { SortDir::Asc },
        })
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let paths = AppPaths::discover(cli.data_dir)?;
    let settings = Settings::load(&paths.settings_path)?;
    let pool = db::init_database(&paths.db_path)?;

    match cli.command {
        Command::Scan { root, handle_walker } => {
            let backend: &dyn ScanBackend = if handle_walker {
                &HandleBackend
            } else {
                &PathBackend
            };
            let found = scan::run_scan(backend, &root, &pool)?;
            println!("Scanned {found} image(s) under {}", root.display());
        }
        Command::List { filter, urls } => {
            let conn = pool.get()?;
            let mut library = Library::new();
            library.refresh(&conn)?;
            library.set_filter(filter.to_state()?);

            let mut cache = HandleCache::new(settings.cache.max_object_handles);
            let filtered = library.filtered();
            if filtered.is_empty() {
                println!("No images match.");
            }
            for image in filtered {
                print_image(image);
                if urls {
                    if let Some(token) = thumbnails::thumbnail_handle(image, &mut cache) {
                        println!("        {token}");
                    }
                }
            }
        }
        Command::Random { filter } => {
            let conn = pool.get()?;
            let mut library = Library::new();
            library.refresh(&conn)?;
            library.set_filter(filter.to_state()?);

            match random::pick_weighted(library.filtered(), &mut rand::thread_rng()) {
                Some(image) => print_image(image),
                None => println!("No images match."),
            }
        }
        Command::Favorite { id } => {
            let conn = pool.get()?;
            db::toggle_favorite(&conn, id)?;
            match db::get_image(&conn, id)? {
                Some(image) => println!(
                    "{} is {} a favorite",
                    image.name,
                    if image.favorite { "now" } else { "no longer" }
                ),
                None => println!("Image {id} does not exist."),
            }
        }
        Command::Delete { id } => {
            let mut conn = pool.get()?;
            db::delete_image(&mut conn, id)?;
            println!("Deleted image {id}.");
        }
        Command::Thumbs { root } => {
            let rendered = jobs::generate_missing(&pool, &root, &settings.thumbnails)?;
            println!("Rendered {rendered} thumbnail(s).");
        }
        Command::Watch { root } => {
            let (_watcher, events) = watcher::FsWatcher::start(&root)?;
            println!("Watching {} (Ctrl-C to stop)...", root.display());
            for event in events.iter() {
                match event {
                    watcher::FsEvent::Changed(path) => println!("changed  {}", path.display()),
                    watcher::FsEvent::Removed(path) => println!("removed  {}", path.display()),
                }
            }
        }
        Command::Tag { command } => run_tag(command, &pool)?,
        Command::Dirs => {
            let conn = pool.get()?;
            for dir in db::list_directories(&conn)? {
                println!(
                    "{:<30} {:>6} image(s)  last scanned {}",
                    dir.name,
                    dir.image_count,
                    format_date(dir.last_scanned)
                );
            }
        }
    }
    Ok(())
}

fn run_tag(command: TagCommand, pool: &db::DbPool) -> Result<()> {
    match command {
        TagCommand::Create { name, color } => {
            let conn = pool.get()?;
            let color = color.unwrap_or_else(tagging::random_color);
            tagging::create_tag(&conn, &name, &color)?;
            println!("Tag '{name}' ({color}) ready.");
        }
        TagCommand::Delete { name } => {
            let mut conn = pool.get()?;
            tagging::delete_tag(&mut conn, &name)?;
            println!("Tag '{name}' deleted.");
        }
        TagCommand::Add { id, name } => {
            let mut conn = pool.get()?;
            tagging::attach_tag(&mut conn, id, &name)?;
            println!("Tagged image {id} with '{name}'.");
        }
        TagCommand::Remove { id, name } => {
            let mut conn = pool.get()?;
            tagging::detach_tag(&mut conn, id, &name)?;
            println!("Removed '{name}' from image {id}.");
        }
        TagCommand::Color { name, color } => {
            let conn = pool.get()?;
            tagging::update_tag_color(&conn, &name, &color)?;
            println!("Tag '{name}' is now {color}.");
        }
        TagCommand::List => {
            let conn = pool.get()?;
            for tag in tagging::list_tags(&conn)? {
                println!("{:<20} {}  {:>5} image(s)", tag.name, tag.color, tag.count);
            }
        }
    }
    Ok(())
}

fn print_image(image: &ImageRecord) {
    let id = image.id.unwrap_or_default();
    let star = if image.favorite { "*" } else { " " };
    let tags = if image.tags.is_empty() {
        String::new()
    } else {
        format!("  [{}]", image.tags.join(", "))
    };
    println!(
        "{id:>5} {star} {:<40} {:>10}  {}{tags}",
        image.name,
        format_size(image.size),
        format_date(image.last_modified)
    );
}

fn format_size(bytes: i64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes.max(0) as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

fn format_date(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms) {
        LocalResult::Single(dt) => dt.format("%Y-%m-%d").to_string(),
        _ => "-".to_string(),
    }
}
