use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use geo::Point;
use region_atlas::atlas::Atlas;
use region_atlas::config::AppConfig;
use region_atlas::data;
use region_atlas::lookup::{self, BrowserOpener};
use region_atlas::map_view::MapView;
use region_atlas::render;
use region_atlas::server;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render every configured map to a PNG frame
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "atlas.toml")]
        config: PathBuf,
        #[arg(short, long, value_name = "DIR", default_value = "frames")]
        out: PathBuf,
    },
    /// Click a map at map coordinates and open the region's reference page
    Click {
        #[arg(short, long, value_name = "FILE", default_value = "atlas.toml")]
        config: PathBuf,
        /// Map id from the configuration
        #[arg(short, long)]
        map: String,
        #[arg(short, allow_hyphen_values = true)]
        x: f64,
        #[arg(short, allow_hyphen_values = true)]
        y: f64,
        /// Write the resulting frame here
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Print the reference page instead of opening it
        #[arg(long)]
        no_open: bool,
    },
    /// List the property fields of a vector source
    Inspect {
        #[arg(value_name = "SOURCE")]
        source: PathBuf,
    },
    /// Serve the interactive viewer
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "atlas.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render { config, out } => {
            let app_config = AppConfig::load_from_file(&config)?;
            let atlas = Atlas::load(&app_config)?;

            for view in atlas.views() {
                let path = out.join(format!("{}.png", view.id()));
                render::save_png(view.frame(), &path)?;
                println!("{} -> {:?}", view.title(), path);
            }
        }
        Commands::Click {
            config,
            map,
            x,
            y,
            out,
            no_open,
        } => {
            let app_config = AppConfig::load_from_file(&config)?;
            let map_config = app_config
                .map(&map)
                .ok_or_else(|| anyhow!("No map '{}' in {:?}", map, config))?;
            let mut view = MapView::load(map_config, &app_config)
                .with_context(|| format!("Failed to load map '{}'", map))?;

            let outcome = view.click(Some(Point::new(x, y)));
            match (&outcome.name, &outcome.reference) {
                (Some(name), Some(reference)) => {
                    println!("Clicked on: {}", name);
                    if no_open {
                        println!("{}", reference);
                    } else {
                        lookup::open_reference(&BrowserOpener, reference);
                    }
                }
                _ => println!("No region at ({}, {})", x, y),
            }

            if let Some(path) = out {
                render::save_png(view.frame(), &path)?;
            }
        }
        Commands::Inspect { source } => {
            let summary = data::inspect_source(&source)?;
            println!("{:?}: {} polygon features", source, summary.polygon_features);
            for field in &summary.fields {
                println!("  {}", field);
            }
        }
        Commands::Serve { config } => {
            let app_config = AppConfig::load_from_file(&config)?;
            let atlas = Atlas::load(&app_config)?;
            server::start_server(app_config, atlas).await?;
        }
    }

    Ok(())
}
