// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Open Data Viewer contributors

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, LevelFilter};
use opendata_core::basemap::{find_basemap, BASEMAPS};
use opendata_core::catalog::CatalogClient;
use opendata_core::config::{ConfigManager, ViewerConfig};
use opendata_core::engine::{MapEngine, MemoryEngine};
use opendata_core::proxy::{self, EmptyPolicy, ProxyState, UpstreamCatalog};
use opendata_core::sidebar::{self, LayerFilter};
use opendata_core::view::View;
use opendata_core::viewer::ViewerOptions;
use opendata_core::{Feature, Viewer, ViewerEvent};
use simplelog::{
    ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};
use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to viewer.json (defaults to the user config directory)
    #[arg(short, long, env = "OPENDATA_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Also write the log to opendata.log in the config directory
    #[arg(long)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the catalog endpoints in front of the upstream document
    Serve {
        #[arg(long, env = "OPENDATA_UPSTREAM_URL")]
        upstream: Option<String>,
        #[arg(long, env = "OPENDATA_BIND")]
        bind: Option<String>,
        #[arg(long)]
        base_path: Option<String>,
        /// Answer an empty filtered catalog with 200 instead of 500
        #[arg(long)]
        allow_empty: bool,
    },
    /// List map layers as the sidebar shows them
    Layers {
        #[arg(long, env = "OPENDATA_API_URL")]
        api: Option<String>,
        /// Only layers that are switched on
        #[arg(long)]
        active: bool,
        #[arg(long, default_value = "")]
        search: String,
        /// Switch a layer on before listing (repeatable)
        #[arg(long)]
        show: Vec<String>,
        /// Switch a layer off before listing (repeatable)
        #[arg(long)]
        hide: Vec<String>,
    },
    /// List downloadable datasets with their links
    Data {
        #[arg(long, env = "OPENDATA_API_URL")]
        api: Option<String>,
        #[arg(long, env = "OPENDATA_PUBLIC_URL")]
        open_data_url: Option<String>,
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Print the overlay stack a map would show after toggles and a basemap switch
    Preview {
        #[arg(long, env = "OPENDATA_API_URL")]
        api: Option<String>,
        #[arg(long)]
        basemap: Option<String>,
        #[arg(long)]
        show: Vec<String>,
        #[arg(long)]
        hide: Vec<String>,
    },
    /// List the basemap gallery
    Basemaps,
}

fn init_logging(verbose: bool, log_file: bool) -> Result<()> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];

    if log_file {
        let dir = opendata_core::get_config_root();
        std::fs::create_dir_all(&dir).context("Failed to create config directory")?;
        let file = File::create(dir.join("opendata.log")).context("Failed to create opendata.log")?;
        loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), file));
    }

    CombinedLogger::init(loggers).context("Failed to initialise logging")
}

fn catalog_client(config: &ViewerConfig, api: Option<String>) -> Result<CatalogClient> {
    let api = api.unwrap_or_else(|| config.api_url.clone());
    CatalogClient::new(
        &api,
        Duration::from_secs(config.upstream_timeout_secs),
        Duration::from_secs(config.catalog_cache_secs),
    )
    .with_context(|| format!("Invalid API URL '{}'", api))
}

/// Loads the catalog into a headless viewer and applies the requested toggles.
fn headless_viewer(
    config: &ViewerConfig,
    features: Vec<Feature>,
    show: &[String],
    hide: &[String],
) -> Result<Viewer<MemoryEngine>> {
    let mut viewer = Viewer::new(ViewerOptions {
        retention: config.retention.into(),
        bookmarks: config.bookmarks.clone(),
        print: config.print.clone(),
    });
    let basemap = find_basemap(&config.basemap)
        .map(|b| b.spec())
        .unwrap_or_default();
    let engine = MemoryEngine::new(basemap);
    viewer.install_view(View::new(engine, config.center, config.zoom))?;

    let token = viewer.begin_catalog_load();
    viewer.dispatch(ViewerEvent::CatalogLoaded { token, features });
    viewer.dispatch(ViewerEvent::ViewReady);
    for title in show {
        viewer.dispatch(sidebar::toggle_command(title, true));
    }
    for title in hide {
        viewer.dispatch(sidebar::toggle_command(title, false));
    }

    let report = viewer.drain();
    for reason in &report.rejected {
        println!("Skipped: {}", reason);
    }
    Ok(viewer)
}

fn serve(
    mut config: ViewerConfig,
    upstream: Option<String>,
    bind: Option<String>,
    base_path: Option<String>,
    allow_empty: bool,
) -> Result<()> {
    if upstream.is_some() {
        config.upstream_url = upstream;
    }
    if let Some(bind) = bind {
        config.bind = bind;
    }
    if let Some(base_path) = base_path {
        config.base_path = base_path;
    }
    config.allow_empty |= allow_empty;
    config.validate()?;

    let upstream = config.upstream()?;
    let addr = config.bind_addr()?;
    let policy = if config.allow_empty {
        EmptyPolicy::Allow
    } else {
        EmptyPolicy::Reject
    };
    let catalog = UpstreamCatalog::new(upstream, Duration::from_secs(config.upstream_timeout_secs))?;
    info!("[Proxy] Upstream catalog: {}", catalog.url());
    let app = proxy::router(ProxyState::new(catalog, policy), &config.base_path);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        proxy::serve(listener, app).await.context("Server error")
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file)?;

    let manager = match cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new(),
    };
    let config = manager.load()?;

    match cli.command {
        Commands::Serve {
            upstream,
            bind,
            base_path,
            allow_empty,
        } => serve(config, upstream, bind, base_path, allow_empty)?,
        Commands::Layers {
            api,
            active,
            search,
            show,
            hide,
        } => {
            let features = catalog_client(&config, api)?.fetch_features()?;
            let viewer = headless_viewer(&config, features, &show, &hide)?;
            let filter = if active {
                LayerFilter::Active
            } else {
                LayerFilter::All
            };

            for row in sidebar::layer_rows(viewer.registry(), filter, &search, &config.open_data_url) {
                let status = if row.visible { "[x]" } else { "[ ]" };
                println!("{} {}", status, row.display_name);
                for link in &row.links {
                    println!("      {}: {}", link.kind, link.href);
                }
            }
        }
        Commands::Data {
            api,
            open_data_url,
            search,
        } => {
            let base = open_data_url.unwrap_or_else(|| config.open_data_url.clone());
            let items = catalog_client(&config, api)?.fetch_data()?;
            for item in sidebar::search_data(&items, &search) {
                println!("{}", item.title);
                for link in sidebar::resource_links(item, &base) {
                    println!("      {}: {}", link.kind, link.href);
                }
            }
        }
        Commands::Preview {
            api,
            basemap,
            show,
            hide,
        } => {
            let features = catalog_client(&config, api)?.fetch_features()?;
            let mut viewer = headless_viewer(&config, features, &show, &hide)?;

            if let Some(id) = basemap {
                let url = find_basemap(&id).and_then(|b| b.url);
                viewer.dispatch(ViewerEvent::SwitchBasemap {
                    id,
                    url: url.map(str::to_string),
                });
                let report = viewer.drain();
                for reason in &report.rejected {
                    println!("Skipped: {}", reason);
                }
            }

            if let Some(view) = viewer.view() {
                let engine = view.engine();
                println!("Basemap: {}", engine.basemap().id());
                println!("Center: {:?} zoom {}", view.center, view.zoom);
                for (i, title) in engine.overlay_titles().iter().enumerate() {
                    println!("{:>3}. {}", i + 1, title);
                }
            }
        }
        Commands::Basemaps => {
            for option in BASEMAPS {
                let source = option.url.unwrap_or("standard");
                println!("{:<26} {:<16} {}", option.id, option.name, source);
            }
        }
    }

    Ok(())
}
