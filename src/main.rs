use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stockframe::export::{DirectorySaver, ExportOptions, Exporter, ImageLoader, MimeType};
use stockframe::fonts::FontManager;
use stockframe::providers::{JsonFileCredentialStore, ProviderRegistry};
use stockframe::rendering::{Composition, Rasterizer, Target};
use stockframe::{Config, SearchGateway};

#[derive(Parser)]
#[command(name = "stockframe", version, about = "Search stock photos and export composed image cards")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Credential file (overrides the configured path)
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered providers and whether a key is saved for each
    Providers,
    /// Save an API key for a provider
    SetKey { provider: String, key: String },
    /// Search one provider
    Search {
        provider: String,
        query: String,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Render an element of an HTML file and save it as an image
    Compose {
        #[arg(long)]
        html: PathBuf,
        /// Element id to render
        #[arg(long)]
        target: String,
        #[arg(long, default_value = stockframe::export::DEFAULT_FILE_NAME)]
        name: String,
        #[arg(long, default_value = "png")]
        format: String,
        /// JPEG quality between 0 and 1
        #[arg(long, default_value_t = stockframe::export::DEFAULT_QUALITY)]
        quality: f32,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

fn registry(config: &Config) -> anyhow::Result<ProviderRegistry> {
    let store = JsonFileCredentialStore::open(&config.credentials_path)
        .with_context(|| format!("opening {}", config.credentials_path.display()))?;
    let mut registry = ProviderRegistry::with_builtin_providers(store);
    registry.load_saved_credentials();
    Ok(registry)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    if let Some(path) = cli.credentials {
        config.credentials_path = path;
    }

    match cli.command {
        Command::Providers => {
            let registry = registry(&config)?;
            for id in registry.list_providers() {
                let state = if registry.has_credential(&id) { "key set" } else { "no key" };
                println!("{:<10} {}", id, state);
            }
        }
        Command::SetKey { provider, key } => {
            let mut registry = registry(&config)?;
            registry.set_credential(&provider, key)?;
            println!("saved key for {}", provider);
        }
        Command::Search { provider, query, json } => {
            let registry = registry(&config)?;
            let gateway = SearchGateway::http(&config)?;
            let results = gateway.search(&registry, &query, &provider)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for r in &results {
                    println!("{:>12}  {:>5}x{:<5}  {}  {}", r.id, r.width, r.height, r.full_url, r.alt_text);
                }
                eprintln!("{} results", results.len());
            }
        }
        Command::Compose {
            html,
            target,
            name,
            format,
            quality,
            out_dir,
        } => {
            let Some(mime) = MimeType::parse(&format) else {
                bail!("unsupported format {:?} (expected png, jpeg or bmp)", format);
            };
            let source = std::fs::read_to_string(&html)
                .with_context(|| format!("reading {}", html.display()))?;
            let mut composition = Composition::parse(&source);
            let base = std::fs::canonicalize(&html)
                .ok()
                .and_then(|p| url::Url::from_file_path(p).ok());
            if let Some(base) = base {
                composition = composition.with_base_url(base.as_str())?;
            }

            let fonts = FontManager::load(config.font_path.as_deref())?;
            let mut rasterizer = Rasterizer::new(fonts);
            let target = Target::Id(&target);
            let loaded = ImageLoader::http(&config)?
                .preload_composition(&mut rasterizer, &composition, &target)?;
            log::info!("preloaded {} images", loaded);

            let exporter = Exporter::new(DirectorySaver::new(out_dir.unwrap_or(config.output_dir.clone())));
            let options = ExportOptions {
                render: config.render_options()?,
                mime,
                quality,
            };
            let path = exporter.render_and_export(&rasterizer, &composition, target, &name, &options)?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    if let Err(e) = run(Cli::parse()) {
        eprintln!("stockframe: {:#}", e);
        std::process::exit(1);
    }
}
