use crate::export::{ExportOptions, Exporter, ImageLoader};
use crate::providers::ProviderRegistry;
use crate::rendering::{Composition, Rasterizer, Target};
use crate::search::SearchGateway;
use crate::{Error, ImageResult, Result};
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::thread;
use tokio::sync::oneshot;

/// The synchronous components a [`Studio`] worker owns
pub struct StudioParts {
    pub registry: ProviderRegistry,
    pub gateway: SearchGateway,
    pub rasterizer: Rasterizer,
    pub exporter: Exporter,
    pub loader: ImageLoader,
}

impl StudioParts {
    /// Parts wired from `config`: JSON credential file, HTTP search and
    /// image fetching, configured or system font, output directory saver.
    #[cfg(feature = "http")]
    pub fn from_config(config: &crate::Config) -> Result<Self> {
        let store = crate::providers::JsonFileCredentialStore::open(&config.credentials_path)?;
        let mut registry = ProviderRegistry::with_builtin_providers(store);
        registry.load_saved_credentials();
        let fonts = crate::fonts::FontManager::load(config.font_path.as_deref())?;
        Ok(Self {
            registry,
            gateway: SearchGateway::http(config)?,
            rasterizer: Rasterizer::new(fonts),
            exporter: Exporter::new(crate::export::DirectorySaver::new(&config.output_dir)),
            loader: ImageLoader::http(config)?,
        })
    }
}

/// One render-and-save request for the worker
#[derive(Debug, Clone, Default)]
pub struct ExportJob {
    pub html: String,
    /// Element id of the subtree to render
    pub target: String,
    pub file_name: String,
    pub base_url: Option<String>,
    /// Fetch the subtree's images before rendering
    pub preload: bool,
    pub options: ExportOptions,
}

enum Command {
    Search(String, String, oneshot::Sender<Result<Vec<ImageResult>>>),
    SetCredential(String, String, oneshot::Sender<Result<()>>),
    HasCredential(String, oneshot::Sender<Result<bool>>),
    ListProviders(oneshot::Sender<Result<Vec<String>>>),
    Preload(String, oneshot::Sender<Result<(u32, u32)>>),
    Export(Box<ExportJob>, oneshot::Sender<Result<PathBuf>>),
    ClearImages(oneshot::Sender<Result<usize>>),
    Close(oneshot::Sender<Result<()>>),
}

/// An async handle over the search, credential and export core.
///
/// A dedicated worker thread owns every component and executes commands in
/// arrival order, so `set_credential` calls apply last-write-wins and a
/// render always sees images preloaded before it. Dropping a pending future
/// discards its result; the worker still finishes the command.
#[derive(Clone)]
pub struct Studio {
    cmd_tx: Sender<Command>,
}

impl Studio {
    /// Spawn a worker owning `parts`.
    pub async fn new(parts: StudioParts) -> Result<Self> {
        Self::spawn(move || Ok(parts)).await
    }

    /// Spawn a worker whose parts are built from `config` on the worker
    /// thread. Construction failures are returned here.
    #[cfg(feature = "http")]
    pub async fn from_config(config: crate::Config) -> Result<Self> {
        Self::spawn(move || StudioParts::from_config(&config)).await
    }

    async fn spawn<F>(init: F) -> Result<Self>
    where
        F: FnOnce() -> Result<StudioParts> + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();

        thread::spawn(move || {
            let mut parts = match init() {
                Ok(parts) => parts,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };
            let _ = init_tx.send(Ok(()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Search(query, provider, resp) => {
                        let res = parts.gateway.search(&parts.registry, &query, &provider);
                        let _ = resp.send(res);
                    }
                    Command::SetCredential(provider, key, resp) => {
                        let res = parts.registry.set_credential(&provider, key);
                        let _ = resp.send(res);
                    }
                    Command::HasCredential(provider, resp) => {
                        let _ = resp.send(Ok(parts.registry.has_credential(&provider)));
                    }
                    Command::ListProviders(resp) => {
                        let _ = resp.send(Ok(parts.registry.list_providers()));
                    }
                    Command::Preload(url, resp) => {
                        let res = parts.loader.preload_image(&url).map(|image| {
                            let size = (image.natural_width(), image.natural_height());
                            parts.rasterizer.add_image(image);
                            size
                        });
                        let _ = resp.send(res);
                    }
                    Command::Export(job, resp) => {
                        let res = run_export(&mut parts, &job);
                        let _ = resp.send(res);
                    }
                    Command::ClearImages(resp) => {
                        let images = parts.rasterizer.images_mut();
                        let cleared = images.len();
                        images.clear();
                        log::debug!("cleared {} preloaded images", cleared);
                        let _ = resp.send(Ok(cleared));
                    }
                    Command::Close(resp) => {
                        let _ = resp.send(Ok(()));
                        break;
                    }
                }
            }
            log::debug!("studio worker stopped");
        });

        init_rx
            .await
            .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))??;

        Ok(Self { cmd_tx })
    }

    /// Search one provider; see [`SearchGateway::search`].
    pub async fn search(&self, query: &str, provider_id: &str) -> Result<Vec<ImageResult>> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Search(query.to_string(), provider_id.to_string(), tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Search canceled: {}", e)))?
    }

    pub async fn set_credential(&self, provider_id: &str, key: &str) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::SetCredential(provider_id.to_string(), key.to_string(), tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("SetCredential canceled: {}", e)))?
    }

    pub async fn has_credential(&self, provider_id: &str) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::HasCredential(provider_id.to_string(), tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("HasCredential canceled: {}", e)))?
    }

    pub async fn list_providers(&self) -> Result<Vec<String>> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::ListProviders(tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("ListProviders canceled: {}", e)))?
    }

    /// Fetch and decode `url` into the worker's image store. Returns the
    /// image's natural size.
    pub async fn preload(&self, url: &str) -> Result<(u32, u32)> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Preload(url.to_string(), tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Preload canceled: {}", e)))?
    }

    /// Preload several images; one outcome per URL, in input order.
    pub async fn preload_all(&self, urls: &[String]) -> Vec<Result<(u32, u32)>> {
        futures::future::join_all(urls.iter().map(|url| self.preload(url))).await
    }

    /// Render `job.target` from `job.html`, encode and save it.
    pub async fn render_and_export(&self, job: ExportJob) -> Result<PathBuf> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Export(Box::new(job), tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Export canceled: {}", e)))?
    }

    /// Drop every preloaded image held by the worker. Returns how many were
    /// dropped; later renders must preload again.
    pub async fn clear_images(&self) -> Result<usize> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::ClearImages(tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("ClearImages canceled: {}", e)))?
    }

    /// Stop the worker after the commands already queued.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Close(tx))?;
        rx.await
            .map_err(|e| Error::Other(format!("Close canceled: {}", e)))?
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| Error::Other("studio worker has stopped".into()))
    }
}

fn run_export(parts: &mut StudioParts, job: &ExportJob) -> Result<PathBuf> {
    let mut composition = Composition::parse(&job.html);
    if let Some(base) = &job.base_url {
        composition = composition.with_base_url(base)?;
    }
    let target = Target::Id(&job.target);
    if job.preload {
        parts
            .loader
            .preload_composition(&mut parts.rasterizer, &composition, &target)?;
    }
    parts.exporter.render_and_export(
        &parts.rasterizer,
        &composition,
        target,
        &job.file_name,
        &job.options,
    )
}
