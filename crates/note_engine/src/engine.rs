use std::sync::{mpsc, Arc};
use std::thread;

use engine_logging::engine_error;
use url::Url;

use crate::assets::Collaborators;
use crate::config::ConverterOptions;
use crate::convert::HtmlNoteAdapter;
use crate::credentials::{export_credentials, CredentialStore, CsvError, CsvExport};
use crate::node::NoteNode;

type ConvertCompletion = Box<dyn FnOnce(Vec<NoteNode>) + Send>;
type ExportCompletion = Box<dyn FnOnce(Result<CsvExport, CsvError>) + Send>;

enum EngineCommand {
    Convert {
        html: String,
        base_url: Url,
        completion: ConvertCompletion,
    },
    ExportCredentials {
        store: Arc<dyn CredentialStore>,
        completion: ExportCompletion,
    },
}

/// Runs conversions and exports on a background thread with its own tokio
/// runtime; results come back through completion callbacks, invoked on
/// that runtime's worker threads.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    pub fn new(options: ConverterOptions, collaborators: Collaborators) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();

        thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    engine_error!("note engine could not start its runtime: {err}");
                    return;
                }
            };
            while let Ok(command) = cmd_rx.recv() {
                let options = options.clone();
                let collaborators = collaborators.clone();
                runtime.spawn(async move {
                    handle_command(command, options, collaborators).await;
                });
            }
        });

        Self { cmd_tx }
    }

    /// Converts `html`; `completion` receives the top-level nodes once all
    /// images are resolved.
    pub fn convert(
        &self,
        html: impl Into<String>,
        base_url: Url,
        completion: impl FnOnce(Vec<NoteNode>) + Send + 'static,
    ) {
        let command = EngineCommand::Convert {
            html: html.into(),
            base_url,
            completion: Box::new(completion),
        };
        if self.cmd_tx.send(command).is_err() {
            engine_error!("note engine stopped; conversion dropped");
        }
    }

    pub fn export_credentials(
        &self,
        store: Arc<dyn CredentialStore>,
        completion: impl FnOnce(Result<CsvExport, CsvError>) + Send + 'static,
    ) {
        let command = EngineCommand::ExportCredentials {
            store,
            completion: Box::new(completion),
        };
        if self.cmd_tx.send(command).is_err() {
            engine_error!("note engine stopped; export dropped");
        }
    }
}

async fn handle_command(
    command: EngineCommand,
    options: ConverterOptions,
    collaborators: Collaborators,
) {
    match command {
        EngineCommand::Convert {
            html,
            base_url,
            completion,
        } => {
            let adapter = HtmlNoteAdapter::new(base_url)
                .with_options(options)
                .with_collaborators(collaborators);
            let nodes = adapter.convert(&html).await;
            completion(nodes);
        }
        EngineCommand::ExportCredentials { store, completion } => {
            completion(export_credentials(store).await);
        }
    }
}
