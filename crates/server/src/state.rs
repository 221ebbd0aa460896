use std::path::PathBuf;
use std::sync::Arc;

use hlsladder_transcoder::orchestrator::JobOrchestrator;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<JobOrchestrator>,
    /// Raw uploads land here, named by job id.
    pub upload_dir: PathBuf,
}
