//! Engine runtime owned by the embedder.
//!
//! Everything that used to be process-wide state — the codec search path,
//! the loaded codec libraries, converter initialization — lives in an
//! explicit [`Runtime`] value. The embedder creates one at startup, hands
//! it to every [`CaptureContext`](crate::CaptureContext) it creates, and
//! drops it at shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use fc_encoder::{FaacLibrary, OpenH264Library};
use tracing::{info, warn};

use crate::convert;

/// Runtime options.
#[derive(Clone, Debug, Default)]
pub struct RuntimeConfig {
    /// Directory searched for the codec shared libraries. `None` uses the
    /// system loader paths.
    pub codec_dir: Option<PathBuf>,
}

/// Loaded-codec state shared by all capture contexts.
pub struct Runtime {
    openh264: Option<Arc<OpenH264Library>>,
    faac: Option<Arc<FaacLibrary>>,
}

impl Runtime {
    /// Initialize the runtime: prime the color converter and attempt to
    /// load the codec libraries. Missing libraries are tolerated here —
    /// context creation fails later only if a lane actually needs the
    /// missing codec.
    pub fn new(config: RuntimeConfig) -> Self {
        convert::initialize_converter();

        let dir = config.codec_dir.as_deref();
        let openh264 = match OpenH264Library::load(dir) {
            Ok(lib) => Some(Arc::new(lib)),
            Err(e) => {
                warn!(error = %e, "OpenH264 unavailable; software video encoding disabled");
                None
            }
        };
        let faac = match FaacLibrary::load(dir) {
            Ok(lib) => Some(Arc::new(lib)),
            Err(e) => {
                warn!(error = %e, "FAAC unavailable; audio encoding disabled");
                None
            }
        };

        info!(
            openh264 = openh264.is_some(),
            faac = faac.is_some(),
            "Runtime initialized"
        );
        Self { openh264, faac }
    }

    /// The loaded OpenH264 library, if any.
    pub fn openh264(&self) -> Option<&Arc<OpenH264Library>> {
        self.openh264.as_ref()
    }

    /// The loaded FAAC library, if any.
    pub fn faac(&self) -> Option<&Arc<FaacLibrary>> {
        self.faac.as_ref()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("openh264", &self.openh264.is_some())
            .field("faac", &self.faac.is_some())
            .finish()
    }
}
