use std::sync::Arc;

use docqa_core::config::{IndexBackend, Settings};
use docqa_core::error::Result;
use docqa_core::traits::VectorIndex;

pub mod lance;
pub mod memory;
pub mod schema;

pub use lance::LanceIndex;
pub use memory::MemoryIndex;

/// Open the index backend named in `index.backend`, empty and ready for inserts.
pub async fn open_index(settings: &Settings) -> Result<Arc<dyn VectorIndex>> {
    match settings.index.backend {
        IndexBackend::Memory => Ok(Arc::new(MemoryIndex::new())),
        IndexBackend::Lancedb => {
            let index = LanceIndex::create_fresh(&settings.lancedb_dir(), &settings.index.table).await?;
            Ok(Arc::new(index))
        }
    }
}
