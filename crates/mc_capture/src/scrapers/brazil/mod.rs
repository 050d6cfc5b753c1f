use std::sync::Arc;

use crate::scrapers::{Region, SourceAdapter};

pub mod estadao;
pub mod valor;

pub use estadao::EstadaoAdapter;
pub use valor::ValorAdapter;

pub const REGION: Region = Region { name: "brazil" };

/// Returns all available Brazilian newspaper adapters
pub fn get_adapters() -> Vec<Arc<dyn SourceAdapter>> {
    vec![Arc::new(EstadaoAdapter::new()), Arc::new(ValorAdapter::new())]
}
