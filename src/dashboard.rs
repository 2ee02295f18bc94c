//! The dashboard view: saved ebooks and their status.

use crate::backend::StudioBackend;
use crate::observability::DASHBOARD_LOAD_ERRORS;
use crate::types::{EbookRecord, EbookStatus};

/// Saved ebooks as listed by the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dashboard {
    items: Vec<EbookRecord>,
}

impl Dashboard {
    /// A dashboard over `items`.
    pub fn new(items: Vec<EbookRecord>) -> Self {
        Self { items }
    }

    /// Fetch the ebook list.  Any failure gives an empty dashboard.
    pub async fn load<B: StudioBackend + ?Sized>(backend: &B) -> Self {
        match backend.list_ebooks().await {
            Ok(items) => Self::new(items),
            Err(err) => {
                DASHBOARD_LOAD_ERRORS.click();
                tracing::warn!(error = %err, "could not load ebook list");
                Self::default()
            }
        }
    }

    /// The listed ebooks, in backend order.
    pub fn items(&self) -> &[EbookRecord] {
        &self.items
    }

    /// Number of ebooks.
    pub fn ebook_count(&self) -> usize {
        self.items.len()
    }

    /// Number of ebooks with the given status.
    pub fn count_with_status(&self, status: EbookStatus) -> usize {
        self.items
            .iter()
            .filter(|item| item.status() == status)
            .count()
    }
}
