use crate::comparison::ComparisonSeriesBuilder;
use crate::models::UploadBatch;
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Session>,
    pub uploads: Arc<Mutex<Vec<UploadBatch>>>,
    pub comparison: ComparisonSeriesBuilder,
}

impl AppState {
    pub fn new(session: Session, uploads: Vec<UploadBatch>, selection_limit: usize) -> Self {
        Self {
            session: Arc::new(session),
            uploads: Arc::new(Mutex::new(uploads)),
            comparison: ComparisonSeriesBuilder::new(selection_limit),
        }
    }
}
