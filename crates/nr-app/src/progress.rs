use nr_sync::{SyncMode, SyncStage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Loading,
    Validating,
    Planning,
    PushingToStore,
    ReviewingWriteback,
    WritingBack,
    Auditing,
    Completed,
}

impl From<SyncStage> for CycleStage {
    fn from(stage: SyncStage) -> Self {
        match stage {
            SyncStage::Planning => CycleStage::Planning,
            SyncStage::PushingToStore => CycleStage::PushingToStore,
            SyncStage::ReviewingWriteback => CycleStage::ReviewingWriteback,
            SyncStage::WritingBack => CycleStage::WritingBack,
            SyncStage::Auditing => CycleStage::Auditing,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CycleProgressEvent {
    pub mode: SyncMode,
    pub stage: CycleStage,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
}

impl CycleProgressEvent {
    pub fn stage(
        mode: SyncMode,
        stage: CycleStage,
        elapsed_wall_s: f64,
        message: Option<String>,
    ) -> Self {
        Self {
            mode,
            stage,
            elapsed_wall_s,
            message,
        }
    }
}
