//! SeaORM entity models

mod checklist;
mod chunk;
mod document;
mod working_paper;

pub use document::{
    ActiveModel as DocumentActiveModel, Column as DocumentColumn, Entity as DocumentEntity,
    Model as Document,
};

pub use chunk::{
    ActiveModel as ChunkActiveModel, ChunkMetadata, Column as ChunkColumn, Entity as ChunkEntity,
    Model as Chunk, ProcessingMethod,
};

pub use checklist::{
    ActiveModel as ChecklistActiveModel, Column as ChecklistColumn, Entity as ChecklistEntity,
    Model as Checklist, Question,
};

pub use working_paper::{
    ActiveModel as WorkingPaperActiveModel, AnswerRecord, Column as WorkingPaperColumn,
    Entity as WorkingPaperEntity, Model as WorkingPaper, SourceRef, WorkingPaperStatus,
};
