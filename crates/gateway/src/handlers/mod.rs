//! Request handlers

pub mod documents;
pub mod health;
pub mod rag;
pub mod working_papers;
