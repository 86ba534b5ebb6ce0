pub mod autosave;
pub mod dashboard;
pub mod export;
pub mod refresh;
pub mod timeline;
pub mod transitions;
