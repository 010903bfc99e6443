pub mod aggregator;
pub mod extract;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod storage;
pub mod transcription;
pub mod upstream;
pub mod vision;
pub mod vocabulary;
pub mod worker;
