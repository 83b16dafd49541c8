pub mod decoders;
pub mod enricher;
pub mod fetcher;
pub mod gmail_client;
pub mod service;
