pub mod browser;
pub mod extractor;
pub mod ffprobe;
pub mod http_client;
pub mod pipeline;
pub mod prober;
pub mod ranker;
pub mod resolver;
pub mod sniffer;
pub mod traits;
pub mod upload;
pub mod vpn;
pub mod ytdlp;
