use crate::bundle::compress::CompressionSupport;
use crate::config::PkgscopeConfig;
use crate::registry::PackumentCache;
use reqwest::Client;

/// State shared by every request a worker serves: configuration, the HTTP
/// client, the packument cache and the compression capability probes.
/// Created at worker start and dropped with it.
#[derive(Debug)]
pub struct Session {
    pub config: PkgscopeConfig,
    pub client: Client,
    pub packuments: PackumentCache,
    pub compression: CompressionSupport,
}

impl Session {
    pub fn new(config: PkgscopeConfig) -> Self {
        Session {
            config,
            client: Client::new(),
            packuments: PackumentCache::new(),
            compression: CompressionSupport::new(),
        }
    }
}
