use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use crate::data_paths::DataPaths;
use crate::markets::client::ReyaClient;
use crate::server;
use crate::service::SnapshotService;
use crate::store::CsvStore;

#[derive(Args, Clone)]
pub struct ServeArgs {
    /// Host interface to bind
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, default_value = "8080")]
    pub port: u16,
}

pub struct ServeCommand {
    args: ServeArgs,
}

impl ServeCommand {
    pub fn new(args: ServeArgs) -> Self {
        Self { args }
    }

    pub async fn execute(&self, data_paths: DataPaths) -> Result<()> {
        let store = CsvStore::new(data_paths.snapshot_csv());
        let service = Arc::new(SnapshotService::new(ReyaClient::new()?, store));

        server::serve(&self.args.host, self.args.port, service).await
    }
}
