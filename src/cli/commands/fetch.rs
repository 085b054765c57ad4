use anyhow::Result;
use clap::Args;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};

use crate::data_paths::DataPaths;
use crate::markets::client::ReyaClient;
use crate::markets::filter::lowest_by_oi_cap;
use crate::markets::types::Snapshot;
use crate::service::SnapshotService;
use crate::store::CsvStore;

#[derive(Args, Clone)]
pub struct FetchArgs {
    /// Number of lowest-oiCap markets to print
    #[arg(long, default_value = "10")]
    pub top: usize,

    /// Prefer the cached snapshot over a live fetch
    #[arg(long)]
    pub cached: bool,
}

impl Default for FetchArgs {
    fn default() -> Self {
        Self {
            top: 10,
            cached: false,
        }
    }
}

pub struct FetchCommand {
    args: FetchArgs,
}

impl FetchCommand {
    pub fn new(args: FetchArgs) -> Self {
        Self { args }
    }

    pub async fn execute(&self, data_paths: DataPaths) -> Result<()> {
        let store = CsvStore::new(data_paths.snapshot_csv());
        let service = SnapshotService::new(ReyaClient::new()?, store);

        let snapshot = service.get_snapshot(!self.args.cached).await?;

        if self.args.cached {
            println!(
                "Loaded {} markets from {}",
                snapshot.len(),
                service.store().path().display()
            );
        } else {
            println!(
                "Saved {} markets to {}",
                snapshot.len(),
                service.store().path().display()
            );
        }

        print_lowest_table(&snapshot, self.args.top);
        Ok(())
    }
}

fn print_lowest_table(snapshot: &Snapshot, n: usize) {
    let lowest = lowest_by_oi_cap(snapshot, n);
    println!("{} lowest oiCap markets:", lowest.len());

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Market", "oiCap", "Current OI"]);

    for record in &lowest.records {
        table.add_row(vec![
            record.market.clone(),
            record
                .oi_cap
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record
                .current_oi
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }

    println!("{table}");
}
