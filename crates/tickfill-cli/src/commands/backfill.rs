use tickfill_core::SyncRequest;

use crate::cli::{BackfillArgs, Cli};
use crate::error::CliError;

pub async fn run(cli: &Cli, args: &BackfillArgs) -> Result<(), CliError> {
    let request =
        SyncRequest::backfill(args.start_date, args.end_date).with_batch_size(args.batch_size);
    super::execute(cli, request).await
}
