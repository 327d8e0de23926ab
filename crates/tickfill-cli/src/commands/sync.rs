use tickfill_core::{today_utc, SyncRequest};

use crate::cli::{Cli, SyncArgs};
use crate::error::CliError;

/// Rolling sync of the last `--days` days ending today (UTC).
pub async fn run(cli: &Cli, args: &SyncArgs) -> Result<(), CliError> {
    let request = SyncRequest::rolling(today_utc(), args.days)?
        .with_batch_size(args.batch_size)
        .with_force(args.force);
    super::execute(cli, request).await
}
