use crate::cli::{Cli, StatusArgs};
use crate::error::CliError;
use crate::output;

pub fn run(cli: &Cli, args: &StatusArgs) -> Result<(), CliError> {
    let warehouse = super::open_warehouse(cli)?;
    let summary = warehouse.summary(args.limit)?;
    output::render_status(&summary, cli.format, cli.pretty)
}
