use std::process::ExitCode;

use ftp_probe::cli::Cli;
use ftp_probe::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::parse_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(code) => return ExitCode::from(code),
    };

    if let Err(err) = logging::init_logging(cli.verbose) {
        eprintln!("ftp-probe error: {:#}", err);
        return ExitCode::FAILURE;
    }

    match cli.run().await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("ftp-probe error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
