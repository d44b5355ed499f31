use anyhow::Result;
use structopt::StructOpt;

use courier::services::*;

#[derive(Debug, StructOpt)]
#[structopt(
    about = "Round-robin message dispatch and channel listeners on a publish/subscribe bus.",
    version = env!("CARGO_PKG_VERSION")
)]
struct MainOptions {
    #[structopt(flatten)]
    shared_options: SharedOptions,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    Run(run::Options),
    Dispatch(dispatcher::Options),
    Listen(listener::Options),
    Publish(publish::Options),
}

#[tokio::main]
async fn main() -> Result<()> {
    let main_options = MainOptions::from_args();
    let shared_options = main_options.shared_options;

    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&shared_options.log)
        .init();

    log::info!("{}", env!("CARGO_PKG_VERSION"));

    match main_options.cmd {
        Command::Run(options) => run::run(shared_options, options).await?,
        Command::Dispatch(options) => dispatcher::run(shared_options, options).await?,
        Command::Listen(options) => listener::run(shared_options, options).await?,
        Command::Publish(options) => publish::run(shared_options, options).await?,
    }

    Ok(())
}
