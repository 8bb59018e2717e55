mod app;
mod audio;
mod cli;
mod keymap;
mod panel;
mod results;
mod surface;

use app::App;
use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("dt=info".parse()?)
                .add_directive("dt_session=info".parse()?),
        )
        .init();

    let plan = Cli::parse().plan()?;
    App::new(plan).run()
}
