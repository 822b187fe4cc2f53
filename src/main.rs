mod alert;
mod cli;
mod config;
mod console;
mod engine;
mod layout;
mod logging;
mod process;
mod runner;
mod version;

fn main() -> anyhow::Result<()> {
    let cli = cli::parse();
    runner::run(cli)
}
