use anyhow::Result;

mod app;
mod logging;

fn main() -> Result<()> {
    let args = relocator::cli::parse();
    app::run(args)
}
