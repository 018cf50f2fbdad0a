use clap::Parser;

fn main() -> miette::Result<()> {
    aether_run::Cli::parse().run()
}
