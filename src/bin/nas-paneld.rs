use clap::Parser;
use nas_paneld::cli::Cli;
use nas_paneld::Error;

fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    nas_paneld::run::main(&cli)
}
