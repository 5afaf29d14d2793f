//! Go build-action executor.
//!
//! Drives the Go compiler and linker directly, without the `go` command.
//! Each invocation performs one action: compile a package archive, link an
//! executable, build a test executable, or index the standard library.
//!
//! Pipeline: parse args → build config → classify sources → resolve
//!           imports → (test: synthesize harness) → write importcfg →
//!           run tool → publish output.

mod cli;
mod compile;
mod config;
mod constraint;
mod error;
mod harness;
mod link;
mod manifest;
mod resolve;
mod scanner;
mod scratch;
mod source;
mod stdlib;
mod test;
mod toolchain;
mod verbose;

use anyhow::Result;
use clap::Parser;

use config::BuildConfig;
use error::BuildError;

fn main() {
    let cli = cli::Cli::parse();
    verbose::init(cli.quiet, cli.verbose);

    if let Err(err) = run(&cli) {
        eprintln!("error: {err:#}");
        let code = err.downcast_ref::<BuildError>().map_or(1, BuildError::exit_code);
        std::process::exit(code);
    }
}

fn run(cli: &cli::Cli) -> Result<()> {
    let config = BuildConfig::from_cli(cli);
    verbose::vprintln!(
        "target {}, host {}{}",
        config.target.dir_name(),
        config.host.dir_name(),
        if config.tags.is_empty() {
            String::new()
        } else {
            format!(", tags {}", config.tags.join(","))
        }
    );

    match &cli.command {
        cli::Command::Compile(args) => compile::cmd_compile(&config, args),
        cli::Command::Link(args) => link::cmd_link(&config, args),
        cli::Command::Test(args) => test::cmd_test(&config, args),
        cli::Command::Stdimportcfg(args) => stdlib::cmd_stdimportcfg(&config, args),
    }
}
