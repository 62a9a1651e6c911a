/// Command module for the `msalign` CLI.
///
/// Each submodule implements one subcommand. The `run` function in each
/// module takes the parsed arguments plus the experiment configuration and
/// returns `Ok(())` on success or a [`crate::error::CliError`] on failure.
pub mod compare;
pub mod evaluate;
pub mod orders;
pub mod plan;
pub mod resolve;
pub mod run;
