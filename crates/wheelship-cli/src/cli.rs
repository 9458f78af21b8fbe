use std::path::PathBuf;

use clap::{ArgAction, Parser};

pub const WHEELSHIP_HELP_TEMPLATE: &str =
    "{before-help}\nUsage:\n    {usage}\n\nArguments:\n{positionals}\n\nOptions:\n{options}\n";

pub const WHEELSHIP_BEFORE_HELP: &str = concat!(
    "wheelship ",
    env!("CARGO_PKG_VERSION"),
    " – manylinux release builder for Cython packages\n\n",
    "\x1b[1;36mStages\x1b[0m\n",
    "  manifest         Regenerate MANIFEST.in from the .pxd and .pyx sources.\n",
    "  branch           Require the checkout to be on dev-<version>.\n",
    "  build            Compile the extensions, then build a wheel and sdist.\n",
    "  repair           Run auditwheel in the manylinux image; move the wheel into dist/.\n",
    "  verify           Install each artifact and run the test suite against it.\n\n",
    "Nothing is uploaded; the final line is the twine command to run.\n",
);

#[derive(Parser, Debug)]
#[command(
    name = "wheelship",
    author,
    version,
    before_help = WHEELSHIP_BEFORE_HELP,
    help_template = WHEELSHIP_HELP_TEMPLATE
)]
#[allow(clippy::struct_excessive_bools)]
pub struct WheelshipCli {
    #[arg(
        id = "release_version",
        value_name = "VERSION",
        value_parser = parse_version,
        help = "Release version, e.g. 1.3.3"
    )]
    pub release_version: String,
    #[arg(
        long,
        value_name = "DIR",
        help = "Project checkout (defaults to WHEELSHIP_PROJECT_ROOT or ~/repo/pomdp-py)"
    )]
    pub project: Option<PathBuf>,
    #[arg(
        long,
        value_name = "NAME",
        help = "Import package scanned for Cython sources (defaults to pomdp_py)"
    )]
    pub package: Option<String>,
    #[arg(
        long,
        value_name = "NAME",
        help = "Repository name passed to twine in the printed upload command"
    )]
    pub repository: Option<String>,
    #[arg(long, help = "Print the planned commands without running anything")]
    pub dry_run: bool,
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)"
    )]
    pub quiet: bool,
    #[arg(short, long, action = ArgAction::Count, help = "Increase logging (-vv reaches trace)")]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q")]
    pub trace: bool,
    #[arg(long, help = "Emit {status,message,details} JSON envelopes")]
    pub json: bool,
    #[arg(long, help = "Disable colored human output")]
    pub no_color: bool,
}

/// Taken verbatim; only an empty string is refused.
fn parse_version(raw: &str) -> Result<String, String> {
    if raw.is_empty() {
        return Err("version must not be empty".to_string());
    }
    Ok(raw.to_string())
}
