// modgraph/src/cli.rs
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "modgraph",
    version,
    about = "Walk the transitive module dependency graph of JavaScript entry files and print one JSON record per module"
)]
pub struct CliArgs {
    /// Entry source files
    #[arg(required = true)]
    pub entries: Vec<PathBuf>,

    /// Base directory for relative entries and synthetic identities
    /// (defaults to the current directory)
    #[arg(long)]
    pub basedir: Option<PathBuf>,

    /// Extra resolvable extension, appended to the defaults
    /// (repeatable, e.g. --extension .jsx)
    #[arg(long = "extension", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Dot-separated key path locating package-declared transforms in
    /// a package manifest (e.g. browserify.transform)
    #[arg(long, value_name = "KEY.PATH")]
    pub transform_key: Option<String>,

    /// Disable static dependency extraction for every module
    #[arg(long)]
    pub no_parse: bool,

    /// Extra module-search root (repeatable)
    #[arg(long = "path", value_name = "DIR")]
    pub paths: Vec<PathBuf>,

    /// Pretty-print each record instead of one JSON object per line
    #[arg(long)]
    pub pretty: bool,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
