use clap::{ArgAction, Parser};

const CMD_NAME: &str = "gf";
const DEFAULT_CONFIG: &str = "campaign.yaml";

/// Stores our command-line args format.
#[derive(Parser)]
#[command(name = CMD_NAME, version, about = None, long_about = None)]
pub struct Args {
    /// Campaign config file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
    #[arg(env = "GNSS_FLOW_CONFIG")]
    pub config: String,

    /// Only build and run the named task definitions (repeatable)
    #[arg(short, long = "task", value_name = "TASK")]
    pub tasks: Vec<String>,

    /// Dry run; print the tasks that would run, but don't run them.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Print resolved sources and whether they need fetching, then exit
    #[arg(short, long)]
    pub sources: bool,

    /// Number of worker threads for asynchronous definitions
    #[arg(short = 'j', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Fail tasks that run longer than this many seconds (asynchronous definitions only)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<f64>,

    /// Run everything sequentially, even asynchronous definitions
    #[arg(long)]
    pub sequential: bool,

    /// Bypass user confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Print additional info; repeat for more (-vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}
