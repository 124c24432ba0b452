use clap::Parser;

/// This is a budgeted vote-allocation program.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON file describing the scenario to replay: candidates, elections and
    /// ballot submissions. For more information about the file format, read the manual module of
    /// the vote_engine crate.
    #[clap(short, long, value_parser)]
    pub scenario: String,

    /// (file path) A reference file containing the expected summary in JSON format. If provided,
    /// smartvote will check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the replay will be written in
    /// JSON format to the given location instead of the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (RFC 3339 timestamp or empty) The instant at which the scenario runs. Overrides the `now`
    /// field of the scenario file; defaults to the wall clock when neither is given.
    #[clap(long, value_parser)]
    pub now: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
