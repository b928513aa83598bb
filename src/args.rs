use clap::{Parser, Subcommand};

/// Collects the answers of a Delphi round and consolidates them.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON configuration file. Relative paths inside it are taken from
    /// the directory of the file. See the manual of delphi_review for the format.
    #[clap(short, long, global = true, value_parser)]
    pub config: Option<String>,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, global = true, takes_value = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Lists the block catalogs and their number of items.
    Blocks {
        /// (directory) Where the `bloco<N>_itens.csv` files are. Overrides the configuration.
        #[clap(long, value_parser)]
        catalog_dir: Option<String>,
    },
    /// Validates an answer sheet against a block and saves the submission.
    Submit {
        /// The block being evaluated, for example bloco1.
        #[clap(short, long, value_parser)]
        block: String,
        /// (file path) The JSON answer sheet of the evaluator.
        #[clap(short, long, value_parser)]
        answers: String,
        /// (directory) Where the block catalogs are. Overrides the configuration.
        #[clap(long, value_parser)]
        catalog_dir: Option<String>,
        /// (directory) Where the submission is written. Overrides the configuration.
        #[clap(long, value_parser)]
        out_dir: Option<String>,
        /// Also require a comment for a relevance of 1 or 2.
        #[clap(long, takes_value = false)]
        strict: bool,
    },
    /// Stacks all the submissions and writes the summaries.
    Consolidate {
        /// (directory) Where the submissions are read and the summaries written.
        #[clap(long, value_parser)]
        out_dir: Option<String>,
        /// (glob, default delphi_*.csv) The submission files to read.
        #[clap(long, value_parser)]
        pattern: Option<String>,
        /// The column holding the vote. Detected when not given.
        #[clap(long, value_parser)]
        vote_column: Option<String>,
        /// (file path) A reference resumo_total.csv. If provided, the computed summary must match it.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
}
