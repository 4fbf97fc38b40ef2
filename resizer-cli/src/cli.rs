use std::path::PathBuf;

use clap::Parser;
use resizer_engine::SizeSpec;

/// Resize every image matched by a glob into one JPEG per configured size.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Output sizes as `suffix:size`; comma separated or repeated. Size 0 keeps the source dimensions
    #[arg(
        short = 's',
        long = "image-sizes",
        env = "RESIZER_IMAGE_SIZES",
        value_delimiter = ','
    )]
    pub image_sizes: Vec<SizeSpec>,

    /// Glob matching the source images (e.g. `photos/*.png`)
    #[arg(short = 'i', long = "input-file-glob", env = "RESIZER_INPUT_GLOB")]
    pub input_glob: Option<String>,

    /// Directory the resized images are written to; created when missing
    #[arg(short = 'o', long = "output-directory", env = "RESIZER_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Overwrite output files that already exist
    #[arg(short = 'f', long = "force-save", env = "RESIZER_FORCE")]
    pub force: bool,

    /// JPEG quality, 1 to 100 [default: 80]
    #[arg(short = 'q', long = "image-quality", env = "RESIZER_QUALITY")]
    pub quality: Option<u8>,

    /// Workers per stage [default: 5]
    #[arg(short = 'w', long = "worker-count", env = "RESIZER_WORKERS")]
    pub workers: Option<usize>,

    /// Per-stage worker overrides as `stage=count` (decode, expand, transform, persist)
    #[arg(long = "stage-workers", env = "RESIZER_STAGE_WORKERS", value_delimiter = ',')]
    pub stage_workers: Vec<String>,

    /// TOML file providing defaults for any of the options above
    #[arg(short = 'c', long = "config", env = "RESIZER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Only log errors
    #[arg(long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable the progress bar
    #[arg(long = "no-progress", env = "RESIZER_NO_PROGRESS")]
    pub no_progress: bool,

    /// Exit with status 2 when any output could not be produced
    #[arg(long = "strict", env = "RESIZER_STRICT")]
    pub strict: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_repeated_and_comma_separated_sizes() {
        let args = Args::try_parse_from([
            "resizer",
            "-s",
            "_sm:50,_md:200",
            "--image-sizes",
            "_lg:0",
            "-i",
            "in/*.png",
            "-o",
            "out",
            "-q",
            "90",
            "-f",
        ])
        .unwrap();

        let sizes: Vec<String> = args.image_sizes.iter().map(ToString::to_string).collect();
        assert_eq!(sizes, ["_sm:50", "_md:200", "_lg:0"]);
        assert_eq!(args.quality, Some(90));
        assert!(args.force);
        assert_eq!(args.workers, None);
    }

    #[test]
    fn rejects_malformed_size() {
        assert!(Args::try_parse_from(["resizer", "-s", "_sm"]).is_err());
    }
}
