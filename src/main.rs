use std::path::PathBuf;

use clap::Parser;
use env_logger::{Builder, Env};

use traffic_signs::{run, Config};

#[derive(Parser, Debug)]
#[command(
    name = "traffic",
    about = "Trains a traffic sign classifier",
    after_help = "Per-epoch loss and accuracy are logged at the info level. \
        They are shown by default and hidden when RUST_LOG is set to warn or error."
)]
struct Args {
    /// Directory with one subdirectory of images per category, named 0 to 42.
    data_directory: PathBuf,
    /// Where to save the trained model. Ending in `.json` saves JSON, anything else bincode.
    model: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    Builder::from_env(Env::default().default_filter_or("info")).init();

    run(&Config::default(), &args.data_directory, args.model.as_deref())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use clap::{error::ErrorKind, CommandFactory, Parser};

    use super::Args;

    #[test]
    fn data_directory_is_required() {
        let err = Args::try_parse_from(["traffic"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("Usage: traffic <DATA_DIRECTORY> [MODEL]"));
    }

    #[test]
    fn model_path_is_optional() {
        let args = Args::try_parse_from(["traffic", "gtsrb"]).unwrap();
        assert_eq!(args.data_directory, Path::new("gtsrb"));
        assert!(args.model.is_none());

        let args = Args::try_parse_from(["traffic", "gtsrb", "model.bin"]).unwrap();
        assert_eq!(args.model.as_deref(), Some(Path::new("model.bin")));
    }

    #[test]
    fn extra_arguments_are_rejected() {
        let err = Args::try_parse_from(["traffic", "gtsrb", "model.bin", "more"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("Usage: traffic"));
    }

    #[test]
    fn help_mentions_where_epoch_metrics_go() {
        let help = Args::command().render_long_help().to_string();
        assert!(help.contains("RUST_LOG"));
        Args::command().debug_assert();
    }
}
