use std::{net::SocketAddr, path::PathBuf};

use clap::{Args, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rpn",
    about = "Reverse polish notation stack service",
    version = crate::version::VERSION,
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,
}

#[derive(Args, Debug, Clone)]
pub struct Config {
    #[arg(
        long,
        env = "RPN_BIND",
        value_name = "ADDR",
        default_value = "127.0.0.1:8000"
    )]
    pub bind: SocketAddr,

    #[arg(
        long,
        env = "RPN_DATA_DIR",
        value_name = "DIR",
        default_value = "./data"
    )]
    pub data_dir: PathBuf,

    /// Default and maximum page size when listing stacks.
    #[arg(
        long = "list-limit-max",
        env = "RPN_LIST_LIMIT_MAX",
        value_name = "N",
        default_value_t = 100,
        value_parser = clap::value_parser!(u32).range(1..=10000)
    )]
    pub list_limit_max: u32,
}

impl Config {
    pub fn list_limit_max(&self) -> usize {
        self.list_limit_max as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_flags() {
        let cli = Cli::try_parse_from(["rpn"]).unwrap();
        assert_eq!(cli.config.bind, SocketAddr::from(([127, 0, 0, 1], 8000)));
        assert_eq!(cli.config.data_dir, PathBuf::from("./data"));
        assert_eq!(cli.config.list_limit_max(), 100);
    }

    #[test]
    fn list_limit_max_is_bounded() {
        assert!(Cli::try_parse_from(["rpn", "--list-limit-max", "0"]).is_err());
        let cli = Cli::try_parse_from(["rpn", "--list-limit-max", "5"]).unwrap();
        assert_eq!(cli.config.list_limit_max(), 5);
    }
}
