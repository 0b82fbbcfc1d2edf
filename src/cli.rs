//! 命令行参数（playbook / playbook-ingest）

use std::path::PathBuf;

use clap::Parser;

/// HTTP 服务
#[derive(Parser, Debug)]
#[command(name = "playbook")]
#[command(about = "Retrieval-augmented coding assistant with playbook reflection", long_about = None)]
#[command(version)]
pub struct ServeArgs {
    /// 配置文件路径（覆盖 config/default.toml 中的键）
    #[arg(long, env = "PLAYBOOK_CONFIG")]
    pub config: Option<PathBuf>,
}

/// 代码目录索引任务
#[derive(Parser, Debug)]
#[command(name = "playbook-ingest")]
#[command(about = "Index a source directory into the CodeFragment collection", long_about = None)]
#[command(version)]
pub struct IngestArgs {
    /// 要索引的目录
    pub dir: PathBuf,

    /// 配置文件路径
    #[arg(long, env = "PLAYBOOK_CONFIG")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_ingest_args() {
        let args = IngestArgs::try_parse_from(["playbook-ingest", "src", "--config", "prod.toml"]).unwrap();
        assert_eq!(args.dir, PathBuf::from("src"));
        assert_eq!(args.config, Some(PathBuf::from("prod.toml")));
    }

    #[test]
    fn test_help_is_not_a_directory() {
        let err = IngestArgs::try_parse_from(["playbook-ingest", "--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_config_flag_requires_value() {
        assert!(IngestArgs::try_parse_from(["playbook-ingest", "src", "--config"]).is_err());
        assert!(ServeArgs::try_parse_from(["playbook", "--config"]).is_err());
    }

    #[test]
    fn test_ingest_requires_directory() {
        let err = IngestArgs::try_parse_from(["playbook-ingest"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }
}
