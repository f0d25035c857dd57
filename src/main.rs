use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use tracing::{error, info};

use rust_quote::app::bootstrap;
use rust_quote::app_config::log::setup_logging;
use rust_quote::app_config::AppConfig;
use rust_quote::error::PipelineError;
use rust_quote::market::model::{Adjust, BarPeriod, DataKind, RecordSet};
use rust_quote::market::services::{
    render_json, AcquisitionService, FetchOptions, HistoryQuery, IndicatorQuery,
};
use rust_quote::time_util::{self, TimeWindow};

#[derive(Parser, Debug)]
#[command(name = "rust_quote", about = "A股行情获取：缓存、重试、落库")]
struct Cli {
    /// 跳过缓存
    #[arg(long, global = true)]
    no_cache: bool,

    /// 不落库
    #[arg(long, global = true)]
    no_persist: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StoredKind {
    Realtime,
    Info,
    Bars,
    Indicators,
    Rank,
    Board,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 实时行情
    Realtime { symbol: String },
    /// 个股信息
    Info { symbol: String },
    /// 历史K线
    History {
        symbol: String,
        #[arg(long, value_enum, default_value = "daily")]
        period: BarPeriod,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long, value_enum, default_value = "none")]
        adjust: Adjust,
    },
    /// 技术指标
    Indicators {
        symbol: String,
        #[arg(long, value_enum, default_value = "daily")]
        period: BarPeriod,
        /// YYYY-MM-DD，默认今天
        #[arg(long)]
        as_of: Option<String>,
    },
    /// 个股人气榜
    Rank,
    /// 概念板块
    Board,
    /// 查询已落库的数据
    Stored {
        #[arg(value_enum)]
        kind: StoredKind,
        symbol: String,
        #[arg(long, value_enum, default_value = "daily")]
        period: BarPeriod,
        #[arg(long, value_enum, default_value = "none")]
        adjust: Adjust,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
}

fn parse_as_of(as_of: Option<&str>) -> Result<Option<NaiveDate>, PipelineError> {
    as_of
        .map(|s| {
            time_util::parse_date(s)
                .ok_or_else(|| PipelineError::InvalidRequest(format!("无法解析日期: {}", s)))
        })
        .transpose()
}

async fn run(
    service: &AcquisitionService,
    command: Command,
    opts: FetchOptions,
) -> Result<RecordSet, PipelineError> {
    match command {
        Command::Realtime { symbol } => service.realtime_quote(&symbol, opts).await,
        Command::Info { symbol } => service.stock_info(&symbol, opts).await,
        Command::History {
            symbol,
            period,
            start,
            end,
            adjust,
        } => {
            let query = HistoryQuery {
                symbol,
                period,
                start,
                end,
                adjust,
            };
            service.history_quote(&query, opts).await
        }
        Command::Indicators {
            symbol,
            period,
            as_of,
        } => {
            let query = IndicatorQuery {
                symbol,
                period,
                as_of: parse_as_of(as_of.as_deref())?,
            };
            service.indicators(&query, opts).await
        }
        Command::Rank => service.hot_rank(opts).await,
        Command::Board => service.board_quote(opts).await,
        Command::Stored {
            kind,
            symbol,
            period,
            adjust,
            start,
            end,
        } => {
            let kind = match kind {
                StoredKind::Realtime => DataKind::Realtime,
                StoredKind::Info => DataKind::Info,
                StoredKind::Bars => DataKind::Bars { period, adjust },
                StoredKind::Indicators => DataKind::Indicator { period },
                StoredKind::Rank => DataKind::Rank,
                StoredKind::Board => DataKind::Board,
            };
            let window = TimeWindow::from_bounds(start.as_deref(), end.as_deref())
                .map_err(PipelineError::InvalidRequest)?;
            service.stored(kind, &symbol, &window).await
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::from_env();

    // 设置日志，guard 持有到进程退出
    let _guards = setup_logging(&config.log)?;
    info!("rust_quote 启动");

    let service = bootstrap::build_service(&config).await?;
    let opts = FetchOptions {
        use_cache: !cli.no_cache,
        persist: !cli.no_persist,
    };

    let result = run(&service, cli.command, opts).await;
    if let Err(e) = &result {
        error!("获取失败: {}", e);
    }
    println!("{}", render_json(&result));
    Ok(())
}
