use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// K线周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum BarPeriod {
    #[serde(rename = "1")]
    #[value(name = "1")]
    Min1,
    #[serde(rename = "5")]
    #[value(name = "5")]
    Min5,
    #[serde(rename = "15")]
    #[value(name = "15")]
    Min15,
    #[serde(rename = "30")]
    #[value(name = "30")]
    Min30,
    #[serde(rename = "60")]
    #[value(name = "60")]
    Min60,
    #[serde(rename = "daily")]
    #[value(name = "daily")]
    Daily,
    #[serde(rename = "weekly")]
    #[value(name = "weekly")]
    Weekly,
    #[serde(rename = "monthly")]
    #[value(name = "monthly")]
    Monthly,
}

impl BarPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BarPeriod::Min1 => "1",
            BarPeriod::Min5 => "5",
            BarPeriod::Min15 => "15",
            BarPeriod::Min30 => "30",
            BarPeriod::Min60 => "60",
            BarPeriod::Daily => "daily",
            BarPeriod::Weekly => "weekly",
            BarPeriod::Monthly => "monthly",
        }
    }

    /// 分钟级周期
    pub fn is_intraday(&self) -> bool {
        matches!(
            self,
            BarPeriod::Min1 | BarPeriod::Min5 | BarPeriod::Min15 | BarPeriod::Min30 | BarPeriod::Min60
        )
    }
}

impl fmt::Display for BarPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 复权方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
pub enum Adjust {
    /// 不复权
    #[default]
    #[serde(rename = "none")]
    #[value(name = "none")]
    None,
    /// 前复权
    #[serde(rename = "qfq")]
    #[value(name = "qfq")]
    Forward,
    /// 后复权
    #[serde(rename = "hfq")]
    #[value(name = "hfq")]
    Backward,
}

impl Adjust {
    pub fn as_str(&self) -> &'static str {
        match self {
            Adjust::None => "none",
            Adjust::Forward => "qfq",
            Adjust::Backward => "hfq",
        }
    }

}

impl fmt::Display for Adjust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 数据种类，每种对应一个记录变体和一张表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataKind {
    Realtime,
    Info,
    Bars { period: BarPeriod, adjust: Adjust },
    Indicator { period: BarPeriod },
    Rank,
    Board,
}

impl DataKind {
    pub fn name(&self) -> &'static str {
        match self {
            DataKind::Realtime => "realtime",
            DataKind::Info => "info",
            DataKind::Bars { .. } => "bars",
            DataKind::Indicator { .. } => "indicators",
            DataKind::Rank => "rank",
            DataKind::Board => "board",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKind::Bars { period, adjust } => write!(f, "bars:{}:{}", period, adjust),
            DataKind::Indicator { period } => write!(f, "indicators:{}", period),
            other => f.write_str(other.name()),
        }
    }
}
