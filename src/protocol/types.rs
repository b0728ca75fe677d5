//! 协议数据类型定义

use crate::protocol::constants::Market;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

/// 价格类型，单位为厘（1元 = 1000厘）
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Price(pub i64);

impl Price {
    pub fn from_yuan(yuan: f64) -> Self {
        Price((yuan * 1000.0).round() as i64)
    }

    /// 由“分”为单位的原始值构造，溢出时返回 `None`
    pub fn from_fen(fen: i64) -> Option<Self> {
        fen.checked_mul(10).map(Price)
    }

    pub fn checked_add(self, rhs: Price) -> Option<Price> {
        self.0.checked_add(rhs.0).map(Price)
    }

    pub fn to_yuan(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl fmt::Debug for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.to_yuan())
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}元", self.to_yuan())
    }
}

/// 证券代码信息
#[derive(Clone, Serialize)]
pub struct SecurityInfo {
    pub code: String,
    pub volume_unit: u16,   // 每手股数，基本是100
    pub name: String,
    pub decimal_point: u8,  // 小数位数，基本是2
    pub pre_close: f32,     // 昨收（对个股无效，对指数有效）
    pub reserved: Vec<u8>,  // 未解析字段，按原始顺序保留
}

impl fmt::Debug for SecurityInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} 每手:{} 小数:{}",
            self.code, self.name, self.volume_unit, self.decimal_point
        )?;
        if self.pre_close > 0.0 {
            write!(f, " 昨收:{:.2}", self.pre_close)?;
        }
        Ok(())
    }
}

/// K线数据项
#[derive(Clone, Serialize)]
pub struct KlineBar {
    pub datetime: NaiveDateTime,
    pub open: Price,
    pub close: Price,
    pub high: Price,
    pub low: Price,
    pub volume: f32,
    pub amount: f32,
    /// 上涨/下跌家数，仅指数K线携带
    pub up_down: Option<(u16, u16)>,
}

impl fmt::Debug for KlineBar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} 开:{:.2} 高:{:.2} 低:{:.2} 收:{:.2} 量:{} 额:{:.0}",
            self.datetime.format("%Y-%m-%d %H:%M"),
            self.open.to_yuan(),
            self.high.to_yuan(),
            self.low.to_yuan(),
            self.close.to_yuan(),
            self.volume,
            self.amount
        )?;

        if let Some((up, down)) = self.up_down {
            write!(f, " 涨:{}/跌:{}", up, down)?;
        }

        Ok(())
    }
}

/// 指数概况中的分时点（原始值）
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IndexMinute {
    pub price: i64,
    pub unknown: i64,
    pub volume: i64,
}

/// 指数概况
#[derive(Debug, Clone, Serialize)]
pub struct IndexInfo {
    pub market: Market,
    pub code: String,
    pub active: u16,
    pub close: Price,
    pub pre_close: Price,
    pub diff: Price,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub server_time: String,
    pub after_hours: i64,
    pub volume: i64,
    pub cur_volume: i64,
    pub amount: f32,
    pub open_amount: i64,
    pub up_count: i64,
    pub down_count: i64,
    pub reserved: Vec<i64>,
    pub minutes: Vec<IndexMinute>,
}

/// 指数分时图数据点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub price: i64,
    pub fast: i64,
    pub amount: i64,
}

/// 价格档位
#[derive(Clone, Copy, Serialize)]
pub struct PriceLevel {
    pub price: Price,
    pub volume: i64,
}

impl fmt::Debug for PriceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}x{}", self.price.to_yuan(), self.volume)
    }
}

/// 行情列表特有的扩展字段
#[derive(Debug, Clone, Serialize)]
pub struct QuoteListExtra {
    pub short_turnover: i16,
    pub min2_amount: f32,
    pub opening_rush: i16,
    pub vol_rise_speed: f32,
    pub depth: f32,
}

/// 行情快照
///
/// 五档明细接口与行情列表接口共用此结构：前者 `bids`/`asks` 各 5 档，
/// 后者各 1 档并带有 `extra`。
#[derive(Clone, Serialize)]
pub struct QuoteSnapshot {
    pub market: Market,
    pub code: String,
    pub active1: u16,
    pub price: Price,
    pub pre_close: Price,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub server_time: String,
    pub after_hours: i64,
    pub volume: i64,
    pub cur_volume: i64,
    pub amount: f32,
    pub inside_volume: i64,  // 内盘
    pub outside_volume: i64, // 外盘
    pub s_amount: i64,
    pub open_amount: i64,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub flags: u16,
    pub rise_speed: i16,
    pub active2: u16,
    pub reserved: Vec<u8>,
    pub extra: Option<QuoteListExtra>,
}

impl fmt::Debug for QuoteSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let change = self.price.to_yuan() - self.pre_close.to_yuan();
        let change_pct = if self.pre_close.0 != 0 {
            change / self.pre_close.to_yuan() * 100.0
        } else {
            0.0
        };

        write!(
            f,
            "{}{} 现价:{:.2} 涨跌:{:+.2}({:+.2}%) 量:{}手 额:{:.0}万",
            self.market.as_str(),
            self.code,
            self.price.to_yuan(),
            change,
            change_pct,
            self.volume,
            self.amount / 10000.0
        )?;

        write!(
            f,
            " 开:{:.2} 高:{:.2} 低:{:.2} 昨收:{:.2} 内盘:{} 外盘:{}",
            self.open.to_yuan(),
            self.high.to_yuan(),
            self.low.to_yuan(),
            self.pre_close.to_yuan(),
            self.inside_volume,
            self.outside_volume
        )?;

        if let (Some(bid), Some(ask)) = (self.bids.first(), self.asks.first()) {
            write!(f, " 买1:{:?} 卖1:{:?}", bid, ask)?;
        }

        if !self.server_time.is_empty() {
            write!(f, " 服务器:{}", self.server_time)?;
        }

        Ok(())
    }
}

/// 排行榜记录
#[derive(Debug, Clone, Serialize)]
pub struct BoardEntry {
    pub market: Market,
    pub code: String,
    pub price: f32,
    pub value: f32,
}

/// 排行榜（9个固定分类，按协议顺序）
#[derive(Debug, Clone, Default, Serialize)]
pub struct TopBoard {
    pub increase: Vec<BoardEntry>,
    pub decrease: Vec<BoardEntry>,
    pub amplitude: Vec<BoardEntry>,
    pub rise_speed: Vec<BoardEntry>,
    pub fall_speed: Vec<BoardEntry>,
    pub vol_ratio: Vec<BoardEntry>,
    pub pos_commission_ratio: Vec<BoardEntry>,
    pub neg_commission_ratio: Vec<BoardEntry>,
    pub turnover: Vec<BoardEntry>,
}

impl TopBoard {
    /// 分类名称，与响应中的顺序一致
    pub const CATEGORIES: [&'static str; 9] = [
        "涨幅", "跌幅", "振幅", "涨速", "跌速", "量比", "委比正序", "委比倒序", "换手",
    ];

    pub(crate) fn category_mut(&mut self, index: usize) -> Option<&mut Vec<BoardEntry>> {
        Some(match index {
            0 => &mut self.increase,
            1 => &mut self.decrease,
            2 => &mut self.amplitude,
            3 => &mut self.rise_speed,
            4 => &mut self.fall_speed,
            5 => &mut self.vol_ratio,
            6 => &mut self.pos_commission_ratio,
            7 => &mut self.neg_commission_ratio,
            8 => &mut self.turnover,
            _ => return None,
        })
    }

    /// 按协议顺序遍历各分类
    pub fn categories(&self) -> [(&'static str, &[BoardEntry]); 9] {
        [
            (Self::CATEGORIES[0], &self.increase),
            (Self::CATEGORIES[1], &self.decrease),
            (Self::CATEGORIES[2], &self.amplitude),
            (Self::CATEGORIES[3], &self.rise_speed),
            (Self::CATEGORIES[4], &self.fall_speed),
            (Self::CATEGORIES[5], &self.vol_ratio),
            (Self::CATEGORIES[6], &self.pos_commission_ratio),
            (Self::CATEGORIES[7], &self.neg_commission_ratio),
            (Self::CATEGORIES[8], &self.turnover),
        ]
    }
}

/// 异动事件
#[derive(Clone, Serialize)]
pub struct UnusualEvent {
    pub index: u16,
    pub market: Market,
    pub code: String,
    pub time: String,
    pub kind: u8,
    pub desc: String,
    pub value: String,
}

impl fmt::Debug for UnusualEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {}{} {} {}",
            self.index,
            self.time,
            self.market.as_str(),
            self.code,
            self.desc,
            self.value
        )
    }
}

/// 成交方向
#[derive(Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TradeAction {
    Buy,
    Sell,
    Neutral,
}

impl TradeAction {
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            0 => TradeAction::Buy,
            1 => TradeAction::Sell,
            _ => TradeAction::Neutral,
        }
    }
}

impl fmt::Debug for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "买"),
            TradeAction::Sell => write!(f, "卖"),
            TradeAction::Neutral => write!(f, "中"),
        }
    }
}

/// 分笔成交
#[derive(Clone, Serialize)]
pub struct Transaction {
    pub time: String,        // HH:MM
    pub price: Price,
    pub volume: i64,         // 成交量（手）
    pub trans: Option<i64>,  // 笔数（历史数据无此字段）
    pub action: TradeAction,
    pub unknown: i64,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.2} {}手 {:?}",
            self.time,
            self.price.to_yuan(),
            self.volume,
            self.action
        )?;
        if let Some(trans) = self.trans {
            write!(f, " 笔数:{}", trans)?;
        }
        Ok(())
    }
}

/// 历史委托分布中的价位
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OrderLevel {
    pub price: Price,
    pub unknown: i64,
    pub volume: i64,
}

/// 历史委托分布
#[derive(Debug, Clone, Serialize)]
pub struct HistoryOrders {
    pub pre_close: f32,
    pub levels: Vec<OrderLevel>,
}

/// 分时抽样价格
#[derive(Debug, Clone, Serialize)]
pub struct ChartSampling {
    pub market: Market,
    pub code: String,
    pub pre_close: f32,
    pub prices: Vec<f32>,
}

/// 文件元信息
#[derive(Debug, Clone, Serialize)]
pub struct FileMeta {
    pub size: u32,
    pub hash: String,
    pub reserved: [u8; 2],
}

/// 文件数据块
#[derive(Clone, Serialize)]
pub struct FileChunk {
    pub size: u32,
    pub data: Vec<u8>,
}

impl fmt::Debug for FileChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "数据块({}字节)", self.size)
    }
}

/// 扩展行情登录返回的服务器信息
#[derive(Debug, Clone, Serialize)]
pub struct ExLoginInfo {
    pub datetime: Option<NaiveDateTime>,
    pub server_name: String,
    pub desc: String,
    pub ip: String,
    pub reserved: Vec<f64>,
}

/// 扩展行情服务器信息
#[derive(Debug, Clone, Serialize)]
pub struct ExServerInfo {
    pub delay: u32,
    pub info: String,
    pub version: String,
    pub time_now: Option<NaiveDateTime>,
    pub server_sign: String,
    pub name: String,
    pub server_sign2: String,
}

/// 期货分类
#[derive(Debug, Clone, Serialize)]
pub struct FuturesCategory {
    pub market: u8,
    pub name: String,
    pub code: u8,
    pub abbr: String,
}

/// 期货合约
#[derive(Debug, Clone, Serialize)]
pub struct FuturesInstrument {
    pub market: u8,
    pub category: u8,
    pub code: String,
    pub name: String,
    pub reserved: Vec<f64>,
}

/// 期货档位
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FuturesLevel {
    pub price: f32,
    pub volume: u32,
}

/// 期货行情快照
#[derive(Debug, Clone, Serialize)]
pub struct FuturesQuote {
    pub category: u8,
    pub code: String,
    pub active: u32,
    pub pre_close: f32,
    pub open: f32,
    pub high: f32,
    pub low: f32,
    pub price: f32,
    pub open_position: u32,
    pub add_position: u32,
    pub volume: u32,
    pub cur_volume: u32,
    pub amount: f32,
    pub inside_volume: u32,
    pub outside_volume: u32,
    pub hold_position: u32,
    pub bids: Vec<FuturesLevel>,
    pub asks: Vec<FuturesLevel>,
    pub settlement: f32,
    pub average: f32,
    pub pre_settlement: f32,
    pub pre_close_price: f32,
    pub pre_volume: f32,
    pub day3_raise: f32,
    pub settlement2: f32,
    pub date: u32,
    pub raise_speed: f32,
}

/// 期货代码列表分页
#[derive(Debug, Clone, Serialize)]
pub struct FuturesListPage {
    pub start: u32,
    pub count: u32,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_units() {
        assert_eq!(Price::from_fen(1234), Some(Price(12340)));
        assert_eq!(Price::from_fen(i64::MAX / 5), None);
        assert_eq!(Price::from_yuan(12.34), Price(12340));
        assert_eq!(format!("{}", Price(12340)), "12.340元");
        assert_eq!(Price(1000).checked_add(Price(-250)), Some(Price(750)));
        assert_eq!(Price(i64::MAX).checked_add(Price(1)), None);
    }

    #[test]
    fn trade_action_from_raw() {
        assert_eq!(TradeAction::from_raw(0), TradeAction::Buy);
        assert_eq!(TradeAction::from_raw(1), TradeAction::Sell);
        assert_eq!(TradeAction::from_raw(2), TradeAction::Neutral);
        assert_eq!(TradeAction::from_raw(-1), TradeAction::Neutral);
    }

    #[test]
    fn board_categories_in_order() {
        let mut board = TopBoard::default();
        for i in 0..9 {
            board.category_mut(i).unwrap().push(BoardEntry {
                market: Market::SH,
                code: format!("{:06}", i),
                price: 0.0,
                value: i as f32,
            });
        }
        assert!(board.category_mut(9).is_none());

        for (i, (name, entries)) in board.categories().iter().enumerate() {
            assert_eq!(*name, TopBoard::CATEGORIES[i]);
            assert_eq!(entries[0].value, i as f32);
        }
    }
}
