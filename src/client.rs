//! TDX 客户端实现（异步）

use crate::config::with_port;
use crate::paging::{self, PageError};
use crate::protocol::constants::{
    DEFAULT_PORT, FILE_CHUNK_SIZE, MAX_HISTORY_TRANSACTION_COUNT, MAX_KLINE_COUNT,
    MAX_LIST_COUNT, MAX_QUOTE_COUNT, MAX_TRANSACTION_COUNT, MAX_UNUSUAL_COUNT,
};
use crate::protocol::frame::{
    self, FrameError, MessageDefinition, ResponseFrame, ResponseHeader, RESPONSE_HEADER_LEN,
};
use crate::protocol::messages::*;
use crate::protocol::types::*;
use crate::protocol::{BlockFileType, Category, Market, Period};
use chrono::{NaiveDate, Utc};
use log::{debug, info, warn};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;

/// 客户端错误
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("IO错误: {0}")]
    Io(#[from] io::Error),
    #[error("协议错误: {0}")]
    Frame(#[from] FrameError),
    #[error("消息错误: {0}")]
    Message(#[from] MessageError),
    #[error("超时")]
    Timeout,
    #[error("连接已关闭")]
    Disconnected,
    /// 分页拉取中某一页失败，已拉取的部分被丢弃
    #[error("分页请求失败: 操作码 0x{opcode:04X}, 偏移 {offset}: {source}")]
    Page {
        opcode: u16,
        offset: u32,
        source: Box<ClientError>,
    },
    #[error("其他错误: {0}")]
    Other(String),
}

impl ClientError {
    /// 传输层错误，换个连接或稍后重试可能成功
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Io(_) | ClientError::Timeout | ClientError::Disconnected => true,
            ClientError::Page { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    fn page(def: &MessageDefinition, err: PageError<ClientError>) -> Self {
        ClientError::Page {
            opcode: def.opcode,
            offset: err.offset,
            source: Box::new(err.source),
        }
    }
}

fn read_error(e: io::Error) -> ClientError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        ClientError::Disconnected
    } else {
        ClientError::Io(e)
    }
}

fn to_u16(value: u32, what: &str) -> Result<u16, ClientError> {
    u16::try_from(value)
        .map_err(|_| MessageError::InvalidArgument(format!("{}超出范围: {}", what, value)).into())
}

/// 北京时间的今天
fn beijing_today() -> NaiveDate {
    (Utc::now() + chrono::Duration::hours(8)).date_naive()
}

/// 请求/响应传输
///
/// 负责封帧、发送、接收对应的响应帧并解压，返回响应数据。
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn call(&self, def: &MessageDefinition, payload: &[u8]) -> Result<Vec<u8>, ClientError>;
}

/// 单条 TCP 连接，请求与响应在锁内成对进行
pub struct Connection {
    stream: Mutex<TcpStream>,
    addr: String,
    timeout: Duration,
}

impl Connection {
    /// 连接到指定地址，未指定端口时使用 7709
    pub async fn connect(addr: &str, timeout: Duration) -> Result<Self, ClientError> {
        let addr = with_port(addr, DEFAULT_PORT);
        let stream = time::timeout(timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| ClientError::Timeout)??;
        stream.set_nodelay(true)?;
        info!("已连接 {}", addr);

        Ok(Self {
            stream: Mutex::new(stream),
            addr,
            timeout,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// 设置超时时间
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    async fn read_response_locked(
        &self,
        stream: &mut TcpStream,
    ) -> Result<ResponseFrame, ClientError> {
        let fut = async {
            let mut header = [0u8; RESPONSE_HEADER_LEN];
            stream.read_exact(&mut header).await.map_err(read_error)?;
            let header = ResponseHeader::parse(&header)?;

            let mut body = vec![0u8; header.zip_length as usize];
            stream.read_exact(&mut body).await.map_err(read_error)?;

            debug!(
                "接收响应: 类型=0x{:04X}, 压缩长度={}, 长度={}",
                header.msg_id, header.zip_length, header.length
            );

            Ok::<_, ClientError>(ResponseFrame::from_parts(header, body)?)
        };

        match time::timeout(self.timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(ClientError::Timeout),
        }
    }
}

impl Transport for Connection {
    async fn call(&self, def: &MessageDefinition, payload: &[u8]) -> Result<Vec<u8>, ClientError> {
        let data = frame::encode(def, payload)?;
        let mut stream = self.stream.lock().await;

        debug!("发送请求帧 {} ({} 字节): {:02X?}", def.name, data.len(), data);
        stream.write_all(&data).await?;
        stream.flush().await?;

        let response = self.read_response_locked(&mut stream).await?;
        if response.header.msg_id != def.opcode {
            return Err(FrameError::UnexpectedMessageType {
                expected: def.opcode,
                actual: response.header.msg_id,
            }
            .into());
        }

        Ok(response.into_data())
    }
}

/// TDX 客户端（异步）
pub struct Client<T = Connection> {
    transport: T,
}

impl Client<Connection> {
    /// 连接并登录行情服务
    pub async fn connect(addr: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = Self::new(Connection::connect(addr, timeout).await?);
        client.login().await?;
        Ok(client)
    }

    /// 启动后台心跳，客户端被释放或心跳失败后任务结束
    pub fn spawn_heartbeat(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let client = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(client) = client.upgrade() else {
                    break;
                };
                if let Err(e) = client.send_heartbeat().await {
                    warn!("心跳失败 {}: {}", client.transport.addr(), e);
                    break;
                }
            }
        })
    }
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// 发送一个请求并解码响应
    pub async fn call<M: Message>(&self, req: M::Request) -> Result<M::Response, ClientError> {
        let def = M::definition(&req);
        let payload = M::encode(&req)?;
        let data = self.transport.call(&def, &payload).await?;
        Ok(M::decode(&req, &data)?)
    }

    // ==================== 会话 ====================

    /// 登录行情服务，返回服务器信息
    pub async fn login(&self) -> Result<String, ClientError> {
        let banner = self.call::<Connect>(()).await?;
        info!("行情服务登录成功: {}", banner.trim());
        Ok(banner)
    }

    /// 登录扩展行情服务
    pub async fn ex_login(&self) -> Result<ExLoginInfo, ClientError> {
        let info = self.call::<ExLogin>(()).await?;
        info!("扩展行情登录成功: {} {}", info.server_name, info.ip);
        Ok(info)
    }

    /// 发送心跳
    pub async fn send_heartbeat(&self) -> Result<(), ClientError> {
        self.call::<Heartbeat>(()).await
    }

    // ==================== 证券列表 ====================

    /// 获取证券数量（以北京时间当天为准）
    pub async fn get_security_count(&self, market: Market) -> Result<u16, ClientError> {
        self.call::<SecurityCount>(SecurityCountRequest {
            market,
            date: beijing_today(),
        })
        .await
    }

    /// 获取证券列表（单次最多1600条）
    pub async fn get_security_list_page(
        &self,
        market: Market,
        start: u32,
        count: u32,
    ) -> Result<Vec<SecurityInfo>, ClientError> {
        self.call::<SecurityList>(SecurityListRequest {
            market,
            start,
            count,
            variant: SecurityListVariant::Full,
        })
        .await
    }

    /// 获取证券列表（旧版29字节记录，服务器决定返回数量）
    pub async fn get_security_list_b(
        &self,
        market: Market,
        start: u16,
    ) -> Result<Vec<SecurityInfo>, ClientError> {
        self.call::<SecurityList>(SecurityListRequest {
            market,
            start: start as u32,
            count: 0,
            variant: SecurityListVariant::Compact,
        })
        .await
    }

    /// 获取证券列表，超过单页上限时自动分页
    pub async fn get_security_list(
        &self,
        market: Market,
        start: u32,
        count: u32,
    ) -> Result<Vec<SecurityInfo>, ClientError> {
        paging::forward_exhaust(start, count, MAX_LIST_COUNT, |start, count| {
            self.get_security_list_page(market, start, count)
        })
        .await
        .map_err(|e| ClientError::page(&registry::SECURITY_LIST, e))
    }

    // ==================== 指数 ====================

    /// 获取指数概况
    pub async fn get_index_info(&self, market: Market, code: &str) -> Result<IndexInfo, ClientError> {
        self.call::<IndexInfoMsg>(SecurityRequest::new(market, code))
            .await
    }

    /// 获取指数分时图
    pub async fn get_index_chart(
        &self,
        market: Market,
        code: &str,
    ) -> Result<Vec<ChartPoint>, ClientError> {
        self.call::<IndexChart>(IndexChartRequest::new(market, code))
            .await
    }

    /// 获取分时抽样价格
    pub async fn get_chart_sampling(
        &self,
        market: Market,
        code: &str,
    ) -> Result<ChartSampling, ClientError> {
        self.call::<ChartSamplingMsg>(SecurityRequest::new(market, code))
            .await
    }

    // ==================== K线数据 ====================

    /// 获取K线数据（单次最多800条）
    pub async fn get_kline_page(
        &self,
        market: Market,
        code: &str,
        period: Period,
        start: u16,
        count: u16,
    ) -> Result<Vec<KlineBar>, ClientError> {
        self.call::<Kline>(KlineRequest {
            market,
            code: code.to_string(),
            period,
            start,
            count,
            variant: KlineVariant::Standard,
        })
        .await
    }

    /// 按偏移获取K线（0x052D）
    pub async fn get_kline_offset_page(
        &self,
        market: Market,
        code: &str,
        period: Period,
        start: u16,
        count: u16,
    ) -> Result<Vec<KlineBar>, ClientError> {
        self.call::<Kline>(KlineRequest {
            market,
            code: code.to_string(),
            period,
            start,
            count,
            variant: KlineVariant::Offset,
        })
        .await
    }

    /// 获取K线数据，超过800条时向前追溯拼接，结果按时间升序
    pub async fn get_kline(
        &self,
        market: Market,
        code: &str,
        period: Period,
        start: u32,
        count: u32,
    ) -> Result<Vec<KlineBar>, ClientError> {
        paging::backward_prepend(start, Some(count), MAX_KLINE_COUNT, |start, count| async move {
            let start = to_u16(start, "K线偏移")?;
            self.get_kline_page(market, code, period, start, count as u16)
                .await
        })
        .await
        .map_err(|e| ClientError::page(&registry::KLINE, e))
    }

    // ==================== 行情 ====================

    /// 获取五档行情明细
    pub async fn get_quotes_detail(
        &self,
        securities: &[(Market, String)],
    ) -> Result<Vec<QuoteSnapshot>, ClientError> {
        self.call::<QuotesDetail>(securities.to_vec()).await
    }

    /// 获取行情快照
    pub async fn get_quotes(
        &self,
        securities: &[(Market, String)],
    ) -> Result<Vec<QuoteSnapshot>, ClientError> {
        self.call::<Quotes>(securities.to_vec()).await
    }

    /// 按板块获取行情（单次最多80条）
    pub async fn get_quotes_list_page(
        &self,
        category: Category,
        start: u16,
        count: u16,
    ) -> Result<Vec<QuoteSnapshot>, ClientError> {
        self.call::<QuotesList>(QuotesListRequest {
            category,
            start,
            count,
        })
        .await
    }

    /// 按板块获取行情，自动分页
    pub async fn get_quotes_by_category(
        &self,
        category: Category,
        start: u32,
        count: u32,
    ) -> Result<Vec<QuoteSnapshot>, ClientError> {
        paging::forward_exhaust(start, count, MAX_QUOTE_COUNT, |start, count| async move {
            let start = to_u16(start, "行情偏移")?;
            self.get_quotes_list_page(category, start, count as u16)
                .await
        })
        .await
        .map_err(|e| ClientError::page(&registry::QUOTES_LIST, e))
    }

    /// 获取排行榜，每个分类 `size` 条
    pub async fn get_top_board(&self, category: Category, size: u8) -> Result<TopBoard, ClientError> {
        self.call::<TopBoardMsg>(TopBoardRequest { category, size })
            .await
    }

    // ==================== 异动 ====================

    /// 获取异动（单次最多600条）
    pub async fn get_unusual_page(
        &self,
        market: Market,
        start: u32,
        count: u32,
    ) -> Result<Vec<UnusualEvent>, ClientError> {
        self.call::<Unusual>(UnusualRequest {
            market,
            start,
            count,
        })
        .await
    }

    /// 获取异动，`count` 为 0 时获取全部
    pub async fn get_unusual(
        &self,
        market: Market,
        start: u32,
        count: u32,
    ) -> Result<Vec<UnusualEvent>, ClientError> {
        paging::event_stream(start, count, MAX_UNUSUAL_COUNT, |start, count| {
            self.get_unusual_page(market, start, count)
        })
        .await
        .map_err(|e| ClientError::page(&registry::UNUSUAL, e))
    }

    // ==================== 分笔成交 ====================

    /// 获取当日分笔成交（单次最多1800条）
    pub async fn get_transaction_page(
        &self,
        market: Market,
        code: &str,
        start: u16,
        count: u16,
    ) -> Result<Vec<Transaction>, ClientError> {
        self.call::<TransactionMsg>(TransactionRequest {
            market,
            code: code.to_string(),
            start,
            count,
        })
        .await
    }

    /// 获取当日全部分笔成交，按时间升序
    pub async fn get_transaction(
        &self,
        market: Market,
        code: &str,
    ) -> Result<Vec<Transaction>, ClientError> {
        paging::backward_prepend(0, None, MAX_TRANSACTION_COUNT, |start, count| async move {
            let start = to_u16(start, "分笔偏移")?;
            self.get_transaction_page(market, code, start, count as u16)
                .await
        })
        .await
        .map_err(|e| ClientError::page(&registry::TRANSACTION, e))
    }

    /// 获取历史分笔成交（单次最多2000条）
    pub async fn get_history_transaction_page(
        &self,
        market: Market,
        code: &str,
        date: NaiveDate,
        start: u16,
        count: u16,
    ) -> Result<Vec<Transaction>, ClientError> {
        self.call::<HistoryTransaction>(HistoryTransactionRequest {
            market,
            code: code.to_string(),
            date,
            start,
            count,
        })
        .await
    }

    /// 获取某日全部历史分笔成交，按时间升序
    pub async fn get_history_transaction(
        &self,
        market: Market,
        code: &str,
        date: NaiveDate,
    ) -> Result<Vec<Transaction>, ClientError> {
        paging::backward_prepend(
            0,
            None,
            MAX_HISTORY_TRANSACTION_COUNT,
            |start, count| async move {
                let start = to_u16(start, "分笔偏移")?;
                self.get_history_transaction_page(market, code, date, start, count as u16)
                    .await
            },
        )
        .await
        .map_err(|e| ClientError::page(&registry::HISTORY_TRANSACTION, e))
    }

    /// 获取历史委托分布
    pub async fn get_history_orders(
        &self,
        market: Market,
        code: &str,
        date: NaiveDate,
    ) -> Result<HistoryOrders, ClientError> {
        self.call::<HistoryOrdersMsg>(HistoryOrdersRequest {
            market,
            code: code.to_string(),
            date,
        })
        .await
    }

    // ==================== 文件 ====================

    /// 获取文件元信息
    pub async fn get_file_meta(&self, name: &str) -> Result<FileMeta, ClientError> {
        self.call::<FileMetaMsg>(name.to_string()).await
    }

    /// 下载一个数据块
    pub async fn download_chunk(&self, name: &str, start: u32) -> Result<FileChunk, ClientError> {
        self.call::<FileDownload>(FileDownloadRequest::new(name, start))
            .await
    }

    /// 下载文件
    ///
    /// `expected_size` 不清楚时传 0；`progress` 以 `(已下载, expected_size)` 回调。
    pub async fn download_file<P>(
        &self,
        name: &str,
        expected_size: u32,
        progress: P,
    ) -> Result<Vec<u8>, ClientError>
    where
        P: FnMut(u32, u32),
    {
        paging::chunked_download(
            expected_size,
            FILE_CHUNK_SIZE,
            |start, _| async move {
                Ok::<_, ClientError>(self.download_chunk(name, start).await?.data)
            },
            progress,
        )
        .await
        .map_err(|e| ClientError::page(&registry::FILE_DOWNLOAD, e))
    }

    /// 下载板块文件（原始内容）
    pub async fn get_block_file(&self, kind: BlockFileType) -> Result<Vec<u8>, ClientError> {
        let name = kind.file_name();
        let meta = self.get_file_meta(name).await?;
        debug!("板块文件 {}: {} 字节, hash {}", name, meta.size, meta.hash);
        if meta.size == 0 {
            return Ok(Vec::new());
        }
        self.download_file(name, meta.size, |_, _| {}).await
    }

    // ==================== 扩展行情 ====================

    pub async fn get_ex_server_info(&self) -> Result<ExServerInfo, ClientError> {
        self.call::<ExServerInfoMsg>(()).await
    }

    /// 获取期货品种数量，返回 (名称, 数量)
    pub async fn get_futures_count(&self) -> Result<(String, u32), ClientError> {
        self.call::<FuturesCount>(()).await
    }

    pub async fn get_futures_categories(&self) -> Result<Vec<FuturesCategory>, ClientError> {
        self.call::<FuturesCategories>(()).await
    }

    pub async fn get_futures_instruments(
        &self,
        start: u32,
        count: u16,
    ) -> Result<Vec<FuturesInstrument>, ClientError> {
        self.call::<FuturesInstruments>(FuturesInstrumentsRequest { start, count })
            .await
    }

    /// 获取单个期货行情
    pub async fn get_futures_quote(
        &self,
        category: u8,
        code: &str,
    ) -> Result<FuturesQuote, ClientError> {
        self.call::<FuturesQuoteMsg>(FuturesQuoteRequest {
            category,
            code: code.to_string(),
        })
        .await
    }

    /// 按合约列表获取期货行情
    pub async fn get_futures_quotes_list(
        &self,
        futures: &[(u8, String)],
        variant: FuturesQuotesListVariant,
    ) -> Result<Vec<FuturesQuote>, ClientError> {
        self.call::<FuturesQuotesList>(FuturesQuotesListRequest {
            futures: futures.to_vec(),
            variant,
        })
        .await
    }

    /// 按分类获取期货行情
    pub async fn get_futures_quotes_by_category(
        &self,
        category: u8,
        start: u16,
        count: u16,
    ) -> Result<Vec<FuturesQuote>, ClientError> {
        self.call::<FuturesQuotesByCategory>(FuturesQuotesByCategoryRequest {
            category,
            start,
            count,
        })
        .await
    }

    /// 获取期货代码列表文本
    pub async fn get_futures_list(
        &self,
        start: u32,
        variant: FuturesListVariant,
    ) -> Result<FuturesListPage, ClientError> {
        self.call::<FuturesList>(FuturesListRequest { start, variant })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// 按操作码返回预置响应
    struct Scripted {
        responses: StdMutex<Vec<(u16, Result<Vec<u8>, ClientError>)>>,
        sent: StdMutex<Vec<(u16, Vec<u8>)>>,
    }

    impl Scripted {
        fn new(responses: Vec<(u16, Result<Vec<u8>, ClientError>)>) -> Self {
            Self {
                responses: StdMutex::new(responses),
                sent: StdMutex::new(Vec::new()),
            }
        }
    }

    impl Transport for Scripted {
        async fn call(
            &self,
            def: &MessageDefinition,
            payload: &[u8],
        ) -> Result<Vec<u8>, ClientError> {
            self.sent.lock().unwrap().push((def.opcode, payload.to_vec()));
            let mut responses = self.responses.lock().unwrap();
            let pos = responses
                .iter()
                .position(|(op, _)| *op == def.opcode)
                .ok_or(ClientError::Disconnected)?;
            responses.remove(pos).1
        }
    }

    fn unusual_page(n: u16) -> Vec<u8> {
        let mut data = n.to_le_bytes().to_vec();
        for i in 0..n {
            data.extend(0u16.to_le_bytes());
            data.extend(b"000001");
            data.extend([0, 0x05, 0]);
            data.extend(i.to_le_bytes());
            data.extend([0u8; 16]);
            data.push(10);
            data.extend(0u16.to_le_bytes());
        }
        data
    }

    #[tokio::test]
    async fn page_failure_is_typed() {
        let client = Client::new(Scripted::new(vec![
            (0x0563, Ok(unusual_page(600))),
            (0x0563, Err(ClientError::Timeout)),
        ]));

        let err = client.get_unusual(Market::SZ, 0, 0).await.unwrap_err();
        match &err {
            ClientError::Page {
                opcode,
                offset,
                source,
            } => {
                assert_eq!(*opcode, 0x0563);
                assert_eq!(*offset, 600);
                assert!(matches!(**source, ClientError::Timeout));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn unusual_all_until_empty() {
        let client = Client::new(Scripted::new(vec![
            (0x0563, Ok(unusual_page(600))),
            (0x0563, Ok(unusual_page(3))),
            (0x0563, Ok(unusual_page(0))),
        ]));

        let events = client.get_unusual(Market::SZ, 0, 0).await.unwrap();
        assert_eq!(events.len(), 603);
        assert_eq!(events[0].desc, "加速下跌");
        assert_eq!(events[602].time, "10:00:00");

        let sent = client.transport().sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1].1[2..6], 600u32.to_le_bytes());
    }

    #[tokio::test]
    async fn decode_error_is_not_retryable() {
        let client = Client::new(Scripted::new(vec![(0x044E, Ok(vec![1]))]));
        let err = client.get_security_count(Market::SH).await.unwrap_err();
        assert!(matches!(err, ClientError::Message(MessageError::TruncatedValue { .. })));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn block_file_uses_meta_size() {
        let mut meta = 5u32.to_le_bytes().to_vec();
        meta.push(0);
        meta.extend([b'0'; 32]);
        meta.push(0);

        let mut chunk = 5u32.to_le_bytes().to_vec();
        chunk.extend(b"hello");

        let client = Client::new(Scripted::new(vec![(0x02C5, Ok(meta)), (0x06B9, Ok(chunk))]));
        let content = client.get_block_file(BlockFileType::Concept).await.unwrap();
        assert_eq!(content, b"hello");

        let sent = client.transport().sent.lock().unwrap();
        assert_eq!(&sent[0].1[..12], b"block_gn.dat");
        assert_eq!(sent.len(), 2);
    }

    #[test]
    fn kline_offset_out_of_range() {
        assert!(to_u16(70_000, "K线偏移").is_err());
        assert_eq!(to_u16(800, "K线偏移").unwrap(), 800);
    }
}
