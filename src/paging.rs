//! 分页拉取
//!
//! 服务器单次返回的记录数有上限，这里把多次单页请求拼成完整结果。
//! 页与页之间严格顺序执行；任意一页失败即返回错误，已拉取的部分丢弃，不做重试。

use log::{debug, warn};
use std::error::Error;
use std::fmt;
use std::future::Future;

/// 某一页请求失败
#[derive(Debug)]
pub struct PageError<E> {
    /// 失败页的起始偏移，可据此续传
    pub offset: u32,
    pub source: E,
}

impl<E: fmt::Display> fmt::Display for PageError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "偏移 {} 处的分页请求失败: {}", self.offset, self.source)
    }
}

impl<E: Error + 'static> Error for PageError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

async fn fetch_page<R, E, F, Fut>(
    fetch: &mut F,
    offset: u32,
    size: u32,
) -> Result<Vec<R>, PageError<E>>
where
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = Result<Vec<R>, E>>,
{
    let page = fetch(offset, size)
        .await
        .map_err(|source| PageError { offset, source })?;
    debug!("分页: 偏移 {} 请求 {} 条, 返回 {} 条", offset, size, page.len());
    Ok(page)
}

/// 向后顺序拉取：从 `start` 开始共取 `count` 条，每页最多 `page_max` 条
///
/// 以实际返回的条数推进偏移；某页为空视为数据已取完。
pub async fn forward_exhaust<R, E, F, Fut>(
    start: u32,
    count: u32,
    page_max: u32,
    mut fetch: F,
) -> Result<Vec<R>, PageError<E>>
where
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = Result<Vec<R>, E>>,
{
    let mut records = Vec::new();
    let mut offset = start;
    let mut remaining = count;

    while remaining > 0 {
        let page = fetch_page(&mut fetch, offset, remaining.min(page_max)).await?;
        if page.is_empty() {
            break;
        }

        let n = page.len() as u32;
        offset = offset.saturating_add(n);
        remaining = remaining.saturating_sub(n);
        records.extend(page);
    }

    Ok(records)
}

/// 向前追溯拉取（K线、分笔）
///
/// 服务器按 `start` 返回距今第 `start` 条之前的最近一页，页内按时间升序。
/// 每页插到已有结果之前，因此最终结果整体按时间升序。
/// `limit` 为 `None` 时一直取到没有更多历史数据；返回条数少于请求数或为空即停止。
pub async fn backward_prepend<R, E, F, Fut>(
    start: u32,
    limit: Option<u32>,
    page_max: u32,
    mut fetch: F,
) -> Result<Vec<R>, PageError<E>>
where
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = Result<Vec<R>, E>>,
{
    let mut records: Vec<R> = Vec::new();
    let mut fetched = 0u32;

    loop {
        let size = match limit {
            Some(limit) if fetched >= limit => break,
            Some(limit) => (limit - fetched).min(page_max),
            None => page_max,
        };

        let mut page = fetch_page(&mut fetch, start.saturating_add(fetched), size).await?;
        let n = page.len() as u32;
        if n == 0 {
            break;
        }

        page.append(&mut records);
        records = page;
        fetched = fetched.saturating_add(n);

        if n < size {
            break;
        }
    }

    Ok(records)
}

/// 连续空数据块的容忍次数，超过即认为传输结束
const MAX_EMPTY_CHUNKS: u32 = 2;

/// 分块下载文件
///
/// `expected` 为 0 表示大小未知，遇到第一个空块即结束；否则下载到 `expected` 字节为止，
/// 中途的空块最多容忍连续 2 次。`progress` 在每收到一块数据后以 `(已下载, expected)` 调用。
pub async fn chunked_download<E, F, Fut, P>(
    expected: u32,
    chunk: u32,
    mut fetch: F,
    mut progress: P,
) -> Result<Vec<u8>, PageError<E>>
where
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = Result<Vec<u8>, E>>,
    P: FnMut(u32, u32),
{
    let mut content = Vec::with_capacity(expected as usize);
    let mut offset = 0u32;
    let mut empty = 0u32;

    while expected == 0 || offset < expected {
        let data = fetch_page(&mut fetch, offset, chunk).await?;

        if data.is_empty() {
            if expected == 0 {
                break;
            }
            empty += 1;
            warn!("下载返回空数据块: 偏移 {}/{}, 连续第 {} 次", offset, expected, empty);
            if empty > MAX_EMPTY_CHUNKS {
                break;
            }
            continue;
        }

        empty = 0;
        offset = offset.saturating_add(data.len() as u32);
        content.extend_from_slice(&data);
        progress(offset, expected);
    }

    Ok(content)
}

/// 事件流拉取（异动）
///
/// `total` 为 0 表示取全部，直到返回空页；否则最多取 `total` 条。
/// 凑满 `total` 的那一页若是满页，再多取一页确认数据已取完，结果仍截断到 `total`。
pub async fn event_stream<R, E, F, Fut>(
    start: u32,
    total: u32,
    page_max: u32,
    mut fetch: F,
) -> Result<Vec<R>, PageError<E>>
where
    F: FnMut(u32, u32) -> Fut,
    Fut: Future<Output = Result<Vec<R>, E>>,
{
    let mut events = Vec::new();
    let mut offset = start;
    let mut last_full = false;

    loop {
        let fetched = events.len() as u32;
        let confirming = total > 0 && fetched >= total;
        if confirming && !last_full {
            break;
        }
        let size = if total == 0 || confirming {
            page_max
        } else {
            (total - fetched).min(page_max)
        };

        let page = fetch_page(&mut fetch, offset, size).await?;
        if page.is_empty() {
            break;
        }

        let n = page.len() as u32;
        last_full = n >= size;
        offset = offset.saturating_add(n);
        events.extend(page);

        if confirming {
            break;
        }
    }

    if total > 0 {
        events.truncate(total as usize);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    type Calls = RefCell<Vec<(u32, u32)>>;

    /// 模拟一个共 `total` 条记录的序列，记录值即其序号（0 为最早）
    fn history(total: u32, calls: &Calls, offset: u32, size: u32) -> Vec<u32> {
        calls.borrow_mut().push((offset, size));
        let end = total.saturating_sub(offset);
        let begin = end.saturating_sub(size);
        (begin..end).collect()
    }

    #[tokio::test]
    async fn backward_pages_are_prepended() {
        let calls = Calls::default();
        let bars = backward_prepend(0, None, 800, |offset, size| {
            let page = history(2000, &calls, offset, size);
            async move { Ok::<_, ()>(page) }
        })
        .await
        .unwrap();

        // P1 = 1200..2000, P2 = 400..1200, P3 = 0..400
        assert_eq!(bars, (0..2000).collect::<Vec<_>>());
        assert_eq!(*calls.borrow(), vec![(0, 800), (800, 800), (1600, 800)]);
    }

    #[tokio::test]
    async fn backward_respects_limit() {
        let calls = Calls::default();
        let bars = backward_prepend(100, Some(1000), 800, |offset, size| {
            let page = history(5000, &calls, offset, size);
            async move { Ok::<_, ()>(page) }
        })
        .await
        .unwrap();

        assert_eq!(bars.len(), 1000);
        assert_eq!(bars[0], 3900);
        assert_eq!(*bars.last().unwrap(), 4899);
        assert_eq!(*calls.borrow(), vec![(100, 800), (900, 200)]);
    }

    #[tokio::test]
    async fn forward_single_and_double_page() {
        let calls = Calls::default();
        let fetch = |offset: u32, size: u32| {
            calls.borrow_mut().push((offset, size));
            let page: Vec<u32> = (offset..(offset + size).min(3000)).collect();
            async move { Ok::<_, ()>(page) }
        };

        let list = forward_exhaust(0, 1600, 1600, fetch).await.unwrap();
        assert_eq!(list.len(), 1600);
        assert_eq!(*calls.borrow(), vec![(0, 1600)]);

        calls.borrow_mut().clear();
        let fetch = |offset: u32, size: u32| {
            calls.borrow_mut().push((offset, size));
            let page: Vec<u32> = (offset..(offset + size).min(3000)).collect();
            async move { Ok::<_, ()>(page) }
        };
        let list = forward_exhaust(0, 2500, 1600, fetch).await.unwrap();
        assert_eq!(list.len(), 2500);
        assert_eq!(*calls.borrow(), vec![(0, 1600), (1600, 900)]);
    }

    #[tokio::test]
    async fn forward_advances_by_actual_page_length() {
        let calls = Calls::default();
        let list = forward_exhaust(0, 2500, 1600, |offset, size| {
            calls.borrow_mut().push((offset, size));
            // 服务器每页最多给 1000 条，共 1800 条
            let page: Vec<u32> = (offset..(offset + size.min(1000)).min(1800)).collect();
            async move { Ok::<_, ()>(page) }
        })
        .await
        .unwrap();

        assert_eq!(list.len(), 1800);
        assert_eq!(*calls.borrow(), vec![(0, 1600), (1000, 1500), (1800, 700)]);
    }

    #[tokio::test]
    async fn page_error_carries_offset() {
        let err = forward_exhaust(0, 3000, 1600, |offset, _| async move {
            if offset == 0 {
                Ok(vec![0u8; 1600])
            } else {
                Err("断开")
            }
        })
        .await
        .unwrap_err();

        assert_eq!(err.offset, 1600);
        assert_eq!(err.source, "断开");
    }

    #[tokio::test]
    async fn download_unknown_size_stops_on_first_empty() {
        let calls = Calls::default();
        let content = chunked_download(
            0,
            4,
            |offset, size| {
                calls.borrow_mut().push((offset, size));
                let data = if offset < 6 { vec![1u8; 3] } else { Vec::new() };
                async move { Ok::<_, ()>(data) }
            },
            |_, _| {},
        )
        .await
        .unwrap();

        assert_eq!(content.len(), 6);
        assert_eq!(calls.borrow().len(), 3);
    }

    #[tokio::test]
    async fn download_stops_at_expected_size() {
        let calls = Calls::default();
        let mut reports = Vec::new();
        let content = chunked_download(
            100,
            0x7530,
            |offset, size| {
                calls.borrow_mut().push((offset, size));
                let data = if offset == 0 { vec![1u8; 60] } else { vec![2u8; 40] };
                async move { Ok::<_, ()>(data) }
            },
            |done, total| reports.push((done, total)),
        )
        .await
        .unwrap();

        assert_eq!(content.len(), 100);
        assert_eq!(content[60], 2);
        assert_eq!(*calls.borrow(), vec![(0, 0x7530), (60, 0x7530)]);
        assert_eq!(reports, vec![(60, 100), (100, 100)]);
    }

    #[tokio::test]
    async fn download_tolerates_two_empty_chunks() {
        let calls = Calls::default();
        let content = chunked_download(
            100,
            50,
            |offset, size| {
                calls.borrow_mut().push((offset, size));
                let n = calls.borrow().len();
                // 第 2、3 次为空，第 4 次恢复，之后一直为空
                let data = match n {
                    1 => vec![1u8; 30],
                    4 => vec![2u8; 30],
                    _ => Vec::new(),
                };
                async move { Ok::<_, ()>(data) }
            },
            |_, _| {},
        )
        .await
        .unwrap();

        assert_eq!(content.len(), 60);
        assert_eq!(calls.borrow().len(), 7);
    }

    #[tokio::test]
    async fn events_all_until_empty_page() {
        let calls = Calls::default();
        let events = event_stream(0, 0, 600, |offset, size| {
            calls.borrow_mut().push((offset, size));
            let page: Vec<u32> = (offset..(offset + size).min(1000)).collect();
            async move { Ok::<_, ()>(page) }
        })
        .await
        .unwrap();

        assert_eq!(events.len(), 1000);
        assert_eq!(*calls.borrow(), vec![(0, 600), (600, 600), (1000, 600)]);
    }

    #[tokio::test]
    async fn events_bounded_total() {
        let calls = Calls::default();
        let events = event_stream(10, 700, 600, |offset, size| {
            calls.borrow_mut().push((offset, size));
            let page: Vec<u32> = (offset..offset + size).collect();
            async move { Ok::<_, ()>(page) }
        })
        .await
        .unwrap();

        assert_eq!(events.len(), 700);
        assert_eq!(events[0], 10);
        assert_eq!(*events.last().unwrap(), 709);
        // 最后一页为满页，多取一页确认
        assert_eq!(*calls.borrow(), vec![(10, 600), (610, 100), (710, 600)]);
    }

    #[tokio::test]
    async fn events_full_page_at_total_is_confirmed() {
        let calls = Calls::default();
        let events = event_stream(0, 600, 600, |offset, size| {
            calls.borrow_mut().push((offset, size));
            let page: Vec<u32> = (offset..(offset + size).min(5000)).collect();
            async move { Ok::<_, ()>(page) }
        })
        .await
        .unwrap();

        assert_eq!(events, (0..600).collect::<Vec<_>>());
        assert_eq!(*calls.borrow(), vec![(0, 600), (600, 600)]);
    }

    #[tokio::test]
    async fn events_confirmation_finds_exhausted_source() {
        let calls = Calls::default();
        let events = event_stream(0, 600, 600, |offset, size| {
            calls.borrow_mut().push((offset, size));
            let page: Vec<u32> = (offset..(offset + size).min(600)).collect();
            async move { Ok::<_, ()>(page) }
        })
        .await
        .unwrap();

        assert_eq!(events.len(), 600);
        assert_eq!(*calls.borrow(), vec![(0, 600), (600, 600)]);
    }

    #[tokio::test]
    async fn offsets_saturate_near_u32_max() {
        let calls = Calls::default();
        let list = forward_exhaust(u32::MAX - 10, 30, 20, |offset, size| {
            calls.borrow_mut().push((offset, size));
            let page = vec![0u8; size.min(20) as usize];
            async move { Ok::<_, ()>(page) }
        })
        .await
        .unwrap();

        assert_eq!(list.len(), 30);
        assert_eq!(*calls.borrow(), vec![(u32::MAX - 10, 20), (u32::MAX, 10)]);
    }
}
