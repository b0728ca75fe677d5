use super::{registry, Message, MessageError};
use crate::protocol::codec::{fixed_bytes, utf8_to_gbk, Reader};
use crate::protocol::constants::FILE_CHUNK_SIZE;
use crate::protocol::frame::MessageDefinition;
use crate::protocol::types::{FileChunk, FileMeta};
use bytes::{BufMut, BytesMut};

fn encode_name(name: &str, len: usize) -> Result<Vec<u8>, MessageError> {
    let bytes = utf8_to_gbk(name);
    if bytes.is_empty() || bytes.len() > len {
        return Err(MessageError::InvalidArgument(format!("文件名长度无效: {}", name)));
    }
    Ok(fixed_bytes(&bytes, len))
}

/// 文件元信息
pub struct FileMetaMsg;

impl Message for FileMetaMsg {
    type Request = String;
    type Response = FileMeta;

    fn definition(_: &String) -> MessageDefinition {
        registry::FILE_META
    }

    fn encode(name: &String) -> Result<Vec<u8>, MessageError> {
        encode_name(name, 40)
    }

    fn decode(_: &String, data: &[u8]) -> Result<FileMeta, MessageError> {
        let mut reader = Reader::new(data);
        let size = reader.u32()?;
        let first = reader.u8()?;
        let hash = reader.text(32)?;
        let last = reader.u8()?;
        Ok(FileMeta {
            size,
            hash,
            reserved: [first, last],
        })
    }
}

/// 文件分块下载
pub struct FileDownload;

#[derive(Debug, Clone)]
pub struct FileDownloadRequest {
    pub name: String,
    pub start: u32,
    pub size: u32,
}

impl FileDownloadRequest {
    pub fn new(name: impl Into<String>, start: u32) -> Self {
        Self {
            name: name.into(),
            start,
            size: FILE_CHUNK_SIZE,
        }
    }
}

impl Message for FileDownload {
    type Request = FileDownloadRequest;
    type Response = FileChunk;

    fn definition(_: &FileDownloadRequest) -> MessageDefinition {
        registry::FILE_DOWNLOAD
    }

    fn encode(req: &FileDownloadRequest) -> Result<Vec<u8>, MessageError> {
        let mut buf = BytesMut::with_capacity(108);
        buf.put_u32_le(req.start);
        buf.put_u32_le(req.size);
        buf.put_slice(&encode_name(&req.name, 100)?);
        Ok(buf.to_vec())
    }

    /// 返回的 size 可能小于请求值，0 表示没有更多数据
    fn decode(_: &FileDownloadRequest, data: &[u8]) -> Result<FileChunk, MessageError> {
        let mut reader = Reader::new(data);
        let size = reader.u32()?;
        let data = reader.take(size as usize)?.to_vec();
        Ok(FileChunk { size, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_request_layout() {
        let req = FileDownloadRequest::new("block_zs.dat", 0x7530);
        let body = FileDownload::encode(&req).unwrap();
        assert_eq!(body.len(), 108);
        assert_eq!(body[..8], [0x30, 0x75, 0, 0, 0x30, 0x75, 0, 0]);
        assert_eq!(&body[8..20], b"block_zs.dat");
        assert!(body[20..].iter().all(|b| *b == 0));
    }

    #[test]
    fn download_chunk() {
        let req = FileDownloadRequest::new("block.dat", 0);
        let mut data = 3u32.to_le_bytes().to_vec();
        data.extend([7, 8, 9]);
        let chunk = FileDownload::decode(&req, &data).unwrap();
        assert_eq!(chunk.size, 3);
        assert_eq!(chunk.data, vec![7, 8, 9]);

        let empty = FileDownload::decode(&req, &0u32.to_le_bytes()).unwrap();
        assert!(empty.data.is_empty());

        let mut short = 5u32.to_le_bytes().to_vec();
        short.extend([1, 2]);
        assert!(matches!(
            FileDownload::decode(&req, &short),
            Err(MessageError::TruncatedValue { .. })
        ));
    }

    #[test]
    fn meta() {
        let name = "block.dat".to_string();
        assert_eq!(FileMetaMsg::encode(&name).unwrap().len(), 40);
        assert!(FileMetaMsg::encode(&"x".repeat(41)).is_err());

        let mut data = 12345u32.to_le_bytes().to_vec();
        data.push(1);
        data.extend(b"0123456789abcdef0123456789abcdef");
        data.push(0);
        let meta = FileMetaMsg::decode(&name, &data).unwrap();
        assert_eq!(meta.size, 12345);
        assert_eq!(meta.hash, "0123456789abcdef0123456789abcdef");
        assert_eq!(meta.reserved, [1, 0]);
    }
}
