//! Checksum 验证模块
//!
//! 每个检查点区域文件都以 CRC32 footer 结尾，恢复时先校验再解析。
//!
//! 格式: `[payload: [u8]][crc32(payload): u32 LE]`

use crc32fast::Hasher;

/// Footer 长度（字节）
pub const FOOTER_LEN: usize = 4;

/// Checksum 计算器
pub struct Checksum;

impl Checksum {
    /// 计算数据的 CRC32
    pub fn compute(data: &[u8]) -> u32 {
        let mut hasher = Hasher::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// 验证数据的 checksum
    pub fn verify(data: &[u8], expected: u32) -> Result<(), ChecksumError> {
        let actual = Self::compute(data);
        if actual != expected {
            return Err(ChecksumError::Mismatch {
                expected,
                actual,
                data_len: data.len(),
            });
        }
        Ok(())
    }

    /// 追加当前内容的 CRC32 footer，返回 checksum
    pub fn append_footer(buf: &mut Vec<u8>) -> u32 {
        let checksum = Self::compute(buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        checksum
    }

    /// 校验 footer，返回其前面的 payload
    pub fn strip_footer(bytes: &[u8]) -> Result<&[u8], ChecksumError> {
        if bytes.len() < FOOTER_LEN {
            return Err(ChecksumError::InvalidFormat(format!(
                "{} bytes is shorter than the checksum footer",
                bytes.len()
            )));
        }
        let (payload, footer) = bytes.split_at(bytes.len() - FOOTER_LEN);
        let expected = u32::from_le_bytes([footer[0], footer[1], footer[2], footer[3]]);
        Self::verify(payload, expected)?;
        Ok(payload)
    }
}

/// Checksum 错误类型
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    #[error("Checksum mismatch: expected {expected:#010x}, got {actual:#010x} (data_len={data_len})")]
    Mismatch {
        expected: u32,
        actual: u32,
        data_len: usize,
    },

    #[error("Invalid checksum format: {0}")]
    InvalidFormat(String),
}

impl From<ChecksumError> for crate::IndexError {
    fn from(err: ChecksumError) -> Self {
        crate::IndexError::CorruptPersistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_basic() {
        let data = b"Hello, MoteVec!";
        let checksum = Checksum::compute(data);

        assert!(Checksum::verify(data, checksum).is_ok());
        assert!(Checksum::verify(data, checksum + 1).is_err());

        // 数据被篡改
        assert!(Checksum::verify(b"Hello, MoteVec?", checksum).is_err());
    }

    #[test]
    fn test_footer_roundtrip() {
        let mut buf = b"region payload".to_vec();
        let checksum = Checksum::append_footer(&mut buf);
        assert_eq!(buf.len(), 14 + FOOTER_LEN);
        assert_eq!(checksum, Checksum::compute(b"region payload"));

        let payload = Checksum::strip_footer(&buf).unwrap();
        assert_eq!(payload, b"region payload");
    }

    #[test]
    fn test_footer_detects_corruption() {
        let mut buf = b"region payload".to_vec();
        Checksum::append_footer(&mut buf);
        buf[3] ^= 0xFF;

        let result = Checksum::strip_footer(&buf);
        assert!(matches!(result, Err(ChecksumError::Mismatch { .. })));
        assert!(matches!(
            Checksum::strip_footer(b"ab"),
            Err(ChecksumError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_checksum_empty_data() {
        assert_eq!(Checksum::compute(b""), 0);
    }
}
