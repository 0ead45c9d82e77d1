//! MoteVec Vector Index
//!
//! 面向嵌入式设备的近似最近邻 (ANN) 向量索引
//!
//! ## 核心特性
//! - Vamana 图索引: 批量构建 + 增量插入，度数上限 R
//! - 写缓冲: 新向量先进入 buffer，超过阈值时批量 flush 进图
//! - 量化: None / Scalar (int8) / Binary (1-bit)
//! - 持久化: 三个带 CRC32 的区域文件 + MANIFEST 原子提交，mmap 恢复
//!
//! ## 架构
//! - 存储层: VectorStore (slot 寻址) + checkpoint 区域文件
//! - 索引层: Buffer + SegmentManager + VamanaGraph
//! - 对外层: `VectorDB` (显式实例，无全局单例)
//!
//! ```ignore
//! use motevec::{IndexConfig, VectorDB};
//!
//! let db = VectorDB::new(IndexConfig::default())?;
//! db.insert("a", vec![1.0, 0.0, 0.0, 0.0], Vec::new())?;
//! db.insert("b", vec![0.0, 1.0, 0.0, 0.0], Vec::new())?;
//! let hits = db.search(&[1.0, 0.0, 0.0, 0.0], 2, None)?;
//! assert_eq!(hits[0].id, "a");
//! ```

pub mod codec;
pub mod config;
pub mod database;
pub mod distance;
pub mod index;
pub mod manifest;
pub mod storage;
pub mod types;

mod error;

pub use codec::Quantization;
pub use config::{IndexConfig, Metric};
pub use database::VectorDB;
pub use error::{IndexError, Result};
pub use index::vamana::VamanaConfig;
pub use types::{HealthStatus, IndexStats, SearchResult, VectorId};
