//! 协议常量定义

/// 一个输出单元（两列）的字节数
pub const UNIT_LEN: usize = 3;

/// 帧分隔符：每帧所有列之后写出一个全 0xFF 单元
pub const FRAME_DELIMITER: [u8; UNIT_LEN] = [0xFF, 0xFF, 0xFF];

/// coarse 值上限（检测到的列会被钳位到此值）
pub const MAX_COARSE: i32 = 254;

/// “未检测到”哨兵 coarse 值
///
/// 与 [`MAX_COARSE`] 相同：被钳位到 254 的真实检测在线上与“未检测到”无法区分。
pub const SENTINEL_COARSE: u8 = 254;

/// coarse → 编码值的放大倍数（4 位 fine）
pub const FINE_SCALE: i32 = 16;

/// fine 半字节掩码
pub const FINE_MASK: i32 = 0x0F;
