//! 入站控制字节
//!
//! 与数据流共用同一串口，单字节命令，其他字节一律忽略。

/// 控制命令
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, num_enum::TryFromPrimitive, num_enum::IntoPrimitive,
)]
#[repr(u8)]
pub enum ControlCommand {
    /// `'r'`：恢复采样
    Resume = 0x72,
    /// `'s'`：暂停采样
    Suspend = 0x73,
}

impl ControlCommand {
    /// 解析单个入站字节，非命令字节返回 `None`
    pub fn parse(byte: u8) -> Option<Self> {
        Self::try_from(byte).ok()
    }

    /// 命令对应的原始字节
    pub fn as_byte(self) -> u8 {
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_bytes() {
        assert_eq!(ControlCommand::parse(b'r'), Some(ControlCommand::Resume));
        assert_eq!(ControlCommand::parse(b's'), Some(ControlCommand::Suspend));
        assert_eq!(ControlCommand::Resume.as_byte(), b'r');
        assert_eq!(ControlCommand::Suspend.as_byte(), b's');
    }

    #[test]
    fn test_other_bytes_ignored() {
        for byte in [b'R', b'S', b'x', 0x00, 0xFF, b'\n'] {
            assert_eq!(ControlCommand::parse(byte), None);
        }
    }
}
