//! 人类可读大小字符串解析
//!
//! 支持 `K` / `M` / `G` / `T` 单位（1024 进制），可选的 `B` 后缀，大小写不敏感。
//! 无法识别单位或数字的字符串一律回退为 1 GiB，避免因配置笔误导致每次轮询都触发滚动。

/// 无法解析时使用的默认截断大小（1 GiB）
pub const DEFAULT_VOLUME_SIZE: u64 = 1024 * 1024 * 1024;

/// 将 `"100MB"`、`"2g"`、`"512K"` 之类的字符串解析为字节数
pub fn parse_volume_size(input: &str) -> u64 {
    let upper = input.trim().to_uppercase();
    let body = upper.strip_suffix('B').unwrap_or(&upper);

    let multiplier: u64 = match body.chars().last() {
        Some('K') => 1 << 10,
        Some('M') => 1 << 20,
        Some('G') => 1 << 30,
        Some('T') => 1 << 40,
        _ => return DEFAULT_VOLUME_SIZE,
    };

    // 单位字符均为 ASCII，按字节截断是安全的
    let number = body[..body.len() - 1].trim();
    number
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .unwrap_or(DEFAULT_VOLUME_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_volume_size("1K"), 1024);
        assert_eq!(parse_volume_size("2MB"), 2_097_152);
        assert_eq!(parse_volume_size("3GB"), 3_221_225_472);
        assert_eq!(parse_volume_size("1T"), 1 << 40);
        assert_eq!(parse_volume_size("100mb"), 100 * 1024 * 1024);
        assert_eq!(parse_volume_size(" 64 kb "), 64 * 1024);
    }

    #[test]
    fn test_unrecognized_defaults_to_one_gib() {
        assert_eq!(parse_volume_size("weird"), DEFAULT_VOLUME_SIZE);
        assert_eq!(parse_volume_size(""), DEFAULT_VOLUME_SIZE);
        assert_eq!(parse_volume_size("100"), DEFAULT_VOLUME_SIZE);
        assert_eq!(parse_volume_size("100B"), DEFAULT_VOLUME_SIZE);
        assert_eq!(parse_volume_size("1.5G"), DEFAULT_VOLUME_SIZE);
        assert_eq!(parse_volume_size("KB"), DEFAULT_VOLUME_SIZE);
        assert_eq!(parse_volume_size("10X"), DEFAULT_VOLUME_SIZE);
    }

    #[test]
    fn test_overflow_defaults() {
        assert_eq!(parse_volume_size("99999999999999T"), DEFAULT_VOLUME_SIZE);
    }

    proptest! {
        #[test]
        fn prop_unit_multiplies(n in 0u64..1_000_000, unit in 0usize..4, suffix in any::<bool>(), lower in any::<bool>()) {
            let units = ["K", "M", "G", "T"];
            let mut s = format!("{}{}{}", n, units[unit], if suffix { "B" } else { "" });
            if lower {
                s = s.to_lowercase();
            }
            let expected = n * (1u64 << (10 * (unit as u32 + 1)));
            prop_assert_eq!(parse_volume_size(&s), expected);
        }

        #[test]
        fn prop_never_panics(s in "\\PC*") {
            let _ = parse_volume_size(&s);
        }
    }
}
