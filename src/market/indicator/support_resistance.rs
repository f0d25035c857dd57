/// 支撑位与阻力位
///
/// 某根K线的最低价是前后 `radius` 根范围内的最小值即为局部低点，最高价同理。
/// 只保留低于最新收盘价的支撑和高于它的阻力，各取最近的 3 个。
/// 相同价位只算一个，横盘区间里每根K线都是局部极值，不去重会占满 3 个名额。
pub fn find_support_resistance(
    lows: &[f64],
    highs: &[f64],
    close: f64,
    radius: usize,
) -> (Vec<f64>, Vec<f64>) {
    let len = lows.len().min(highs.len());
    let mut supports = Vec::new();
    let mut resistances = Vec::new();
    if radius == 0 || len < 2 * radius + 1 {
        return (supports, resistances);
    }

    for i in radius..len - radius {
        let span = i - radius..=i + radius;
        let min_low = lows[span.clone()].iter().copied().fold(f64::INFINITY, f64::min);
        let max_high = highs[span].iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if lows[i] == min_low && lows[i] < close {
            supports.push(lows[i]);
        }
        if highs[i] == max_high && highs[i] > close {
            resistances.push(highs[i]);
        }
    }

    // 由近到远
    supports.sort_by(|a, b| b.total_cmp(a));
    supports.dedup();
    supports.truncate(3);
    resistances.sort_by(|a, b| a.total_cmp(b));
    resistances.dedup();
    resistances.truncate(3);
    (supports, resistances)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supports_nearest_first() {
        let mut lows = vec![25.0; 40];
        let mut highs = vec![26.0; 40];
        lows[8] = 10.0;
        lows[18] = 12.0;
        lows[28] = 15.0;
        highs[12] = 30.0;
        highs[22] = 28.0;

        let (supports, resistances) = find_support_resistance(&lows, &highs, 20.0, 5);
        assert_eq!(supports, vec![15.0, 12.0, 10.0]);
        assert_eq!(resistances, vec![26.0, 28.0, 30.0]);
    }

    #[test]
    fn test_keeps_three_nearest() {
        let mut lows = vec![25.0; 60];
        let highs = vec![26.0; 60];
        for (i, v) in [(8, 10.0), (18, 12.0), (28, 15.0), (38, 16.0), (48, 11.0)] {
            lows[i] = v;
        }
        let (supports, _) = find_support_resistance(&lows, &highs, 20.0, 5);
        assert_eq!(supports, vec![16.0, 15.0, 12.0]);
    }

    #[test]
    fn test_equal_levels_count_once() {
        let mut lows = vec![25.0; 50];
        let highs = vec![26.0; 50];
        for (i, v) in [(8, 15.0), (18, 15.0), (28, 12.0), (38, 10.0)] {
            lows[i] = v;
        }
        let (supports, resistances) = find_support_resistance(&lows, &highs, 20.0, 5);
        assert_eq!(supports, vec![15.0, 12.0, 10.0]);
        assert_eq!(resistances, vec![26.0]);
    }

    #[test]
    fn test_short_series_has_no_levels() {
        let (supports, resistances) = find_support_resistance(&[1.0; 10], &[2.0; 10], 1.5, 5);
        assert!(supports.is_empty());
        assert!(resistances.is_empty());
    }
}
