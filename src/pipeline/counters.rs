// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::fmt;

/// 单帧检测计数 (类别名 → 数量)
///
/// 每帧重新创建, 不跨帧累计; 迭代顺序为首次计数的顺序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionCounters {
    entries: Vec<(String, u32)>,
}

impl DetectionCounters {
    pub fn increment(&mut self, class_name: &str) -> u32 {
        if let Some((_, n)) = self.entries.iter_mut().find(|(k, _)| k == class_name) {
            *n += 1;
            return *n;
        }
        self.entries.push((class_name.to_string(), 1));
        1
    }

    /// 未出现的类别为 0
    pub fn get(&self, class_name: &str) -> u32 {
        self.entries
            .iter()
            .find(|(k, _)| k == class_name)
            .map_or(0, |(_, n)| *n)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.entries.iter().map(|(k, n)| (k.as_str(), *n))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> u32 {
        self.entries.iter().map(|(_, n)| n).sum()
    }
}

impl fmt::Display for DetectionCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, n)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, n)?;
        }
        Ok(())
    }
}
