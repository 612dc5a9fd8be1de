// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 类别表: 80个 COCO 类别名 + 固定种子生成的颜色表

use once_cell::sync::Lazy;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::error::{Result, WatchError};

/// COCO 类别名 (顺序即 class_id)
pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

/// 名称 → class_id
static COCO_INDEX: phf::Map<&'static str, usize> = phf::phf_map! {
    "person" => 0, "bicycle" => 1, "car" => 2, "motorcycle" => 3, "airplane" => 4,
    "bus" => 5, "train" => 6, "truck" => 7, "boat" => 8, "traffic light" => 9,
    "fire hydrant" => 10, "stop sign" => 11, "parking meter" => 12, "bench" => 13,
    "bird" => 14, "cat" => 15, "dog" => 16, "horse" => 17, "sheep" => 18, "cow" => 19,
    "elephant" => 20, "bear" => 21, "zebra" => 22, "giraffe" => 23, "backpack" => 24,
    "umbrella" => 25, "handbag" => 26, "tie" => 27, "suitcase" => 28, "frisbee" => 29,
    "skis" => 30, "snowboard" => 31, "sports ball" => 32, "kite" => 33,
    "baseball bat" => 34, "baseball glove" => 35, "skateboard" => 36, "surfboard" => 37,
    "tennis racket" => 38, "bottle" => 39, "wine glass" => 40, "cup" => 41, "fork" => 42,
    "knife" => 43, "spoon" => 44, "bowl" => 45, "banana" => 46, "apple" => 47,
    "sandwich" => 48, "orange" => 49, "broccoli" => 50, "carrot" => 51, "hot dog" => 52,
    "pizza" => 53, "donut" => 54, "cake" => 55, "chair" => 56, "couch" => 57,
    "potted plant" => 58, "bed" => 59, "dining table" => 60, "toilet" => 61, "tv" => 62,
    "laptop" => 63, "mouse" => 64, "remote" => 65, "keyboard" => 66, "cell phone" => 67,
    "microwave" => 68, "oven" => 69, "toaster" => 70, "sink" => 71, "refrigerator" => 72,
    "book" => 73, "clock" => 74, "vase" => 75, "scissors" => 76, "teddy bear" => 77,
    "hair drier" => 78, "toothbrush" => 79,
};

/// 颜色表的随机种子 (保证每次启动颜色一致)
pub const COLOR_SEED: u64 = 3;

static COCO: Lazy<ClassCatalog> = Lazy::new(|| {
    let mut catalog = ClassCatalog::new(&COCO_CLASSES, COLOR_SEED);
    catalog.index = Some(&COCO_INDEX);
    catalog
});

/// 只读类别表
#[derive(Debug, Clone)]
pub struct ClassCatalog {
    names: Vec<String>,
    colors: Vec<[u8; 3]>,
    // 静态名称索引, 自定义类别表为 None (线性查找)
    index: Option<&'static phf::Map<&'static str, usize>>,
}

impl PartialEq for ClassCatalog {
    fn eq(&self, other: &Self) -> bool {
        self.names == other.names && self.colors == other.colors
    }
}

impl ClassCatalog {
    pub fn new(names: &[&str], seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let colors = names
            .iter()
            .map(|_| {
                [
                    rng.gen_range(0.0f32..255.0) as u8,
                    rng.gen_range(0.0f32..255.0) as u8,
                    rng.gen_range(0.0f32..255.0) as u8,
                ]
            })
            .collect();
        Self {
            names: names.iter().map(|s| s.to_string()).collect(),
            colors,
            index: None,
        }
    }

    /// 默认 COCO 类别表 (进程内共享)
    pub fn coco() -> &'static ClassCatalog {
        &COCO
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// 带越界检查的类别名查询
    pub fn name(&self, id: usize) -> Result<&str> {
        self.names
            .get(id)
            .map(String::as_str)
            .ok_or(WatchError::UnknownClass {
                id,
                len: self.names.len(),
            })
    }

    /// 带越界检查的 RGB 颜色查询
    pub fn color(&self, id: usize) -> Result<[u8; 3]> {
        self.colors.get(id).copied().ok_or(WatchError::UnknownClass {
            id,
            len: self.colors.len(),
        })
    }

    /// 名称 → class_id
    pub fn id_of(&self, name: &str) -> Option<usize> {
        match self.index {
            Some(index) => index.get(name).copied(),
            None => self.names.iter().position(|n| n == name),
        }
    }

    /// 名称必须在类别表中
    pub fn require(&self, name: &str) -> Result<usize> {
        self.id_of(name)
            .ok_or_else(|| WatchError::UnknownClassName(name.to_string()))
    }
}
